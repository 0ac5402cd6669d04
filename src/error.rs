use chrono::NaiveDate;

/// Application-boundary error: a message plus the process exit code.
///
/// Exit codes:
/// - `2` usage, input or IO problems
/// - `3` no usable data left after ingest/validation
/// - `4` internal or engine failures
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Failure of a single series somewhere between grouping and metric reduction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    #[error("empty group")]
    EmptyGroup,

    #[error("rows not sorted by date: {prev} followed by {next}")]
    Unsorted { prev: NaiveDate, next: NaiveDate },

    #[error("duplicate date {0}")]
    DuplicateDate(NaiveDate),

    #[error("missing calendar days between {after} and {before}")]
    Gap { after: NaiveDate, before: NaiveDate },

    #[error("group mixes series ids `{first}` and `{other}`")]
    MixedIdentity { first: String, other: String },

    #[error("value/price length mismatch: {values} values vs {prices} prices")]
    LengthMismatch { values: usize, prices: usize },

    #[error("date overflow at offset {0} days")]
    DateOverflow(usize),

    #[error("insufficient history: need {required} observations, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("invalid back-test settings: {0}")]
    InvalidConfig(String),

    #[error("wire decode failed: {0}")]
    Wire(String),

    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Failure of one model on one training window.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("insufficient data: need {required}, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("ill-conditioned least-squares system")]
    IllConditioned,

    #[error("non-finite forecast")]
    NonFinite,

    #[error("model panicked: {0}")]
    Panicked(String),
}

/// Failure of the execution engine itself (not of an individual task).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("transform `{transform}` declares schema [{declared}] but its output type has [{actual}]")]
    SchemaMismatch {
        transform: String,
        declared: String,
        actual: String,
    },

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        AppError::new(4, format!("Engine error: {err}"))
    }
}

impl From<SeriesError> for AppError {
    fn from(err: SeriesError) -> Self {
        AppError::new(3, format!("Series error: {err}"))
    }
}
