//! Declared record schemas.
//!
//! A transform handed to the execution engine carries the schema of the rows it
//! promises to emit. The engine compares that declaration with the schema of the
//! output type before any task runs, so routing and export code never has to
//! inspect values to learn their shape.

use std::fmt;
use std::str::FromStr;

use crate::domain::{CompactRecord, CvRow, MetricRecord, RawObservation};

/// Column data types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Str,
    Date,
    Int,
    Float,
    FloatList,
}

impl DType {
    fn label(self) -> &'static str {
        match self {
            DType::Str => "string",
            DType::Date => "date",
            DType::Int => "int",
            DType::Float => "float",
            DType::FloatList => "[float]",
        }
    }
}

impl FromStr for DType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "string" | "str" => Ok(DType::Str),
            "date" => Ok(DType::Date),
            "int" => Ok(DType::Int),
            "float" => Ok(DType::Float),
            "[float]" => Ok(DType::FloatList),
            other => Err(format!("unknown column type `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub dtype: DType,
}

/// Ordered list of named, typed columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: &[(&str, DType)]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(name, dtype)| Field {
                    name: (*name).to_string(),
                    dtype: *dtype,
                })
                .collect(),
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", field.name, field.dtype.label())?;
        }
        Ok(())
    }
}

/// Parses the `name:type, name:type` form produced by `Display`.
impl FromStr for Schema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, dtype) = part
                .split_once(':')
                .ok_or_else(|| format!("column `{part}` is missing a `:type` suffix"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(format!("column `{part}` has an empty name"));
            }
            if fields.iter().any(|f: &Field| f.name == name) {
                return Err(format!("duplicate column `{name}`"));
            }
            fields.push(Field {
                name: name.to_string(),
                dtype: dtype.parse()?,
            });
        }
        if fields.is_empty() {
            return Err("schema has no columns".to_string());
        }
        Ok(Schema { fields })
    }
}

/// A row type with a statically known shape.
pub trait Record {
    fn schema() -> Schema;
}

impl Record for RawObservation {
    fn schema() -> Schema {
        Schema::new(&[
            ("unique_id", DType::Str),
            ("item_id", DType::Str),
            ("dept_id", DType::Str),
            ("cat_id", DType::Str),
            ("store_id", DType::Str),
            ("state_id", DType::Str),
            ("ds", DType::Date),
            ("y", DType::Float),
            ("wm_yr_wk", DType::Int),
            ("sell_price", DType::Float),
        ])
    }
}

impl Record for CompactRecord {
    fn schema() -> Schema {
        Schema::new(&[
            ("unique_id", DType::Str),
            ("store_id", DType::Str),
            ("item_id", DType::Str),
            ("start_date", DType::Date),
            ("y", DType::FloatList),
            ("prices", DType::FloatList),
        ])
    }
}

impl Record for MetricRecord {
    fn schema() -> Schema {
        Schema::new(&[
            ("models", DType::Str),
            ("metric", DType::Float),
            ("unique_id", DType::Str),
        ])
    }
}

impl Record for CvRow {
    fn schema() -> Schema {
        Schema::new(&[
            ("unique_id", DType::Str),
            ("ds", DType::Date),
            ("cutoff", DType::Date),
            ("y", DType::Float),
            ("predictions", DType::FloatList),
        ])
    }
}
