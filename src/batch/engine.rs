//! Execution context for per-series tasks.
//!
//! The context is an explicit handle with a three-step lifecycle:
//! `create` (pick a target, build workers), `submit` (run a transform over a set
//! of compact records), `shutdown` (release the workers).
//!
//! Each record is encoded on the driver and decoded inside its task, so a task
//! owns its input outright and shares nothing with its siblings except the
//! transform definition. A task that errors or panics produces a failed
//! `TaskOutcome`; the rest of the batch is unaffected.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use rayon::ThreadPool;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::batch::schema::{Record, Schema};
use crate::batch::wire::{from_wire, to_wire};
use crate::domain::CompactRecord;
use crate::error::{EngineError, SeriesError};

/// Where tasks execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineTarget {
    /// Sequentially on the calling thread.
    Local,
    /// On a dedicated worker pool (`workers = 0` lets rayon choose).
    Pool { workers: usize },
}

type TaskFn<O> = dyn Fn(CompactRecord) -> Result<Vec<O>, SeriesError> + Send + Sync;

/// A pure per-series function paired with the schema of the rows it emits.
pub struct Transform<O> {
    name: String,
    schema: Schema,
    func: Box<TaskFn<O>>,
}

impl<O: Record> Transform<O> {
    pub fn new<F>(name: impl Into<String>, schema: Schema, func: F) -> Self
    where
        F: Fn(CompactRecord) -> Result<Vec<O>, SeriesError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            schema,
            func: Box::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Result of one task.
#[derive(Debug)]
pub struct TaskOutcome<O> {
    pub unique_id: String,
    pub result: Result<Vec<O>, SeriesError>,
}

pub struct ExecutionContext {
    target: EngineTarget,
    pool: Option<ThreadPool>,
}

impl ExecutionContext {
    pub fn create(target: EngineTarget) -> Result<Self, EngineError> {
        let pool = match target {
            EngineTarget::Local => None,
            EngineTarget::Pool { workers } => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("sb-worker-{i}"))
                    .build()?,
            ),
        };
        let ctx = Self { target, pool };
        info!(engine = ?ctx.target, workers = ctx.workers(), "execution context created");
        Ok(ctx)
    }

    pub fn target(&self) -> EngineTarget {
        self.target
    }

    pub fn workers(&self) -> usize {
        self.pool.as_ref().map_or(1, |p| p.current_num_threads())
    }

    /// Run `transform` once per record.
    ///
    /// Fails up front if the transform's declared schema does not match its
    /// output type. Outcomes are sorted by `unique_id`, so the result does not
    /// depend on the target or on scheduling.
    pub fn submit<O>(
        &self,
        records: Vec<CompactRecord>,
        transform: &Transform<O>,
    ) -> Result<Vec<TaskOutcome<O>>, EngineError>
    where
        O: Record + Send,
    {
        let actual = O::schema();
        if transform.schema() != &actual {
            return Err(EngineError::SchemaMismatch {
                transform: transform.name().to_string(),
                declared: transform.schema().to_string(),
                actual: actual.to_string(),
            });
        }

        let payloads: Vec<(String, Result<Vec<u8>, SeriesError>)> = records
            .into_iter()
            .map(|r| {
                let bytes = to_wire(&r);
                (r.unique_id, bytes)
            })
            .collect();
        info!(transform = transform.name(), tasks = payloads.len(), "submitting batch");

        let run = |(unique_id, payload): (String, Result<Vec<u8>, SeriesError>)| {
            let result = payload.and_then(|bytes| run_task(transform, &bytes));
            debug!(%unique_id, ok = result.is_ok(), "task finished");
            TaskOutcome { unique_id, result }
        };

        let mut outcomes: Vec<TaskOutcome<O>> = match &self.pool {
            None => payloads.into_iter().map(run).collect(),
            Some(pool) => pool.install(|| payloads.into_par_iter().map(run).collect()),
        };
        outcomes.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        Ok(outcomes)
    }

    pub fn shutdown(self) {
        info!(engine = ?self.target, "execution context shut down");
        drop(self.pool);
    }
}

fn run_task<O>(transform: &Transform<O>, bytes: &[u8]) -> Result<Vec<O>, SeriesError> {
    let record = from_wire(bytes)?;
    match panic::catch_unwind(AssertUnwindSafe(|| (transform.func)(record))) {
        Ok(result) => result,
        Err(payload) => Err(SeriesError::Panicked(panic_message(payload.as_ref()))),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::compress::tests::day;
    use crate::domain::MetricRecord;

    fn record(id: &str, len: usize) -> CompactRecord {
        CompactRecord {
            unique_id: id.to_string(),
            store_id: "CA_1".to_string(),
            item_id: id.to_string(),
            start_date: day(1, 1),
            y: (0..len).map(|i| i as f64).collect(),
            prices: vec![1.0; len],
        }
    }

    fn length_transform() -> Transform<MetricRecord> {
        Transform::new("length", MetricRecord::schema(), |r: CompactRecord| {
            Ok(vec![MetricRecord {
                models: "len".to_string(),
                metric: r.len() as f64,
                unique_id: r.unique_id,
            }])
        })
    }

    #[test]
    fn local_and_pool_agree() {
        let records = vec![record("b", 3), record("a", 5)];

        let local = ExecutionContext::create(EngineTarget::Local).unwrap();
        let pool = ExecutionContext::create(EngineTarget::Pool { workers: 2 }).unwrap();
        assert_eq!(pool.workers(), 2);

        let t = length_transform();
        let a = local.submit(records.clone(), &t).unwrap();
        let b = pool.submit(records, &t).unwrap();
        local.shutdown();
        pool.shutdown();

        let lens = |outs: &[TaskOutcome<MetricRecord>]| {
            outs.iter()
                .map(|o| (o.unique_id.clone(), o.result.as_ref().unwrap()[0].metric))
                .collect::<Vec<_>>()
        };
        assert_eq!(lens(&a), vec![("a".to_string(), 5.0), ("b".to_string(), 3.0)]);
        assert_eq!(lens(&a), lens(&b));
    }

    #[test]
    fn declared_schema_must_match_output_type() {
        let t: Transform<MetricRecord> = Transform::new("bad", CompactRecord::schema(), |_r| Ok(vec![]));
        let ctx = ExecutionContext::create(EngineTarget::Local).unwrap();
        let err = ctx.submit(vec![record("a", 1)], &t).unwrap_err();
        assert!(matches!(err, EngineError::SchemaMismatch { .. }));
    }

    #[test]
    fn failing_and_panicking_tasks_are_isolated() {
        let t: Transform<MetricRecord> = Transform::new("flaky", MetricRecord::schema(), |r: CompactRecord| {
            match r.unique_id.as_str() {
                "err" => Err(SeriesError::EmptyGroup),
                "boom" => panic!("model blew up"),
                _ => Ok(vec![]),
            }
        });
        let ctx = ExecutionContext::create(EngineTarget::Pool { workers: 2 }).unwrap();
        let outs = ctx
            .submit(vec![record("ok", 2), record("err", 2), record("boom", 2)], &t)
            .unwrap();

        assert_eq!(outs.len(), 3);
        assert_eq!(outs[0].unique_id, "boom");
        assert_eq!(outs[0].result, Err(SeriesError::Panicked("model blew up".to_string())));
        assert_eq!(outs[1].result, Err(SeriesError::EmptyGroup));
        assert!(outs[2].result.is_ok());
    }
}
