use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

/// What a task sees while it runs.
pub struct TaskContext<'a> {
    /// Connection inside the job's transaction. Everything written through
    /// it commits or rolls back together with the job's state change.
    pub conn: &'a Connection,
    /// The instant the scheduler considers "now" for this run.
    pub now: DateTime<Utc>,
    /// Name of the job being executed (for logging).
    pub job_name: &'a str,
}

/// Summary a task hands back for the run log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskReport {
    pub rows_affected: u64,
    pub detail: String,
}

impl TaskReport {
    pub fn new(rows_affected: u64, detail: impl Into<String>) -> Self {
        Self {
            rows_affected,
            detail: detail.into(),
        }
    }
}

/// A unit of work the scheduler can execute.
///
/// Implementations must be idempotent with respect to their output: a
/// transient failure is retried by simply running the task again.
pub trait Task: Send + Sync {
    fn run(&self, ctx: &TaskContext<'_>) -> forno_core::Result<TaskReport>;
}

/// Maps task keys (the `jobs.task` column) to implementations.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, Box<dyn Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task under `key`, replacing any previous registration.
    pub fn register(&mut self, key: impl Into<String>, task: impl Task + 'static) -> &mut Self {
        self.tasks.insert(key.into(), Box::new(task));
        self
    }

    pub fn get(&self, key: &str) -> Option<&dyn Task> {
        self.tasks.get(key).map(|t| t.as_ref())
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }
}
