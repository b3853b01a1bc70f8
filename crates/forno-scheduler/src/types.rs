use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Defines when a job fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Fire exactly once at the given UTC instant.
    At { at: DateTime<Utc> },

    /// Fire at `starts`, then every `every_secs` seconds on that grid.
    Every {
        every_secs: u64,
        starts: DateTime<Utc>,
    },
}

impl Trigger {
    pub fn at(at: DateTime<Utc>) -> Self {
        Trigger::At { at }
    }

    pub fn every(interval: chrono::Duration, starts: DateTime<Utc>) -> Self {
        Trigger::Every {
            every_secs: interval.num_seconds().max(0) as u64,
            starts,
        }
    }
}

/// One-shot or recurring, derived from the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    OneShot,
    Recurring,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::OneShot => write!(f, "one_shot"),
            JobKind::Recurring => write!(f, "recurring"),
        }
    }
}

/// What to do with a job once its trigger has no further occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceMode {
    /// Keep the row (as `disabled`) so it can be inspected or re-armed.
    PreserveAfterRun,
    /// Delete the row in the same transaction as the job's writes.
    DeleteAfterRun,
}

impl std::fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceMode::PreserveAfterRun => write!(f, "preserve"),
            PersistenceMode::DeleteAfterRun => write!(f, "delete"),
        }
    }
}

impl std::str::FromStr for PersistenceMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "preserve" => Ok(PersistenceMode::PreserveAfterRun),
            "delete" => Ok(PersistenceMode::DeleteAfterRun),
            other => Err(format!("unknown persistence mode: {other}")),
        }
    }
}

/// Lifecycle state of a job.
///
/// `scheduled → running → {deleted | scheduled | disabled | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its next_run time.
    Scheduled,
    /// Currently being executed.
    Running,
    /// Switched off by an operator, or a preserved one-shot that has run.
    Disabled,
    /// A one-shot job that could not complete; kept until re-armed or dropped.
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Scheduled => "scheduled",
            JobStatus::Running => "running",
            JobStatus::Disabled => "disabled",
            JobStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(JobStatus::Scheduled),
            "running" => Ok(JobStatus::Running),
            "disabled" => Ok(JobStatus::Disabled),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Everything needed to register a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Unique, human-readable label.
    pub name: String,
    /// Key of the task to execute.
    pub task: String,
    pub trigger: Trigger,
    pub persistence: PersistenceMode,
}

/// A persisted job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// UUID v7 string, primary key.
    pub id: String,
    pub name: String,
    pub task: String,
    pub trigger: Trigger,
    pub persistence: PersistenceMode,
    pub status: JobStatus,
    /// When the job is next due. `None` once a one-shot job is exhausted.
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    /// Successful executions.
    pub run_count: u32,
    /// Consecutive failed executions; reset on success.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self.trigger {
            Trigger::At { .. } => JobKind::OneShot,
            Trigger::Every { .. } => JobKind::Recurring,
        }
    }

    /// Repeat interval in seconds, `None` for one-shot jobs.
    pub fn interval_secs(&self) -> Option<u64> {
        match self.trigger {
            Trigger::At { .. } => None,
            Trigger::Every { every_secs, .. } => Some(every_secs),
        }
    }
}

/// Result recorded for one entry of the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Failed,
    /// Grid occurrences of a recurring job that passed while nothing ran.
    Skipped,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "completed"),
            RunOutcome::Failed => write!(f, "failed"),
            RunOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for RunOutcome {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "completed" => Ok(RunOutcome::Completed),
            "failed" => Ok(RunOutcome::Failed),
            "skipped" => Ok(RunOutcome::Skipped),
            other => Err(format!("unknown run outcome: {other}")),
        }
    }
}

/// One row of the append-only `job_runs` log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRun {
    pub id: i64,
    pub job_name: String,
    pub task: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub rows_affected: u64,
    pub detail: Option<String>,
}
