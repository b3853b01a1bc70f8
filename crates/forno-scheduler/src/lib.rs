//! `forno-scheduler` — Tokio-driven job scheduler with SQLite persistence.
//!
//! # Overview
//!
//! Job descriptors live in a SQLite `jobs` table so they survive restarts.
//! The [`engine::SchedulerEngine`] polls the table and runs every job whose
//! `next_run` has arrived. A job's writes, its state change and its entry in
//! the `job_runs` log are committed in one transaction, so a one-shot job is
//! only retired once its work is durable.
//!
//! # Triggers
//!
//! | Trigger | Behaviour                                                   |
//! |---------|-------------------------------------------------------------|
//! | `At`    | Single fire at an absolute UTC instant                      |
//! | `Every` | Fire on a fixed grid `starts + k * every_secs`, k = 0, 1, … |
//!
//! What happens once an `At` job has run depends on its
//! [`PersistenceMode`]: `DeleteAfterRun` removes the row,
//! `PreserveAfterRun` keeps it as `disabled`.

pub mod db;
pub mod engine;
pub mod error;
pub mod repo;
pub mod schedule;
pub mod task;
pub mod types;

pub use engine::{RetryPolicy, SchedulerEngine, SchedulerHandle, TickSummary};
pub use error::{Result, SchedulerError};
pub use task::{Task, TaskContext, TaskRegistry, TaskReport};
pub use types::{Job, JobKind, JobRun, JobSpec, JobStatus, PersistenceMode, RunOutcome, Trigger};
