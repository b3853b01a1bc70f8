use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use forno_core::config::{SchedulerConfig, MAX_RETRY_DELAY_SECS};
use forno_core::FornoError;
use rusqlite::Connection;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    db::init_db,
    error::{Result, SchedulerError},
    repo::{self, NewRun},
    schedule::{next_after, next_on_or_after, NextRun},
    task::{Task, TaskContext, TaskRegistry, TaskReport},
    types::{Job, JobKind, JobRun, JobSpec, JobStatus, PersistenceMode, RunOutcome},
};

/// How one-shot jobs are retried after a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &SchedulerConfig) -> Self {
        Self {
            delay: Duration::seconds(cfg.retry_delay_secs.min(MAX_RETRY_DELAY_SECS) as i64),
            max_attempts: cfg.max_attempts.max(1),
        }
    }
}

/// Counts from one pass over the due jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub completed: usize,
    pub failed: usize,
    /// Recurring occurrences passed over because the engine was not running.
    pub skipped: u32,
}

/// How a successful run left its job.
enum Resolution {
    Removed,
    Retired,
    Rescheduled(NextRun),
}

/// Shared handle for job management (list/enable/disable/drop) while the
/// engine loop runs.
///
/// Uses its own `Connection` so admin commands don't conflict with the
/// engine's polling queries.
#[derive(Clone)]
pub struct SchedulerHandle {
    conn: Arc<Mutex<Connection>>,
}

impl SchedulerHandle {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("scheduler connection poisoned")
    }

    pub fn add_job(&self, spec: &JobSpec) -> Result<Job> {
        repo::insert_job(&self.conn(), spec, Utc::now())
    }

    /// Register `spec` unless a job with the same name already exists.
    /// Returns the new job, or `None` when the name was taken.
    pub fn ensure_job(&self, spec: &JobSpec) -> Result<Option<Job>> {
        match repo::insert_job(&self.conn(), spec, Utc::now()) {
            Ok(job) => Ok(Some(job)),
            Err(SchedulerError::DuplicateJob { name }) => {
                debug!(job = %name, "job already registered");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn get_job(&self, name: &str) -> Result<Option<Job>> {
        repo::get_job(&self.conn(), name)
    }

    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        repo::list_jobs(&self.conn())
    }

    pub fn disable_job(&self, name: &str) -> Result<()> {
        repo::disable_job(&self.conn(), name, Utc::now())?;
        info!(job = %name, "job disabled");
        Ok(())
    }

    /// Put a disabled or failed job back on the schedule.
    ///
    /// Recurring jobs resume at the next grid point; the occurrences that
    /// fell inside the disabled window are not replayed. A one-shot job
    /// keeps its pending due time, or becomes due immediately if it has
    /// already run or failed.
    pub fn enable_job(&self, name: &str) -> Result<Job> {
        enable_job_at(&self.conn(), name, Utc::now())
    }

    pub fn drop_job(&self, name: &str) -> Result<()> {
        repo::drop_job(&self.conn(), name)
    }

    pub fn enable_scheduler(&self) -> Result<()> {
        repo::set_scheduler_enabled(&self.conn(), true)
    }

    pub fn disable_scheduler(&self) -> Result<()> {
        repo::set_scheduler_enabled(&self.conn(), false)
    }

    pub fn scheduler_enabled(&self) -> Result<bool> {
        repo::scheduler_enabled(&self.conn())
    }

    pub fn run_history(&self, limit: usize) -> Result<Vec<JobRun>> {
        repo::run_history(&self.conn(), limit)
    }

    /// Execute `task` immediately, outside any schedule, and log the run.
    pub fn run_now(&self, registry: &TaskRegistry, task: &str) -> Result<TaskReport> {
        run_task_now(&mut self.conn(), registry, task, Utc::now())
    }
}

fn enable_job_at(conn: &Connection, name: &str, now: DateTime<Utc>) -> Result<Job> {
    let job = repo::get_job(conn, name)?.ok_or_else(|| SchedulerError::JobNotFound {
        name: name.to_string(),
    })?;
    if job.status == JobStatus::Scheduled || job.status == JobStatus::Running {
        return Ok(job);
    }
    let next = match job.kind() {
        JobKind::Recurring => next_on_or_after(&job.trigger, now),
        JobKind::OneShot => job.next_run.unwrap_or(now),
    };
    repo::enable_job(conn, name, next, now)?;
    info!(job = %name, next_run = %repo::fmt_ts(next), "job enabled");
    repo::get_job(conn, name)?.ok_or_else(|| SchedulerError::JobNotFound {
        name: name.to_string(),
    })
}

/// Run a task once in its own transaction and record it in the run log
/// under the task's own name.
pub fn run_task_now(
    conn: &mut Connection,
    registry: &TaskRegistry,
    task_key: &str,
    now: DateTime<Utc>,
) -> Result<TaskReport> {
    let task = registry.get(task_key).ok_or_else(|| SchedulerError::UnknownTask {
        task: task_key.to_string(),
    })?;
    let started = Instant::now();

    let result = (|| -> forno_core::Result<TaskReport> {
        let tx = conn.transaction()?;
        let report = task.run(&TaskContext {
            conn: &tx,
            now,
            job_name: task_key,
        })?;
        repo::append_run(
            &tx,
            &NewRun {
                job_name: task_key,
                task: task_key,
                started_at: now,
                finished_at: finished_at(now, started),
                outcome: RunOutcome::Completed,
                rows_affected: report.rows_affected,
                detail: Some(format!("manual run: {}", report.detail)),
            },
        )?;
        tx.commit()?;
        Ok(report)
    })();

    match result {
        Ok(report) => {
            info!(task = %task_key, rows = report.rows_affected, detail = %report.detail, "manual run completed");
            Ok(report)
        }
        Err(e) => {
            error!(task = %task_key, code = e.code(), error = %e, "manual run failed");
            let logged = repo::append_run(
                conn,
                &NewRun {
                    job_name: task_key,
                    task: task_key,
                    started_at: now,
                    finished_at: finished_at(now, started),
                    outcome: RunOutcome::Failed,
                    rows_affected: 0,
                    detail: Some(format!("manual run: {}: {e}", e.code())),
                },
            );
            if let Err(log_err) = logged {
                warn!(task = %task_key, error = %log_err, "could not log failed manual run");
            }
            Err(SchedulerError::Task(e))
        }
    }
}

fn finished_at(now: DateTime<Utc>, started: Instant) -> DateTime<Utc> {
    now + Duration::from_std(started.elapsed()).unwrap_or_else(|_| Duration::zero())
}

/// Core scheduler: persists jobs to SQLite and executes them when due.
pub struct SchedulerEngine {
    conn: Connection,
    registry: TaskRegistry,
    retry: RetryPolicy,
}

impl SchedulerEngine {
    /// Create a new engine, initialising the DB schema if needed.
    pub fn new(conn: Connection, registry: TaskRegistry, retry: RetryPolicy) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn,
            registry,
            retry,
        })
    }

    /// Main event loop. Polls every `poll` until `shutdown` broadcasts `true`.
    pub async fn run(mut self, poll: std::time::Duration, mut shutdown: watch::Receiver<bool>) {
        info!(poll_ms = poll.as_millis() as u64, "scheduler engine started");
        if let Err(e) = self.recover_interrupted(Utc::now()) {
            error!("interrupted-job recovery failed: {e}");
        }

        let mut interval = tokio::time::interval(poll);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick(Utc::now()) {
                        error!("scheduler tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Reset jobs a crash left in `running`. Their transaction never
    /// committed, so firing them again cannot double-apply anything.
    pub fn recover_interrupted(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let n = repo::reset_interrupted(&self.conn, now)?;
        if n > 0 {
            warn!(count = n, "interrupted jobs rescheduled on startup");
        }
        Ok(n)
    }

    /// Execute every job due at `now`.
    ///
    /// A failing job is recorded and the remaining due jobs still run.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<TickSummary> {
        let mut summary = TickSummary::default();
        if !repo::scheduler_enabled(&self.conn)? {
            debug!("scheduler disabled; tick skipped");
            return Ok(summary);
        }

        for job in repo::due_jobs(&self.conn, now)? {
            let Some(due) = job.next_run else { continue };

            if let Err(e) = repo::mark_running(&self.conn, &job.id, now) {
                // Still `scheduled`, so the next tick picks it up again.
                error!(job = %job.name, error = %e, "could not mark job running; left for next tick");
                summary.failed += 1;
                continue;
            }
            info!(job = %job.name, task = %job.task, due = %repo::fmt_ts(due), "executing job");
            let started = Instant::now();

            let result = match self.registry.get(&job.task) {
                Some(task) => execute_in_transaction(&mut self.conn, task, &job, due, now, started),
                None => Err(FornoError::UnknownTask {
                    task: job.task.clone(),
                }),
            };

            match result {
                Ok((report, resolution)) => {
                    summary.completed += 1;
                    match resolution {
                        Resolution::Removed => {
                            info!(job = %job.name, rows = report.rows_affected, "one-shot job completed and removed")
                        }
                        Resolution::Retired => {
                            info!(job = %job.name, rows = report.rows_affected, "one-shot job completed and preserved as disabled")
                        }
                        Resolution::Rescheduled(next) => {
                            summary.skipped += next.skipped;
                            info!(
                                job = %job.name,
                                rows = report.rows_affected,
                                next_run = %repo::fmt_ts(next.at),
                                "job completed and rescheduled"
                            )
                        }
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    match self.record_failure(&job, due, now, started, &e) {
                        Ok(skipped) => summary.skipped += skipped,
                        Err(book) => self.release_after_bookkeeping_error(&job, now, &book),
                    }
                }
            }
        }
        Ok(summary)
    }

    /// The failure itself could not be recorded. Put the job back to
    /// `scheduled` at its old due time so it is not stranded in `running`;
    /// it fires again on the next tick.
    fn release_after_bookkeeping_error(&self, job: &Job, now: DateTime<Utc>, err: &SchedulerError) {
        error!(job = %job.name, task = %job.task, error = %err, "could not record job failure");
        match repo::release_running(&self.conn, &job.id, now) {
            // The job row was settled; only the run-log write failed.
            Ok(0) => {}
            Ok(_) => warn!(job = %job.name, "job released for retry on the next tick"),
            Err(e) => error!(
                job = %job.name,
                error = %e,
                "could not release job; it stays running until the next restart"
            ),
        }
    }

    /// Persist a failed run outside the rolled-back transaction. Returns the
    /// number of grid points skipped while rescheduling.
    fn record_failure(
        &self,
        job: &Job,
        due: DateTime<Utc>,
        now: DateTime<Utc>,
        started: Instant,
        err: &FornoError,
    ) -> Result<u32> {
        let message = format!("{}: {err}", err.code());
        error!(job = %job.name, task = %job.task, code = err.code(), error = %err, "job failed");

        let mut skipped = 0;
        match next_after(&job.trigger, due, now) {
            Some(next) => {
                // Recurring: the next occurrence is a fresh run, not a retry.
                repo::record_failure(&self.conn, &job.id, JobStatus::Scheduled, Some(next.at), now, &message)?;
                record_skipped(&self.conn, job, now, next)?;
                skipped = next.skipped;
            }
            None => {
                let attempts = job.attempts + 1;
                if err.is_transient() && attempts < self.retry.max_attempts {
                    let retry_at = now + self.retry.delay;
                    warn!(
                        job = %job.name,
                        attempt = attempts,
                        max_attempts = self.retry.max_attempts,
                        retry_at = %repo::fmt_ts(retry_at),
                        "one-shot job will be retried"
                    );
                    repo::record_failure(&self.conn, &job.id, JobStatus::Scheduled, Some(retry_at), now, &message)?;
                } else {
                    warn!(job = %job.name, attempts, "one-shot job parked as failed");
                    repo::record_failure(&self.conn, &job.id, JobStatus::Failed, None, now, &message)?;
                }
            }
        }

        repo::append_run(
            &self.conn,
            &NewRun {
                job_name: &job.name,
                task: &job.task,
                started_at: now,
                finished_at: finished_at(now, started),
                outcome: RunOutcome::Failed,
                rows_affected: 0,
                detail: Some(message),
            },
        )?;
        Ok(skipped)
    }
}

/// Run the task and settle the job's state in a single transaction.
fn execute_in_transaction(
    conn: &mut Connection,
    task: &dyn Task,
    job: &Job,
    due: DateTime<Utc>,
    now: DateTime<Utc>,
    started: Instant,
) -> forno_core::Result<(TaskReport, Resolution)> {
    let tx = conn.transaction()?;
    let report = task.run(&TaskContext {
        conn: &tx,
        now,
        job_name: &job.name,
    })?;

    let resolution = match next_after(&job.trigger, due, now) {
        Some(next) => {
            repo::complete_and_reschedule(&tx, &job.id, next.at, now)?;
            record_skipped(&tx, job, now, next)?;
            Resolution::Rescheduled(next)
        }
        None => match job.persistence {
            PersistenceMode::DeleteAfterRun => {
                repo::delete_job(&tx, &job.id)?;
                Resolution::Removed
            }
            PersistenceMode::PreserveAfterRun => {
                repo::complete_and_retire(&tx, &job.id, now)?;
                Resolution::Retired
            }
        },
    };

    repo::append_run(
        &tx,
        &NewRun {
            job_name: &job.name,
            task: &job.task,
            started_at: now,
            finished_at: finished_at(now, started),
            outcome: RunOutcome::Completed,
            rows_affected: report.rows_affected,
            detail: Some(report.detail.clone()),
        },
    )?;
    tx.commit()?;
    Ok((report, resolution))
}

/// Log grid points a recurring job passed over. Never silent: a warning and
/// a `skipped` run-log entry.
fn record_skipped(conn: &Connection, job: &Job, now: DateTime<Utc>, next: NextRun) -> Result<()> {
    if next.skipped == 0 {
        return Ok(());
    }
    warn!(job = %job.name, skipped = next.skipped, "occurrences missed while the scheduler was not running");
    repo::append_run(
        conn,
        &NewRun {
            job_name: &job.name,
            task: &job.task,
            started_at: now,
            finished_at: now,
            outcome: RunOutcome::Skipped,
            rows_affected: 0,
            detail: Some(format!("{} occurrence(s) skipped", next.skipped)),
        },
    )?;
    Ok(())
}
