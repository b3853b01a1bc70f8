//! SQL access to the scheduler tables, shared by the engine and the handle.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{types::Type, Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::schedule::{first_due, validate};
use crate::types::{Job, JobRun, JobSpec, JobStatus, RunOutcome, Trigger};

const JOB_COLUMNS: &str = "id, name, task, trigger_spec, persistence, status, next_run,
     last_run, run_count, attempts, last_error, created_at, updated_at";

const SCHEDULER_ENABLED_KEY: &str = "enabled";

/// Fixed-width RFC 3339 so that text comparison in SQL orders correctly.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_opt_ts(idx: usize, s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_ts(idx, &s)).transpose()
}

fn parse_text<T: std::str::FromStr<Err = String>>(idx: usize, s: &str) -> rusqlite::Result<T> {
    s.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Map a SELECT row (column order from JOB_COLUMNS) to a Job.
fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let trigger_json: String = row.get(3)?;
    let trigger: Trigger = serde_json::from_str(&trigger_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    Ok(Job {
        id: row.get(0)?,
        name: row.get(1)?,
        task: row.get(2)?,
        trigger,
        persistence: parse_text(4, &row.get::<_, String>(4)?)?,
        status: parse_text(5, &row.get::<_, String>(5)?)?,
        next_run: parse_opt_ts(6, row.get(6)?)?,
        last_run: parse_opt_ts(7, row.get(7)?)?,
        run_count: row.get(8)?,
        attempts: row.get(9)?,
        last_error: row.get(10)?,
        created_at: parse_ts(11, &row.get::<_, String>(11)?)?,
        updated_at: parse_ts(12, &row.get::<_, String>(12)?)?,
    })
}

/// Register a job. Its first due time comes straight from the trigger.
pub fn insert_job(conn: &Connection, spec: &JobSpec, now: DateTime<Utc>) -> Result<Job> {
    validate(&spec.trigger)?;
    let id = Uuid::now_v7().to_string();
    let trigger_json = serde_json::to_string(&spec.trigger)
        .map_err(|e| SchedulerError::InvalidTrigger(e.to_string()))?;
    let next_run = first_due(&spec.trigger);
    let now_str = fmt_ts(now);

    let inserted = conn.execute(
        "INSERT INTO jobs
         (id, name, task, trigger_spec, persistence, status, next_run,
          last_run, run_count, attempts, last_error, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'scheduled', ?6, NULL, 0, 0, NULL, ?7, ?7)",
        rusqlite::params![
            id,
            spec.name,
            spec.task,
            trigger_json,
            spec.persistence.to_string(),
            fmt_ts(next_run),
            now_str,
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) => {
            return Err(SchedulerError::DuplicateJob {
                name: spec.name.clone(),
            });
        }
        Err(e) => return Err(e.into()),
    }

    info!(job_id = %id, job = %spec.name, task = %spec.task, next_run = %fmt_ts(next_run), "job added");

    Ok(Job {
        id,
        name: spec.name.clone(),
        task: spec.task.clone(),
        trigger: spec.trigger.clone(),
        persistence: spec.persistence,
        status: JobStatus::Scheduled,
        next_run: Some(next_run),
        last_run: None,
        run_count: 0,
        attempts: 0,
        last_error: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_job(conn: &Connection, name: &str) -> Result<Option<Job>> {
    let job = conn
        .query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE name = ?1"),
            [name],
            row_to_job,
        )
        .optional()?;
    Ok(job)
}

/// Return all known jobs ordered by creation time.
pub fn list_jobs(conn: &Connection) -> Result<Vec<Job>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at, name"
    ))?;
    let jobs = stmt
        .query_map([], row_to_job)?
        .collect::<rusqlite::Result<_>>()?;
    Ok(jobs)
}

/// Scheduled jobs whose next_run is at or before `now`, earliest first.
pub fn due_jobs(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Job>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {JOB_COLUMNS} FROM jobs
         WHERE status = 'scheduled' AND next_run IS NOT NULL AND next_run <= ?1
         ORDER BY next_run, created_at"
    ))?;
    let jobs = stmt
        .query_map([fmt_ts(now)], row_to_job)?
        .collect::<rusqlite::Result<_>>()?;
    Ok(jobs)
}

pub fn mark_running(conn: &Connection, id: &str, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE jobs SET status = 'running', updated_at = ?1 WHERE id = ?2",
        rusqlite::params![fmt_ts(now), id],
    )?;
    Ok(())
}

/// Successful run of a job that fires again at `next_run`.
pub fn complete_and_reschedule(
    conn: &Connection,
    id: &str,
    next_run: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE jobs SET status = CASE status WHEN 'running' THEN 'scheduled' ELSE status END,
                next_run = ?1, last_run = ?2,
                run_count = run_count + 1, attempts = 0, last_error = NULL,
                updated_at = ?2
         WHERE id = ?3",
        rusqlite::params![fmt_ts(next_run), fmt_ts(now), id],
    )?;
    Ok(())
}

/// Successful final run of a preserved one-shot job: kept, but disabled.
pub fn complete_and_retire(conn: &Connection, id: &str, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE jobs SET status = 'disabled', next_run = NULL, last_run = ?1,
                run_count = run_count + 1, attempts = 0, last_error = NULL,
                updated_at = ?1
         WHERE id = ?2",
        rusqlite::params![fmt_ts(now), id],
    )?;
    Ok(())
}

/// Record a failed run. `next_run = None` parks the job until re-armed.
pub fn record_failure(
    conn: &Connection,
    id: &str,
    status: JobStatus,
    next_run: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    error: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE jobs SET status = CASE status WHEN 'running' THEN ?1 ELSE status END,
                next_run = ?2, last_run = ?3,
                attempts = attempts + 1, last_error = ?4, updated_at = ?3
         WHERE id = ?5",
        rusqlite::params![
            status.to_string(),
            next_run.map(fmt_ts),
            fmt_ts(now),
            error,
            id
        ],
    )?;
    Ok(())
}

pub fn delete_job(conn: &Connection, id: &str) -> Result<usize> {
    Ok(conn.execute("DELETE FROM jobs WHERE id = ?1", [id])?)
}

/// Remove a job by name. Returns `JobNotFound` if no row is deleted.
pub fn drop_job(conn: &Connection, name: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM jobs WHERE name = ?1", [name])?;
    if n == 0 {
        return Err(SchedulerError::JobNotFound {
            name: name.to_string(),
        });
    }
    info!(job = %name, "job dropped");
    Ok(())
}

/// Put a job back on the schedule with a fresh attempt budget.
pub fn enable_job(
    conn: &Connection,
    name: &str,
    next_run: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<()> {
    let n = conn.execute(
        "UPDATE jobs SET status = 'scheduled', next_run = ?1, attempts = 0,
                last_error = NULL, updated_at = ?2
         WHERE name = ?3",
        rusqlite::params![fmt_ts(next_run), fmt_ts(now), name],
    )?;
    if n == 0 {
        return Err(SchedulerError::JobNotFound {
            name: name.to_string(),
        });
    }
    Ok(())
}

pub fn disable_job(conn: &Connection, name: &str, now: DateTime<Utc>) -> Result<()> {
    let n = conn.execute(
        "UPDATE jobs SET status = 'disabled', updated_at = ?1 WHERE name = ?2",
        rusqlite::params![fmt_ts(now), name],
    )?;
    if n == 0 {
        return Err(SchedulerError::JobNotFound {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Put a job that is still `running` back to `scheduled` without touching
/// its due time.
pub fn release_running(conn: &Connection, id: &str, now: DateTime<Utc>) -> Result<usize> {
    let n = conn.execute(
        "UPDATE jobs SET status = 'scheduled', updated_at = ?1
         WHERE id = ?2 AND status = 'running'",
        rusqlite::params![fmt_ts(now), id],
    )?;
    Ok(n)
}

/// Jobs left `running` by a crash never committed their work; put them back
/// on the schedule so they fire again.
pub fn reset_interrupted(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    let n = conn.execute(
        "UPDATE jobs SET status = 'scheduled', updated_at = ?1 WHERE status = 'running'",
        [fmt_ts(now)],
    )?;
    Ok(n)
}

/// A run-log entry that has not been written yet.
#[derive(Debug, Clone)]
pub struct NewRun<'a> {
    pub job_name: &'a str,
    pub task: &'a str,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub rows_affected: u64,
    pub detail: Option<String>,
}

pub fn append_run(conn: &Connection, run: &NewRun<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO job_runs
         (job_name, task, started_at, finished_at, outcome, rows_affected, detail)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            run.job_name,
            run.task,
            fmt_ts(run.started_at),
            fmt_ts(run.finished_at),
            run.outcome.to_string(),
            run.rows_affected as i64,
            run.detail,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent run-log entries, newest first.
pub fn run_history(conn: &Connection, limit: usize) -> Result<Vec<JobRun>> {
    let mut stmt = conn.prepare(
        "SELECT id, job_name, task, started_at, finished_at, outcome, rows_affected, detail
         FROM job_runs ORDER BY id DESC LIMIT ?1",
    )?;
    let runs = stmt
        .query_map([limit as i64], |row| {
            Ok(JobRun {
                id: row.get(0)?,
                job_name: row.get(1)?,
                task: row.get(2)?,
                started_at: parse_ts(3, &row.get::<_, String>(3)?)?,
                finished_at: parse_ts(4, &row.get::<_, String>(4)?)?,
                outcome: parse_text(5, &row.get::<_, String>(5)?)?,
                rows_affected: row.get::<_, i64>(6)?.max(0) as u64,
                detail: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;
    Ok(runs)
}

/// The global switch. A database that never set it is enabled.
pub fn scheduler_enabled(conn: &Connection) -> Result<bool> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM scheduler_state WHERE key = ?1",
            [SCHEDULER_ENABLED_KEY],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.as_deref() != Some("off"))
}

pub fn set_scheduler_enabled(conn: &Connection, enabled: bool) -> Result<()> {
    conn.execute(
        "INSERT INTO scheduler_state (key, value) VALUES (?1, ?2)
         ON CONFLICT (key) DO UPDATE SET value = excluded.value",
        rusqlite::params![SCHEDULER_ENABLED_KEY, if enabled { "on" } else { "off" }],
    )?;
    info!(enabled, "scheduler switched");
    Ok(())
}
