use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
///
/// Creates the `jobs`, `job_runs` and `scheduler_state` tables (idempotent)
/// and an index on `next_run` so the polling query stays cheap.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id           TEXT    NOT NULL PRIMARY KEY,
            name         TEXT    NOT NULL UNIQUE,
            task         TEXT    NOT NULL,   -- key into the TaskRegistry
            trigger_spec TEXT    NOT NULL,   -- JSON-encoded Trigger enum
            persistence  TEXT    NOT NULL,   -- 'preserve' | 'delete'
            status       TEXT    NOT NULL DEFAULT 'scheduled',
            next_run     TEXT,               -- RFC 3339 (ms, Z) or NULL
            last_run     TEXT,
            run_count    INTEGER NOT NULL DEFAULT 0,
            attempts     INTEGER NOT NULL DEFAULT 0,   -- consecutive failures
            last_error   TEXT,
            created_at   TEXT    NOT NULL,
            updated_at   TEXT    NOT NULL
        ) STRICT;

        -- Efficient polling: SELECT … WHERE status = 'scheduled' AND next_run <= ?
        CREATE INDEX IF NOT EXISTS idx_jobs_next_run ON jobs (next_run);

        -- Append-only audit trail; rows outlive the jobs that wrote them.
        CREATE TABLE IF NOT EXISTS job_runs (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            job_name       TEXT    NOT NULL,
            task           TEXT    NOT NULL,
            started_at     TEXT    NOT NULL,
            finished_at    TEXT    NOT NULL,
            outcome        TEXT    NOT NULL,   -- 'completed' | 'failed' | 'skipped'
            rows_affected  INTEGER NOT NULL DEFAULT 0,
            detail         TEXT
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_job_runs_started ON job_runs (started_at);

        CREATE TABLE IF NOT EXISTS scheduler_state (
            key    TEXT NOT NULL PRIMARY KEY,
            value  TEXT NOT NULL
        ) STRICT;
        ",
    )?;
    Ok(())
}
