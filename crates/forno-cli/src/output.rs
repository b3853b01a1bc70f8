//! Plain-text tables for the `jobs` subcommands.

use chrono::{DateTime, SecondsFormat, Utc};
use forno_scheduler::{Job, JobRun};

pub fn ts(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "-".to_string())
}

fn interval(job: &Job) -> String {
    match job.interval_secs() {
        Some(secs) if secs % 86_400 == 0 => format!("{}d", secs / 86_400),
        Some(secs) if secs % 3_600 == 0 => format!("{}h", secs / 3_600),
        Some(secs) if secs % 60 == 0 => format!("{}m", secs / 60),
        Some(secs) => format!("{secs}s"),
        None => "-".to_string(),
    }
}

pub fn job_row(job: &Job) -> String {
    format!(
        "{:<20} {:<10} {:<21} {:<8} {:<10} {:<9} {:<21} {}",
        job.name,
        job.kind().to_string(),
        ts(job.next_run),
        interval(job),
        job.status.to_string(),
        job.persistence.to_string(),
        ts(Some(job.created_at)),
        ts(job.last_run),
    )
}

pub fn print_jobs(jobs: &[Job]) {
    if jobs.is_empty() {
        println!("no jobs");
        return;
    }
    println!(
        "{:<20} {:<10} {:<21} {:<8} {:<10} {:<9} {:<21} {}",
        "NAME", "TYPE", "NEXT RUN", "EVERY", "STATUS", "AFTER", "CREATED", "LAST RUN"
    );
    for job in jobs {
        println!("{}", job_row(job));
        if let Some(err) = &job.last_error {
            println!("    last error: {err}");
        }
    }
}

pub fn print_runs(runs: &[JobRun]) {
    if runs.is_empty() {
        println!("no runs recorded");
        return;
    }
    for run in runs {
        println!(
            "{} {:<20} {:<9} rows={:<5} {}",
            ts(Some(run.started_at)),
            run.job_name,
            run.outcome.to_string(),
            run.rows_affected,
            run.detail.as_deref().unwrap_or(""),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use forno_scheduler::{JobStatus, PersistenceMode, Trigger};

    fn job(trigger: Trigger) -> Job {
        let t = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        Job {
            id: "id".into(),
            name: "stock_monitor".into(),
            task: "stock_monitor".into(),
            trigger,
            persistence: PersistenceMode::PreserveAfterRun,
            status: JobStatus::Scheduled,
            next_run: Some(t),
            last_run: None,
            run_count: 0,
            attempts: 0,
            last_error: None,
            created_at: t,
            updated_at: t,
        }
    }

    #[test]
    fn row_shows_interval_and_mode() {
        let t = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let row = job_row(&job(Trigger::every(chrono::Duration::minutes(30), t)));
        assert!(row.starts_with("stock_monitor"));
        assert!(row.contains("recurring"));
        assert!(row.contains("30m"));
        assert!(row.contains("preserve"));
        assert!(row.contains("2026-10-19T12:00:00Z"));
    }

    #[test]
    fn one_shot_has_no_interval() {
        let t = Utc.with_ymd_and_hms(2026, 10, 19, 12, 1, 0).unwrap();
        let row = job_row(&job(Trigger::at(t)));
        assert!(row.contains("one_shot"));
        assert!(row.contains(" - "));
    }
}
