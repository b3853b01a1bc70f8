//! The pizzeria's job set: which tasks exist and when they fire.

use chrono::{DateTime, Duration, NaiveTime, Utc, Weekday};
use forno_core::config::BusinessConfig;
use forno_scheduler::{JobSpec, PersistenceMode, TaskRegistry, Trigger};

use crate::calendar::{next_weekday_at, BusinessCalendar};
use crate::tasks::{
    DailySummary, LowStockAlert, PurgeOldRecords, StockMonitor, WeeklySummary, DAILY_SUMMARY,
    LOW_STOCK_ALERT, PURGE_OLD_RECORDS, STOCK_MONITOR, WEEKLY_SUMMARY,
};

/// Register every task under its key, configured from `cfg`.
pub fn build_registry(cfg: &BusinessConfig) -> forno_core::Result<TaskRegistry> {
    let calendar = BusinessCalendar::from_config(cfg)?;
    let mut registry = TaskRegistry::new();
    registry
        .register(DAILY_SUMMARY, DailySummary::new(calendar))
        .register(WEEKLY_SUMMARY, WeeklySummary::new(calendar))
        .register(
            LOW_STOCK_ALERT,
            LowStockAlert::new(calendar, cfg.low_stock_threshold)
                .with_sentinel_marker(cfg.legacy_sentinel_marker),
        )
        .register(STOCK_MONITOR, StockMonitor::new(calendar, cfg.monitor_threshold))
        .register(
            PURGE_OLD_RECORDS,
            PurgeOldRecords::new(calendar, cfg.summary_retention_days, cfg.alert_retention_days),
        );
    Ok(registry)
}

fn job(task: &str, trigger: Trigger, persistence: PersistenceMode) -> JobSpec {
    JobSpec {
        name: task.to_string(),
        task: task.to_string(),
        trigger,
        persistence,
    }
}

/// The default schedule, relative to the install time `now`.
///
/// The weekly summary is anchored on the first Monday 01:00 (local) strictly
/// after `now`, so it always closes a full week.
pub fn default_jobs(now: DateTime<Utc>, calendar: &BusinessCalendar) -> Vec<JobSpec> {
    let one_am = NaiveTime::from_hms_opt(1, 0, 0).unwrap_or(NaiveTime::MIN);
    let first_monday = calendar.to_utc(next_weekday_at(calendar.local(now), Weekday::Mon, one_am));

    vec![
        job(
            DAILY_SUMMARY,
            Trigger::at(now + Duration::minutes(1)),
            PersistenceMode::DeleteAfterRun,
        ),
        job(
            WEEKLY_SUMMARY,
            Trigger::every(Duration::days(7), first_monday),
            PersistenceMode::PreserveAfterRun,
        ),
        job(
            LOW_STOCK_ALERT,
            Trigger::at(now + Duration::minutes(5)),
            PersistenceMode::DeleteAfterRun,
        ),
        job(
            STOCK_MONITOR,
            Trigger::every(Duration::minutes(30), now),
            PersistenceMode::PreserveAfterRun,
        ),
        job(
            PURGE_OLD_RECORDS,
            Trigger::at(now + Duration::minutes(2)),
            PersistenceMode::DeleteAfterRun,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        // Monday afternoon.
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn registry_has_every_task() {
        let registry = build_registry(&BusinessConfig::default()).unwrap();
        let keys: Vec<&str> = registry.keys().collect();
        assert_eq!(
            keys,
            vec![DAILY_SUMMARY, LOW_STOCK_ALERT, PURGE_OLD_RECORDS, STOCK_MONITOR, WEEKLY_SUMMARY]
        );
    }

    #[test]
    fn bad_offset_fails_registry() {
        let cfg = BusinessConfig {
            utc_offset_minutes: 30 * 60,
            ..BusinessConfig::default()
        };
        assert!(build_registry(&cfg).is_err());
    }

    #[test]
    fn default_triggers() {
        let jobs = default_jobs(now(), &BusinessCalendar::utc());
        let by_name = |name: &str| jobs.iter().find(|j| j.name == name).unwrap().clone();

        assert_eq!(jobs.len(), 5);
        assert_eq!(by_name(DAILY_SUMMARY).trigger, Trigger::at(now() + Duration::minutes(1)));
        assert_eq!(by_name(PURGE_OLD_RECORDS).trigger, Trigger::at(now() + Duration::minutes(2)));
        assert_eq!(by_name(LOW_STOCK_ALERT).trigger, Trigger::at(now() + Duration::minutes(5)));
        assert_eq!(
            by_name(STOCK_MONITOR).trigger,
            Trigger::Every { every_secs: 1800, starts: now() }
        );
        assert_eq!(by_name(DAILY_SUMMARY).persistence, PersistenceMode::DeleteAfterRun);
        assert_eq!(by_name(STOCK_MONITOR).persistence, PersistenceMode::PreserveAfterRun);
    }

    #[test]
    fn weekly_starts_next_monday_local() {
        let jobs = default_jobs(now(), &BusinessCalendar::utc());
        let weekly = jobs.iter().find(|j| j.name == WEEKLY_SUMMARY).unwrap();
        assert_eq!(
            weekly.trigger,
            Trigger::Every {
                every_secs: 7 * 24 * 3600,
                starts: Utc.with_ymd_and_hms(2026, 10, 26, 1, 0, 0).unwrap(),
            }
        );

        // At UTC+2, Monday 01:00 local is Sunday 23:00 UTC.
        let cal = BusinessCalendar::with_offset_minutes(120).unwrap();
        let jobs = default_jobs(now(), &cal);
        let weekly = jobs.iter().find(|j| j.name == WEEKLY_SUMMARY).unwrap();
        match weekly.trigger {
            Trigger::Every { starts, .. } => {
                assert_eq!(starts, Utc.with_ymd_and_hms(2026, 10, 25, 23, 0, 0).unwrap())
            }
            ref other => panic!("unexpected trigger {other:?}"),
        }
    }
}
