use chrono::{Duration, NaiveDate};
use forno_core::FornoError;
use forno_scheduler::{Task, TaskContext, TaskReport};
use forno_store::{inventory, sales};
use tracing::info;

use crate::calendar::BusinessCalendar;

/// Deletes summaries and alerts older than their retention windows.
///
/// A row survives while its age in days is at most the retention; at
/// retention + 1 days it is removed.
pub struct PurgeOldRecords {
    calendar: BusinessCalendar,
    summary_retention_days: i64,
    alert_retention_days: i64,
}

impl PurgeOldRecords {
    pub fn new(
        calendar: BusinessCalendar,
        summary_retention_days: i64,
        alert_retention_days: i64,
    ) -> Self {
        Self {
            calendar,
            summary_retention_days,
            alert_retention_days,
        }
    }
}

impl Task for PurgeOldRecords {
    fn run(&self, ctx: &TaskContext<'_>) -> forno_core::Result<TaskReport> {
        let today = self.calendar.today(ctx.now);
        let summary_cutoff = cutoff(today, self.summary_retention_days)?;
        let alert_cutoff = cutoff(today, self.alert_retention_days)?;

        let summaries = sales::purge_summaries_before(ctx.conn, summary_cutoff)?;
        let alerts = inventory::purge_alerts_before(ctx.conn, alert_cutoff)?;

        info!(
            job = %ctx.job_name,
            summaries,
            alerts,
            %summary_cutoff,
            %alert_cutoff,
            "old records purged"
        );
        Ok(TaskReport::new(
            (summaries + alerts) as u64,
            format!("{summaries} summary row(s) before {summary_cutoff}, {alerts} alert(s) before {alert_cutoff}"),
        ))
    }
}

fn cutoff(today: NaiveDate, retention_days: i64) -> forno_core::Result<NaiveDate> {
    Duration::try_days(retention_days)
        .and_then(|d| today.checked_sub_signed(d))
        .ok_or_else(|| FornoError::Config(format!("retention of {retention_days} days is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::testing::{at, conn, day, utc};
    use forno_store::{SalesTotals, SummaryPeriod};
    use rust_decimal::Decimal;

    #[test]
    fn summary_boundary_is_strictly_older_than_365_days() {
        let conn = conn();
        let now = utc(2026, 10, 19, 12, 2);
        let totals = SalesTotals { orders: 1, revenue: Decimal::ONE };
        let stamp = at("2025-10-18 00:00:00");
        // 2026-10-19 minus 365 days is 2025-10-19; minus 366 is 2025-10-18.
        sales::upsert_summary(&conn, day("2025-10-19"), SummaryPeriod::Day, totals, stamp).unwrap();
        sales::upsert_summary(&conn, day("2025-10-18"), SummaryPeriod::Day, totals, stamp).unwrap();

        let report = PurgeOldRecords::new(BusinessCalendar::utc(), 365, 30)
            .run(&TaskContext { conn: &conn, now, job_name: "purge_old_records" })
            .unwrap();
        assert_eq!(report.rows_affected, 1);

        let left = sales::list_summaries(&conn).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].fecha, day("2025-10-19"));
    }

    #[test]
    fn alerts_older_than_30_days_go() {
        let conn = conn();
        let id = inventory::insert_ingredient(&conn, "ajo", 1).unwrap();
        inventory::record_alert(&conn, id, 1, at("2026-09-18 10:00:00")).unwrap(); // 31 days
        inventory::record_alert(&conn, id, 1, at("2026-09-19 10:00:00")).unwrap(); // 30 days
        inventory::record_alert(&conn, id, 1, at("2026-10-19 08:00:00")).unwrap(); // today

        PurgeOldRecords::new(BusinessCalendar::utc(), 365, 30)
            .run(&TaskContext { conn: &conn, now: utc(2026, 10, 19, 12, 2), job_name: "purge_old_records" })
            .unwrap();

        let left = inventory::list_alerts(&conn).unwrap();
        assert_eq!(left.len(), 2);
        assert_eq!(left[0].fecha_alerta, at("2026-09-19 10:00:00"));
    }

    #[test]
    fn unrepresentable_retention_is_an_error() {
        let conn = conn();
        let err = PurgeOldRecords::new(BusinessCalendar::utc(), i64::MAX, 30)
            .run(&TaskContext { conn: &conn, now: utc(2026, 10, 19, 12, 2), job_name: "purge_old_records" })
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");

        let err = PurgeOldRecords::new(BusinessCalendar::utc(), 365, 1_000_000_000)
            .run(&TaskContext { conn: &conn, now: utc(2026, 10, 19, 12, 2), job_name: "purge_old_records" })
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
