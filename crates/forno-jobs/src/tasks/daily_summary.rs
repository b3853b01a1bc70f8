use forno_scheduler::{Task, TaskContext, TaskReport};
use forno_store::{sales, SummaryPeriod};
use tracing::info;

use crate::calendar::{previous_day, BusinessCalendar};

/// Summarises yesterday's orders into `resumen_ventas`.
///
/// Re-running for the same day recomputes and overwrites the same row.
pub struct DailySummary {
    calendar: BusinessCalendar,
}

impl DailySummary {
    pub fn new(calendar: BusinessCalendar) -> Self {
        Self { calendar }
    }
}

impl Task for DailySummary {
    fn run(&self, ctx: &TaskContext<'_>) -> forno_core::Result<TaskReport> {
        let day = previous_day(self.calendar.today(ctx.now));
        let totals = sales::totals_between(ctx.conn, day, day)?;
        sales::upsert_summary(
            ctx.conn,
            day,
            SummaryPeriod::Day,
            totals,
            self.calendar.local(ctx.now),
        )?;

        info!(job = %ctx.job_name, %day, orders = totals.orders, revenue = %totals.revenue, "daily summary written");
        Ok(TaskReport::new(
            1,
            format!("{day}: {} orders, {} revenue", totals.orders, totals.revenue),
        ))
    }
}
