use forno_scheduler::{Task, TaskContext, TaskReport};
use forno_store::{sales, SummaryPeriod};
use tracing::info;

use crate::calendar::{last_completed_week, BusinessCalendar};

/// Summarises the last completed Monday..Sunday week, keyed by its Sunday.
pub struct WeeklySummary {
    calendar: BusinessCalendar,
}

impl WeeklySummary {
    pub fn new(calendar: BusinessCalendar) -> Self {
        Self { calendar }
    }
}

impl Task for WeeklySummary {
    fn run(&self, ctx: &TaskContext<'_>) -> forno_core::Result<TaskReport> {
        let week = last_completed_week(self.calendar.today(ctx.now));
        let totals = sales::totals_between(ctx.conn, week.start, week.end)?;
        sales::upsert_summary(
            ctx.conn,
            week.end,
            SummaryPeriod::Week,
            totals,
            self.calendar.local(ctx.now),
        )?;

        info!(
            job = %ctx.job_name,
            week_start = %week.start,
            week_end = %week.end,
            orders = totals.orders,
            revenue = %totals.revenue,
            "weekly summary written"
        );
        Ok(TaskReport::new(
            1,
            format!(
                "{}..{}: {} orders, {} revenue",
                week.start, week.end, totals.orders, totals.revenue
            ),
        ))
    }
}
