use forno_scheduler::{Task, TaskContext, TaskReport};
use forno_store::inventory;
use tracing::{debug, warn};

use crate::calendar::BusinessCalendar;

/// Recurring check: alerts ingredients below the threshold that have not
/// been alerted yet today.
pub struct StockMonitor {
    calendar: BusinessCalendar,
    threshold: i64,
}

impl StockMonitor {
    pub fn new(calendar: BusinessCalendar, threshold: i64) -> Self {
        Self {
            calendar,
            threshold,
        }
    }
}

impl Task for StockMonitor {
    fn run(&self, ctx: &TaskContext<'_>) -> forno_core::Result<TaskReport> {
        let local_now = self.calendar.local(ctx.now);
        let pending =
            inventory::ingredients_below_without_alert(ctx.conn, self.threshold, local_now.date())?;

        let mut raised = 0u64;
        for ingredient in &pending {
            // The unique (ingredient, day) key backs up the NOT EXISTS filter.
            if inventory::record_alert(ctx.conn, ingredient.id, ingredient.stock, local_now)? {
                warn!(
                    job = %ctx.job_name,
                    ingrediente = %ingredient.nombre,
                    stock = ingredient.stock,
                    "stock below monitor threshold"
                );
                raised += 1;
            }
        }

        debug!(job = %ctx.job_name, raised, "stock monitor pass done");
        Ok(TaskReport::new(raised, format!("{raised} new alert(s)")))
    }
}
