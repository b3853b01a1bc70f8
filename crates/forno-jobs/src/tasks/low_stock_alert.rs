use forno_scheduler::{Task, TaskContext, TaskReport};
use forno_store::{inventory, sales, SalesTotals, SummaryPeriod};
use tracing::{info, warn};

use crate::calendar::BusinessCalendar;

/// Raises one alert per ingredient whose stock is below the threshold.
///
/// Alerts are keyed by ingredient and day, so an ingredient that already
/// has an alert today (from an earlier run or from the monitor) is left
/// alone.
pub struct LowStockAlert {
    calendar: BusinessCalendar,
    threshold: i64,
    sentinel_marker: bool,
}

impl LowStockAlert {
    pub fn new(calendar: BusinessCalendar, threshold: i64) -> Self {
        Self {
            calendar,
            threshold,
            sentinel_marker: false,
        }
    }

    /// Also write the `-1 / -1.00` row for today into `resumen_ventas`,
    /// for reports that still look for it.
    pub fn with_sentinel_marker(mut self, enabled: bool) -> Self {
        self.sentinel_marker = enabled;
        self
    }
}

impl Task for LowStockAlert {
    fn run(&self, ctx: &TaskContext<'_>) -> forno_core::Result<TaskReport> {
        let local_now = self.calendar.local(ctx.now);
        let low = inventory::ingredients_below(ctx.conn, self.threshold)?;

        let mut raised = 0u64;
        for ingredient in &low {
            if inventory::record_alert(ctx.conn, ingredient.id, ingredient.stock, local_now)? {
                warn!(
                    job = %ctx.job_name,
                    ingrediente = %ingredient.nombre,
                    stock = ingredient.stock,
                    "low stock"
                );
                raised += 1;
            }
        }

        let mut rows = raised;
        if self.sentinel_marker {
            sales::upsert_summary(
                ctx.conn,
                local_now.date(),
                SummaryPeriod::Day,
                SalesTotals::sentinel(),
                local_now,
            )?;
            rows += 1;
        }

        info!(job = %ctx.job_name, below = low.len(), raised, "low-stock check done");
        Ok(TaskReport::new(
            rows,
            format!(
                "{} ingredient(s) below {}, {raised} alert(s) raised",
                low.len(),
                self.threshold
            ),
        ))
    }
}
