//! Task implementations. Each runs inside the transaction the scheduler
//! opened for it, so its reads and writes are atomic.

mod daily_summary;
mod low_stock_alert;
mod purge;
mod stock_monitor;
mod weekly_summary;

pub use daily_summary::DailySummary;
pub use low_stock_alert::LowStockAlert;
pub use purge::PurgeOldRecords;
pub use stock_monitor::StockMonitor;
pub use weekly_summary::WeeklySummary;

pub const DAILY_SUMMARY: &str = "daily_summary";
pub const WEEKLY_SUMMARY: &str = "weekly_summary";
pub const LOW_STOCK_ALERT: &str = "low_stock_alert";
pub const STOCK_MONITOR: &str = "stock_monitor";
pub const PURGE_OLD_RECORDS: &str = "purge_old_records";

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
    use rusqlite::Connection;

    pub fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        forno_store::db::init_db(&conn).unwrap();
        conn
    }

    pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    pub fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }
}
