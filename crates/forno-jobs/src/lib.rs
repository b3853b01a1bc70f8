//! `forno-jobs` — the pizzeria's scheduled jobs.
//!
//! | Task key            | Trigger                                | After run |
//! |---------------------|----------------------------------------|-----------|
//! | `daily_summary`     | once, 1 minute after install           | deleted   |
//! | `weekly_summary`    | every 7 days from next Monday 01:00    | kept      |
//! | `low_stock_alert`   | once, 5 minutes after install          | deleted   |
//! | `stock_monitor`     | every 30 minutes from install          | kept      |
//! | `purge_old_records` | once, 2 minutes after install          | deleted   |

pub mod calendar;
pub mod catalog;
pub mod tasks;

pub use calendar::BusinessCalendar;
pub use catalog::{build_registry, default_jobs};
