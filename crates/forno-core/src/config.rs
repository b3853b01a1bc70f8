use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FornoError;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 60;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const MAX_RETRY_DELAY_SECS: u64 = 30 * 86_400;
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Top-level config (forno.toml + FORNO_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FornoConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub business: BusinessConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    /// How long a statement waits on a locked database before failing with
    /// a transient error.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Delay before a one-shot job that hit a transient error is tried again.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Attempts a one-shot job gets before it is parked as `failed`.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Knobs for the sales/inventory jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessConfig {
    /// Offset of the pizzeria's local time from UTC. "Today" and
    /// "yesterday" are computed in this offset.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Stock strictly below this triggers the one-shot low-stock alert.
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,
    /// Stock strictly below this triggers the recurring stock monitor.
    #[serde(default = "default_monitor_threshold")]
    pub monitor_threshold: i64,
    /// Sales summaries older than this many days are purged.
    #[serde(default = "default_summary_retention_days")]
    pub summary_retention_days: i64,
    /// Stock alerts older than this many days are purged.
    #[serde(default = "default_alert_retention_days")]
    pub alert_retention_days: i64,
    /// Also write the historical `-1 / -1.00` marker row into
    /// `resumen_ventas` when the low-stock alert runs. Off by default; the
    /// job-run log records every execution anyway.
    #[serde(default)]
    pub legacy_sentinel_marker: bool,
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            low_stock_threshold: default_low_stock_threshold(),
            monitor_threshold: default_monitor_threshold(),
            summary_retention_days: default_summary_retention_days(),
            alert_retention_days: default_alert_retention_days(),
            legacy_sentinel_marker: false,
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.forno/forno.db", home)
}
fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}
fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}
fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_low_stock_threshold() -> i64 {
    5
}
fn default_monitor_threshold() -> i64 {
    10
}
fn default_summary_retention_days() -> i64 {
    365
}
fn default_alert_retention_days() -> i64 {
    30
}

impl FornoConfig {
    /// Load config from a TOML file with FORNO_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.forno/forno.toml
    ///
    /// A missing file is not an error; defaults fill every gap. Nested keys
    /// are addressed with a double underscore, e.g.
    /// `FORNO_BUSINESS__UTC_OFFSET_MINUTES=-300`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        debug!(%path, "loading config");

        Self::from_figment(
            Self::base_figment()
                .merge(Toml::file(&path))
                .merge(Env::prefixed("FORNO_").split("__")),
        )
    }

    /// Parse config from an in-memory TOML document (no env overrides).
    pub fn from_toml_str(toml: &str) -> crate::error::Result<Self> {
        Self::from_figment(Self::base_figment().merge(Toml::string(toml)))
    }

    fn base_figment() -> Figment {
        Figment::from(Serialized::defaults(FornoConfig::default()))
    }

    fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| FornoError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler cannot turn into a date or delay.
    pub fn validate(&self) -> crate::error::Result<()> {
        let s = &self.scheduler;
        if s.poll_interval_secs == 0 {
            return Err(FornoError::Config("scheduler.poll_interval_secs must be at least 1".into()));
        }
        if s.retry_delay_secs > MAX_RETRY_DELAY_SECS {
            return Err(FornoError::Config(format!(
                "scheduler.retry_delay_secs must be at most {MAX_RETRY_DELAY_SECS}"
            )));
        }
        let b = &self.business;
        for (key, days) in [
            ("summary_retention_days", b.summary_retention_days),
            ("alert_retention_days", b.alert_retention_days),
        ] {
            if !(0..=MAX_RETENTION_DAYS).contains(&days) {
                return Err(FornoError::Config(format!(
                    "business.{key} must be between 0 and {MAX_RETENTION_DAYS}, got {days}"
                )));
            }
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.forno/forno.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = FornoConfig::from_toml_str("").expect("parse");
        assert_eq!(cfg.scheduler.poll_interval_secs, 1);
        assert_eq!(cfg.scheduler.max_attempts, 3);
        assert_eq!(cfg.business.low_stock_threshold, 5);
        assert_eq!(cfg.business.monitor_threshold, 10);
        assert_eq!(cfg.business.summary_retention_days, 365);
        assert_eq!(cfg.business.alert_retention_days, 30);
        assert!(!cfg.business.legacy_sentinel_marker);
        assert!(cfg.database.path.ends_with("forno.db"));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let cfg = FornoConfig::from_toml_str(
            r#"
            [database]
            path = "/tmp/pizzeria.db"

            [business]
            utc_offset_minutes = 120
            legacy_sentinel_marker = true
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.database.path, "/tmp/pizzeria.db");
        assert_eq!(cfg.database.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert_eq!(cfg.business.utc_offset_minutes, 120);
        assert!(cfg.business.legacy_sentinel_marker);
        assert_eq!(cfg.business.low_stock_threshold, 5);
    }

    #[test]
    fn out_of_range_durations_are_config_errors() {
        for doc in [
            "[business]\nsummary_retention_days = 9223372036854775807",
            "[business]\nalert_retention_days = -1",
            "[scheduler]\nretry_delay_secs = 2678400",
            "[scheduler]\npoll_interval_secs = 0",
        ] {
            let err = FornoConfig::from_toml_str(doc).expect_err(doc);
            assert_eq!(err.code(), "CONFIG_ERROR", "{doc}");
        }
        FornoConfig::from_toml_str("[business]\nsummary_retention_days = 36500").expect("upper bound");
    }

    #[test]
    fn wrong_type_is_config_error() {
        let err = FornoConfig::from_toml_str("[scheduler]\nmax_attempts = \"many\"")
            .expect_err("should fail");
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
