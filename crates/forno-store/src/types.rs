use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Storage format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Storage format for business-local timestamps. SQLite's `date()` accepts it.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Granularity of a `resumen_ventas` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryPeriod {
    Day,
    Week,
}

impl std::fmt::Display for SummaryPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummaryPeriod::Day => write!(f, "day"),
            SummaryPeriod::Week => write!(f, "week"),
        }
    }
}

impl std::str::FromStr for SummaryPeriod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "day" => Ok(SummaryPeriod::Day),
            "week" => Ok(SummaryPeriod::Week),
            other => Err(format!("unknown summary period: {other}")),
        }
    }
}

/// Order count and revenue over some date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesTotals {
    pub orders: i64,
    pub revenue: Decimal,
}

impl SalesTotals {
    /// The historical "alert ran" marker: -1 orders, -1.00 revenue.
    pub fn sentinel() -> Self {
        Self {
            orders: -1,
            revenue: Decimal::new(-100, 2),
        }
    }
}

/// A row of `resumen_ventas`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub fecha: NaiveDate,
    pub periodo: SummaryPeriod,
    pub total_pedidos: i64,
    pub total_ingresos: Decimal,
    pub fecha_creacion: NaiveDateTime,
}

/// A row of `alerta_stock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub id: i64,
    pub ingrediente_id: i64,
    pub stock_actual: i64,
    pub fecha_alerta: NaiveDateTime,
    pub fecha_creacion: NaiveDateTime,
}

/// A row of the external `ingrediente` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    pub nombre: String,
    pub stock: i64,
}

pub(crate) fn format_date(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

pub(crate) fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_date(column: &'static str, value: String) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&value, DATE_FORMAT)
        .map_err(|_| StoreError::Malformed { column, value })
}

pub(crate) fn parse_timestamp(column: &'static str, value: String) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT)
        .map_err(|_| StoreError::Malformed { column, value })
}
