use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::Result;
use crate::money::{from_cents, to_cents};
use crate::types::{
    format_date, format_timestamp, parse_date, parse_timestamp, SalesSummary, SalesTotals,
    SummaryPeriod,
};

/// Record an order. Orders belong to the point-of-sale system; this exists
/// for imports and tests.
pub fn insert_order(conn: &Connection, fecha_pedido: NaiveDateTime, total: Decimal) -> Result<i64> {
    conn.execute(
        "INSERT INTO pedido (fecha_pedido, total_cents) VALUES (?1, ?2)",
        rusqlite::params![format_timestamp(fecha_pedido), to_cents(total)?],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Count and revenue of orders whose order date falls in `[from, to]`
/// (both inclusive). An empty range yields zero orders and 0.00.
pub fn totals_between(conn: &Connection, from: NaiveDate, to: NaiveDate) -> Result<SalesTotals> {
    let (orders, cents): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(total_cents), 0) FROM pedido
         WHERE date(fecha_pedido) BETWEEN ?1 AND ?2",
        rusqlite::params![format_date(from), format_date(to)],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(SalesTotals {
        orders,
        revenue: from_cents(cents),
    })
}

/// Insert or overwrite the summary for `(fecha, periodo)`.
///
/// Only the count and revenue change on conflict; `fecha_creacion` keeps the
/// value from the first insert.
pub fn upsert_summary(
    conn: &Connection,
    fecha: NaiveDate,
    periodo: SummaryPeriod,
    totals: SalesTotals,
    now: NaiveDateTime,
) -> Result<()> {
    conn.execute(
        "INSERT INTO resumen_ventas
         (fecha, periodo, total_pedidos, total_ingresos_cents, fecha_creacion)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (fecha, periodo) DO UPDATE SET
            total_pedidos = excluded.total_pedidos,
            total_ingresos_cents = excluded.total_ingresos_cents",
        rusqlite::params![
            format_date(fecha),
            periodo.to_string(),
            totals.orders,
            to_cents(totals.revenue)?,
            format_timestamp(now),
        ],
    )?;
    debug!(%fecha, %periodo, orders = totals.orders, revenue = %totals.revenue, "summary upserted");
    Ok(())
}

type SummaryRow = (String, String, i64, i64, String);

fn row_to_summary_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<SummaryRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn summary_from_raw(raw: SummaryRow) -> Result<SalesSummary> {
    let (fecha, periodo, total_pedidos, cents, creada) = raw;
    let periodo = periodo
        .parse::<SummaryPeriod>()
        .map_err(|_| crate::error::StoreError::Malformed {
            column: "resumen_ventas.periodo",
            value: periodo.clone(),
        })?;
    Ok(SalesSummary {
        fecha: parse_date("resumen_ventas.fecha", fecha)?,
        periodo,
        total_pedidos,
        total_ingresos: from_cents(cents),
        fecha_creacion: parse_timestamp("resumen_ventas.fecha_creacion", creada)?,
    })
}

/// Fetch one summary row, `None` if it does not exist.
pub fn get_summary(
    conn: &Connection,
    fecha: NaiveDate,
    periodo: SummaryPeriod,
) -> Result<Option<SalesSummary>> {
    let raw = conn
        .query_row(
            "SELECT fecha, periodo, total_pedidos, total_ingresos_cents, fecha_creacion
             FROM resumen_ventas WHERE fecha = ?1 AND periodo = ?2",
            rusqlite::params![format_date(fecha), periodo.to_string()],
            row_to_summary_raw,
        )
        .optional()?;
    raw.map(summary_from_raw).transpose()
}

/// Every summary row ordered by date, daily rows before weekly ones.
pub fn list_summaries(conn: &Connection) -> Result<Vec<SalesSummary>> {
    let mut stmt = conn.prepare(
        "SELECT fecha, periodo, total_pedidos, total_ingresos_cents, fecha_creacion
         FROM resumen_ventas ORDER BY fecha, periodo",
    )?;
    let rows: Vec<SummaryRow> = stmt
        .query_map([], row_to_summary_raw)?
        .collect::<rusqlite::Result<_>>()?;
    rows.into_iter().map(summary_from_raw).collect()
}

/// Delete summaries dated strictly before `cutoff`. Returns rows removed.
pub fn purge_summaries_before(conn: &Connection, cutoff: NaiveDate) -> Result<usize> {
    let n = conn.execute(
        "DELETE FROM resumen_ventas WHERE fecha < ?1",
        [format_date(cutoff)],
    )?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use std::str::FromStr;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn totals_include_both_range_ends() {
        let conn = conn();
        insert_order(&conn, at("2026-10-12 00:00:00"), dec("10.00")).unwrap();
        insert_order(&conn, at("2026-10-18 23:59:59"), dec("5.25")).unwrap();
        insert_order(&conn, at("2026-10-19 00:00:00"), dec("99.00")).unwrap();

        let totals = totals_between(&conn, day("2026-10-12"), day("2026-10-18")).unwrap();
        assert_eq!(totals.orders, 2);
        assert_eq!(totals.revenue, dec("15.25"));
    }

    #[test]
    fn empty_range_is_zero() {
        let conn = conn();
        let totals = totals_between(&conn, day("2026-01-01"), day("2026-01-01")).unwrap();
        assert_eq!(totals.orders, 0);
        assert_eq!(totals.revenue.to_string(), "0.00");
    }

    #[test]
    fn upsert_overwrites_figures_but_keeps_creation_time() {
        let conn = conn();
        let fecha = day("2026-10-18");
        upsert_summary(
            &conn,
            fecha,
            SummaryPeriod::Day,
            SalesTotals { orders: 1, revenue: dec("3.00") },
            at("2026-10-19 00:01:00"),
        )
        .unwrap();
        upsert_summary(
            &conn,
            fecha,
            SummaryPeriod::Day,
            SalesTotals { orders: 4, revenue: dec("20.00") },
            at("2026-10-19 08:00:00"),
        )
        .unwrap();

        let all = list_summaries(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].total_pedidos, 4);
        assert_eq!(all[0].total_ingresos, dec("20.00"));
        assert_eq!(all[0].fecha_creacion, at("2026-10-19 00:01:00"));
    }

    #[test]
    fn day_and_week_rows_share_a_date_without_colliding() {
        let conn = conn();
        let sunday = day("2026-10-18");
        let now = at("2026-10-19 01:00:00");
        upsert_summary(&conn, sunday, SummaryPeriod::Day, SalesTotals { orders: 2, revenue: dec("8.00") }, now).unwrap();
        upsert_summary(&conn, sunday, SummaryPeriod::Week, SalesTotals { orders: 9, revenue: dec("70.00") }, now).unwrap();

        let daily = get_summary(&conn, sunday, SummaryPeriod::Day).unwrap().unwrap();
        let weekly = get_summary(&conn, sunday, SummaryPeriod::Week).unwrap().unwrap();
        assert_eq!(daily.total_pedidos, 2);
        assert_eq!(weekly.total_pedidos, 9);
    }

    #[test]
    fn purge_is_strictly_before_cutoff() {
        let conn = conn();
        let now = at("2026-10-19 00:00:00");
        let totals = SalesTotals { orders: 0, revenue: Decimal::ZERO };
        upsert_summary(&conn, day("2025-10-18"), SummaryPeriod::Day, totals, now).unwrap();
        upsert_summary(&conn, day("2025-10-19"), SummaryPeriod::Day, totals, now).unwrap();

        let removed = purge_summaries_before(&conn, day("2025-10-19")).unwrap();
        assert_eq!(removed, 1);
        assert!(get_summary(&conn, day("2025-10-19"), SummaryPeriod::Day).unwrap().is_some());
    }
}
