use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::types::{format_date, format_timestamp, parse_timestamp, Ingredient, StockAlert};

/// Add an ingredient. Ingredients belong to the point-of-sale system; this
/// exists for imports and tests.
pub fn insert_ingredient(conn: &Connection, nombre: &str, stock: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO ingrediente (nombre, stock) VALUES (?1, ?2)",
        rusqlite::params![nombre, stock],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn set_stock(conn: &Connection, ingrediente_id: i64, stock: i64) -> Result<()> {
    conn.execute(
        "UPDATE ingrediente SET stock = ?1 WHERE id = ?2",
        rusqlite::params![stock, ingrediente_id],
    )?;
    Ok(())
}

fn collect_ingredients(
    stmt: &mut rusqlite::Statement<'_>,
    params: impl rusqlite::Params,
) -> Result<Vec<Ingredient>> {
    let rows = stmt
        .query_map(params, |row| {
            Ok(Ingredient {
                id: row.get(0)?,
                nombre: row.get(1)?,
                stock: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;
    Ok(rows)
}

/// Ingredients with stock strictly below `threshold`, by id.
pub fn ingredients_below(conn: &Connection, threshold: i64) -> Result<Vec<Ingredient>> {
    let mut stmt = conn.prepare(
        "SELECT id, nombre, stock FROM ingrediente WHERE stock < ?1 ORDER BY id",
    )?;
    collect_ingredients(&mut stmt, [threshold])
}

/// Ingredients with stock strictly below `threshold` that have no alert
/// recorded on `day`.
pub fn ingredients_below_without_alert(
    conn: &Connection,
    threshold: i64,
    day: NaiveDate,
) -> Result<Vec<Ingredient>> {
    let mut stmt = conn.prepare(
        "SELECT i.id, i.nombre, i.stock FROM ingrediente i
         WHERE i.stock < ?1
           AND NOT EXISTS (
               SELECT 1 FROM alerta_stock a
               WHERE a.ingrediente_id = i.id AND a.dia_alerta = ?2
           )
         ORDER BY i.id",
    )?;
    collect_ingredients(&mut stmt, rusqlite::params![threshold, format_date(day)])
}

/// Record a low-stock alert for `ingrediente_id` at `at`.
///
/// Returns `false` when the ingredient already has an alert on the same
/// calendar day; the existing row is left untouched. An unknown ingredient
/// id is a foreign-key violation.
pub fn record_alert(
    conn: &Connection,
    ingrediente_id: i64,
    stock_actual: i64,
    at: NaiveDateTime,
) -> Result<bool> {
    let ts = format_timestamp(at);
    let n = conn.execute(
        "INSERT INTO alerta_stock
         (ingrediente_id, stock_actual, fecha_alerta, dia_alerta, fecha_creacion)
         VALUES (?1, ?2, ?3, ?4, ?3)
         ON CONFLICT (ingrediente_id, dia_alerta) DO NOTHING",
        rusqlite::params![ingrediente_id, stock_actual, ts, format_date(at.date())],
    )?;
    if n == 0 {
        debug!(ingrediente_id, "alert already recorded today");
    }
    Ok(n > 0)
}

type AlertRow = (i64, i64, i64, String, String);

fn alerts_from_stmt(
    stmt: &mut rusqlite::Statement<'_>,
    params: impl rusqlite::Params,
) -> Result<Vec<StockAlert>> {
    let rows: Vec<AlertRow> = stmt
        .query_map(params, |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })?
        .collect::<rusqlite::Result<_>>()?;

    rows.into_iter()
        .map(|(id, ingrediente_id, stock_actual, fecha_alerta, fecha_creacion)| {
            Ok(StockAlert {
                id,
                ingrediente_id,
                stock_actual,
                fecha_alerta: parse_timestamp("alerta_stock.fecha_alerta", fecha_alerta)?,
                fecha_creacion: parse_timestamp("alerta_stock.fecha_creacion", fecha_creacion)?,
            })
        })
        .collect()
}

/// Alerts raised on `day`, in insertion order.
pub fn alerts_on(conn: &Connection, day: NaiveDate) -> Result<Vec<StockAlert>> {
    let mut stmt = conn.prepare(
        "SELECT id, ingrediente_id, stock_actual, fecha_alerta, fecha_creacion
         FROM alerta_stock WHERE dia_alerta = ?1 ORDER BY id",
    )?;
    alerts_from_stmt(&mut stmt, [format_date(day)])
}

/// Every alert, in insertion order.
pub fn list_alerts(conn: &Connection) -> Result<Vec<StockAlert>> {
    let mut stmt = conn.prepare(
        "SELECT id, ingrediente_id, stock_actual, fecha_alerta, fecha_creacion
         FROM alerta_stock ORDER BY id",
    )?;
    alerts_from_stmt(&mut stmt, [])
}

/// Delete alerts raised strictly before `cutoff`. Returns rows removed.
pub fn purge_alerts_before(conn: &Connection, cutoff: NaiveDate) -> Result<usize> {
    let n = conn.execute(
        "DELETE FROM alerta_stock WHERE dia_alerta < ?1",
        [format_date(cutoff)],
    )?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::error::StoreError;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        init_db(&conn).unwrap();
        conn
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn threshold_is_strict() {
        let conn = conn();
        insert_ingredient(&conn, "mozzarella", 4).unwrap();
        insert_ingredient(&conn, "albahaca", 5).unwrap();
        let low = ingredients_below(&conn, 5).unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].nombre, "mozzarella");
    }

    #[test]
    fn second_alert_same_day_is_ignored() {
        let conn = conn();
        let id = insert_ingredient(&conn, "tomate", 3).unwrap();
        assert!(record_alert(&conn, id, 3, at("2026-10-19 09:00:00")).unwrap());
        assert!(!record_alert(&conn, id, 8, at("2026-10-19 21:30:00")).unwrap());
        assert!(record_alert(&conn, id, 2, at("2026-10-20 00:00:10")).unwrap());

        let all = list_alerts(&conn).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].stock_actual, 3);
    }

    #[test]
    fn already_alerted_ingredients_are_excluded() {
        let conn = conn();
        let a = insert_ingredient(&conn, "harina", 1).unwrap();
        insert_ingredient(&conn, "aceite", 2).unwrap();
        record_alert(&conn, a, 1, at("2026-10-19 10:00:00")).unwrap();

        let day = at("2026-10-19 10:00:00").date();
        let pending = ingredients_below_without_alert(&conn, 10, day).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].nombre, "aceite");
    }

    #[test]
    fn unknown_ingredient_is_rejected() {
        let conn = conn();
        let err = record_alert(&conn, 999, 1, at("2026-10-19 10:00:00")).unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
        let mapped: forno_core::FornoError = err.into();
        assert!(matches!(mapped, forno_core::FornoError::ConstraintViolation(_)));
    }

    #[test]
    fn purge_keeps_cutoff_day() {
        let conn = conn();
        let id = insert_ingredient(&conn, "queso", 0).unwrap();
        record_alert(&conn, id, 0, at("2026-09-18 12:00:00")).unwrap();
        record_alert(&conn, id, 0, at("2026-09-19 12:00:00")).unwrap();

        let cutoff = at("2026-09-19 00:00:00").date();
        assert_eq!(purge_alerts_before(&conn, cutoff).unwrap(), 1);
        assert_eq!(list_alerts(&conn).unwrap().len(), 1);
    }
}
