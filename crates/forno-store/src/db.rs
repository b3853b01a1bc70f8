use rusqlite::Connection;

use crate::error::Result;

/// Initialise all tables for the sales/inventory store. Safe to call on every
/// startup: CREATE IF NOT EXISTS means it's idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_ingredient_table(conn)?;
    create_order_table(conn)?;
    create_summary_table(conn)?;
    create_alert_table(conn)?;
    Ok(())
}

fn create_ingredient_table(conn: &Connection) -> Result<()> {
    // Owned by the point-of-sale system; created here only when missing.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS ingrediente (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre  TEXT    NOT NULL UNIQUE,
            stock   INTEGER NOT NULL DEFAULT 0
        );",
    )?;
    Ok(())
}

fn create_order_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS pedido (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            fecha_pedido  TEXT    NOT NULL,   -- 'YYYY-MM-DD HH:MM:SS', business-local
            total_cents   INTEGER NOT NULL    -- hundredths of the currency unit
        );
        CREATE INDEX IF NOT EXISTS idx_pedido_fecha ON pedido (fecha_pedido);",
    )?;
    Ok(())
}

fn create_summary_table(conn: &Connection) -> Result<()> {
    // One row per (date, period), not one row per date: the weekly row is
    // dated on its Sunday and would otherwise overwrite that Sunday's daily
    // row. Readers that select by fecha alone must also filter on periodo
    // ('day' for the daily figures). fecha_creacion is written once and kept
    // across upserts.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS resumen_ventas (
            fecha                 TEXT    NOT NULL,   -- 'YYYY-MM-DD'
            periodo               TEXT    NOT NULL,   -- 'day' | 'week'
            total_pedidos         INTEGER NOT NULL,
            total_ingresos_cents  INTEGER NOT NULL,
            fecha_creacion        TEXT    NOT NULL,
            PRIMARY KEY (fecha, periodo)
        );",
    )?;
    Ok(())
}

fn create_alert_table(conn: &Connection) -> Result<()> {
    // UNIQUE(ingrediente_id, dia_alerta) keeps alert jobs idempotent: a
    // retried or repeated run on the same day cannot add a second row.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS alerta_stock (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            ingrediente_id  INTEGER NOT NULL REFERENCES ingrediente(id),
            stock_actual    INTEGER NOT NULL,
            fecha_alerta    TEXT    NOT NULL,   -- 'YYYY-MM-DD HH:MM:SS'
            dia_alerta      TEXT    NOT NULL,   -- 'YYYY-MM-DD'
            fecha_creacion  TEXT    NOT NULL,
            UNIQUE (ingrediente_id, dia_alerta)
        );
        CREATE INDEX IF NOT EXISTS idx_alerta_dia ON alerta_stock (dia_alerta);",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('ingrediente', 'pedido', 'resumen_ventas', 'alerta_stock')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }
}
