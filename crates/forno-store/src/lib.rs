//! `forno-store` — SQLite access for the pizzeria's sales and inventory tables.
//!
//! The jobs write to two tables, `resumen_ventas` and `alerta_stock`, and
//! read from two tables owned by the point-of-sale system, `pedido` and
//! `ingrediente`. [`db::init_db`] creates all four so a fresh database is
//! usable on its own.

pub mod db;
pub mod error;
pub mod inventory;
pub mod money;
pub mod sales;
pub mod types;

pub use error::{Result, StoreError};
pub use types::{Ingredient, SalesSummary, SalesTotals, StockAlert, SummaryPeriod};
