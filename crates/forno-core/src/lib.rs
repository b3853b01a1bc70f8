pub mod config;
pub mod error;

pub use config::FornoConfig;
pub use error::{FornoError, Result};
