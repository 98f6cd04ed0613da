//! tern-db - Database abstraction layer for Tern
//!
//! This crate provides the `Database` and `Transaction` traits the migration
//! engine drives, and the DuckDB implementation selected by configuration.

pub mod duckdb;
pub mod error;
pub mod traits;

pub use crate::duckdb::{DuckDbBackend, DuckDbTransaction};
pub use error::{DbError, DbResult};
pub use traits::{Database, SqlRow, SqlValue, Transaction};

use std::sync::Arc;
use tern_core::config::{DatabaseConfig, DbType};

/// Open the backend described by `config`.
pub fn open_database(config: &DatabaseConfig) -> DbResult<Arc<dyn Database>> {
    log::debug!("Opening {} database at {}", config.db_type, config.path);
    match config.db_type {
        DbType::DuckDb => Ok(Arc::new(DuckDbBackend::new(&config.path)?)),
    }
}
