//! tern-store - Migration store for Tern
//!
//! Keeps the durable record of which migration units are applied. The engine
//! only sees the [`MigrationStore`] trait; [`TableStore`] keeps the records
//! in a table of the migrated database.

pub mod error;
pub mod store;
pub mod table;

pub use error::{StoreError, StoreResult};
pub use store::MigrationStore;
pub use table::TableStore;
