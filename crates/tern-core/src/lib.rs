//! tern-core - Core library for Tern
//!
//! This crate provides the migration data model (units, identifiers, scopes,
//! applied records), configuration parsing, migration discovery and the
//! scaffolding used to create new migration files.

pub mod config;
pub mod discovery;
pub mod error;
pub mod migration_name;
pub mod scaffold;
pub mod scope;
pub mod unit;
pub mod unit_id;

pub use config::{Config, DatabaseConfig, DbType};
pub use discovery::{Discovery, Loader, MigrationSource};
pub use error::{CoreError, CoreResult, DiscoveryError, DiscoveryResult};
pub use migration_name::MigrationName;
pub use scaffold::{create_migration, ScaffoldLayout, Scaffolded};
pub use scope::Scope;
pub use unit::{AppliedRecord, MigrationUnit, Procedure};
pub use unit_id::UnitId;
