//! tern-engine - Migration execution engine for Tern
//!
//! Plans a batch from discovered units and the migration store, then applies
//! or reverts it one unit at a time through the database adapter, stopping
//! at the first failure.

pub mod batch;
pub mod engine;
pub mod error;
mod plan;

pub use batch::{BatchResult, Direction, Limit};
pub use engine::{Engine, EngineState, StatusEntry, UnitStatus};
pub use error::{EngineError, EngineResult};
