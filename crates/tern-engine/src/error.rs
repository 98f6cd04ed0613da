//! Error types for the execution engine.

use tern_core::{DiscoveryError, UnitId};
use tern_db::DbError;
use tern_store::StoreError;
use thiserror::Error;

/// Execution engine errors.
///
/// Everything before [`EngineError::Procedure`] is raised while planning,
/// before any migration transaction is opened.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Migration source unreadable or malformed (R001).
    #[error("[R001] Migration discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Colliding identifiers or records without a unit (R002).
    #[error("[R002] Inconsistent migration state: {message}")]
    Consistency { message: String },

    /// A revert was requested for a unit without a down procedure (R003).
    #[error("[R003] Migration {unit} has no down procedure and cannot be reverted")]
    Irreversible { id: UnitId, unit: String },

    /// The unit's procedure failed and its transaction was rolled back (R004).
    #[error("[R004] Migration {unit} failed: {source}")]
    Procedure {
        id: UnitId,
        unit: String,
        #[source]
        source: DbError,
    },

    /// The unit's transaction could not be opened or committed (R005).
    #[error("[R005] Transaction for migration {unit} failed: {source}")]
    Transaction {
        id: UnitId,
        unit: String,
        #[source]
        source: DbError,
    },

    /// The unit committed but its applied record was not updated (R006).
    #[error(
        "[R006] Migration {unit} was committed but the migration store was not updated: {source}. \
         Reconcile the store manually before running again"
    )]
    StoreInconsistency {
        id: UnitId,
        unit: String,
        #[source]
        source: StoreError,
    },

    /// Applied records could not be read (R007).
    #[error("[R007] Migration store unavailable: {0}")]
    Store(#[from] StoreError),

    /// An earlier batch on this engine failed (R008).
    #[error("[R008] Engine halted after a failed batch; inspect the failure and start a new run")]
    Halted,
}

/// Result type alias for [`EngineError`].
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Identifier of the unit the error is about, if it concerns one unit.
    pub fn failed_unit(&self) -> Option<UnitId> {
        match self {
            EngineError::Irreversible { id, .. }
            | EngineError::Procedure { id, .. }
            | EngineError::Transaction { id, .. }
            | EngineError::StoreInconsistency { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub(crate) fn consistency(message: impl Into<String>) -> Self {
        EngineError::Consistency {
            message: message.into(),
        }
    }
}
