//! The migration store contract.

use crate::error::StoreResult;
use async_trait::async_trait;
use tern_core::{AppliedRecord, MigrationUnit, Scope};

/// Durable record of which migration units are applied.
///
/// Every operation is atomic with respect to the persisted structure: it runs
/// in its own transaction and never leaves a partially written record.
#[async_trait]
pub trait MigrationStore: Send + Sync {
    /// Create the backing structure if it does not exist. Safe to call on
    /// every run.
    async fn initialize(&self) -> StoreResult<()>;

    /// Applied records ascending by identifier, restricted to the subtree of
    /// `scope` when one is given.
    async fn list_applied(&self, scope: Option<&Scope>) -> StoreResult<Vec<AppliedRecord>>;

    /// Record `unit` as applied.
    ///
    /// Fails with [`StoreError::WriteError`](crate::StoreError::WriteError)
    /// if the identifier is already recorded.
    async fn record_applied(&self, unit: &MigrationUnit) -> StoreResult<AppliedRecord>;

    /// Remove the record for `unit`.
    ///
    /// Fails with [`StoreError::WriteError`](crate::StoreError::WriteError)
    /// if no record exists.
    async fn record_reverted(&self, unit: &MigrationUnit) -> StoreResult<()>;
}
