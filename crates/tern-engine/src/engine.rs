//! The migration execution engine.

use crate::batch::{BatchResult, Direction, Limit};
use crate::error::{EngineError, EngineResult};
use crate::plan::{check_unique_ids, in_scope, plan_backward, plan_forward};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tern_core::{Discovery, DiscoveryError, Loader, MigrationUnit, Scope, UnitId};
use tern_db::Database;
use tern_store::MigrationStore;

/// Lifecycle of an [`Engine`].
///
/// A successful batch ends in `Settled` and the engine may run again.
/// `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Planning,
    Applying,
    Settled,
    Failed,
}

/// Where one unit stands relative to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UnitStatus {
    /// Recorded as applied
    Applied { applied_at: DateTime<Utc> },
    /// Will be applied by the next forward batch
    Pending,
    /// Unapplied, but older than the newest applied unit; never applied automatically
    OutOfOrder,
    /// Recorded as applied but no longer discovered
    Missing,
}

/// One row of [`Engine::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub id: UnitId,
    pub name: String,
    pub scope: Scope,
    pub reversible: bool,
    pub status: UnitStatus,
}

/// Applies and reverts migration units in order.
///
/// Units run strictly one after another, each in its own transaction. The
/// store is updated after each unit commits, never batched at the end.
pub struct Engine {
    loader: Loader,
    store: Arc<dyn MigrationStore>,
    db: Arc<dyn Database>,
    state: EngineState,
}

impl Engine {
    pub fn new(loader: Loader, store: Arc<dyn MigrationStore>, db: Arc<dyn Database>) -> Self {
        Self {
            loader,
            store,
            db,
            state: EngineState::Idle,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Run one batch.
    ///
    /// `limit` defaults to [`Limit::default_for`] the direction. With a
    /// `scope`, only units in that scope's subtree are considered. The first
    /// failure stops the batch; units completed before it stay completed.
    pub async fn run(
        &mut self,
        direction: Direction,
        limit: Option<Limit>,
        scope: Option<&Scope>,
    ) -> BatchResult {
        if self.state == EngineState::Failed {
            return BatchResult::failed(direction, Vec::new(), EngineError::Halted);
        }

        self.state = EngineState::Planning;
        let limit = limit.unwrap_or_else(|| Limit::default_for(direction));
        let plan = match self.plan(direction, limit, scope).await {
            Ok(plan) => plan,
            Err(e) => {
                log::debug!("Planning {direction} batch failed: {e}");
                self.state = EngineState::Failed;
                return BatchResult::failed(direction, Vec::new(), e);
            }
        };

        log::info!(
            "Running {} batch over {} migration(s) on {}",
            direction,
            plan.len(),
            self.db.db_type()
        );
        self.state = EngineState::Applying;

        let mut completed = Vec::with_capacity(plan.len());
        for unit in &plan {
            if let Err(e) = self.step(direction, unit).await {
                log::debug!("Stopping {direction} batch at {}", unit.label());
                self.state = EngineState::Failed;
                return BatchResult::failed(direction, completed, e);
            }
            log::info!("Migration {} {}", unit.label(), direction.verb());
            completed.push(unit.id);
        }

        self.state = EngineState::Settled;
        log::info!(
            "Batch {direction} finished: {} migration(s) {}",
            completed.len(),
            direction.verb()
        );
        BatchResult::settled(direction, completed)
    }

    /// Discovered units paired with their applied state, ascending by id.
    ///
    /// Records whose unit is no longer discovered are listed as
    /// [`UnitStatus::Missing`].
    pub async fn status(&self, scope: Option<&Scope>) -> EngineResult<Vec<StatusEntry>> {
        let discovered = in_scope(self.discover()?, scope);
        let applied = self.store.list_applied(scope).await?;
        let forward = plan_forward(discovered.clone(), &applied, Limit::All);

        let mut applied_at: HashMap<UnitId, DateTime<Utc>> =
            applied.iter().map(|r| (r.id, r.applied_at)).collect();
        let out_of_order: Vec<UnitId> = forward.out_of_order.iter().map(|u| u.id).collect();

        let mut entries: Vec<StatusEntry> = discovered
            .into_iter()
            .map(|unit| {
                let status = match applied_at.remove(&unit.id) {
                    Some(at) => UnitStatus::Applied { applied_at: at },
                    None if out_of_order.contains(&unit.id) => UnitStatus::OutOfOrder,
                    None => UnitStatus::Pending,
                };
                StatusEntry {
                    id: unit.id,
                    reversible: unit.is_reversible(),
                    name: unit.name.to_string(),
                    scope: unit.scope,
                    status,
                }
            })
            .collect();

        entries.extend(
            applied
                .into_iter()
                .filter(|r| applied_at.contains_key(&r.id))
                .map(|r| StatusEntry {
                    id: r.id,
                    name: r.name,
                    scope: r.scope,
                    reversible: false,
                    status: UnitStatus::Missing,
                }),
        );
        entries.sort_by_key(|entry| entry.id);
        Ok(entries)
    }

    /// Every discovered unit, after the identifier collision check.
    fn discover(&self) -> EngineResult<Vec<MigrationUnit>> {
        let units = self
            .loader
            .discover(None)
            .and_then(Discovery::collect_units)
            .map_err(|e| match e {
                DiscoveryError::DuplicateUnit { .. } => EngineError::consistency(e.to_string()),
                other => EngineError::Discovery(other),
            })?;
        check_unique_ids(&units)?;
        Ok(units)
    }

    async fn plan(
        &self,
        direction: Direction,
        limit: Limit,
        scope: Option<&Scope>,
    ) -> EngineResult<Vec<MigrationUnit>> {
        let discovered = self.discover()?;
        let applied = self.store.list_applied(scope).await?;

        let plan = match direction {
            Direction::Up => {
                let plan = plan_forward(in_scope(discovered, scope), &applied, limit);
                for unit in &plan.out_of_order {
                    log::warn!(
                        "Migration {} is older than the latest applied migration and will not be applied",
                        unit.label()
                    );
                }
                plan.pending
            }
            Direction::Down => plan_backward(discovered, &applied, limit)?,
        };

        for unit in &plan {
            log::debug!("Planned {direction} {}", unit.label());
        }
        Ok(plan)
    }

    /// Run one unit in its own transaction, then update the store.
    async fn step(&self, direction: Direction, unit: &MigrationUnit) -> EngineResult<()> {
        let procedure = match direction {
            Direction::Up => &unit.up,
            Direction::Down => unit.down.as_ref().ok_or_else(|| EngineError::Irreversible {
                id: unit.id,
                unit: unit.label(),
            })?,
        };
        let transaction_err = |source| EngineError::Transaction {
            id: unit.id,
            unit: unit.label(),
            source,
        };

        let mut tx = self.db.begin().await.map_err(transaction_err)?;
        if procedure.is_empty() {
            log::debug!("{} has an empty {direction} procedure", unit.label());
        } else if let Err(source) = tx.execute(procedure.sql()).await {
            if let Err(e) = tx.rollback().await {
                log::warn!("Rollback of {} failed: {e}", unit.label());
            }
            return Err(EngineError::Procedure {
                id: unit.id,
                unit: unit.label(),
                source,
            });
        }
        tx.commit().await.map_err(transaction_err)?;

        let recorded = match direction {
            Direction::Up => self.store.record_applied(unit).await.map(|_| ()),
            Direction::Down => self.store.record_reverted(unit).await,
        };
        recorded.map_err(|source| {
            log::warn!(
                "{} was {} in the database but the store write failed",
                unit.label(),
                direction.verb()
            );
            EngineError::StoreInconsistency {
                id: unit.id,
                unit: unit.label(),
                source,
            }
        })
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
