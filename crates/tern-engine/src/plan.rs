//! Batch planning.
//!
//! Pure functions from discovered units and applied records to the ordered
//! list of units a batch will run. Nothing here touches the database.

use crate::batch::Limit;
use crate::error::{EngineError, EngineResult};
use std::collections::{HashMap, HashSet};
use tern_core::{AppliedRecord, MigrationUnit, Scope, UnitId};

/// Units selected for a forward batch.
#[derive(Debug, Default)]
pub(crate) struct ForwardPlan {
    /// Units to apply, ascending by id
    pub pending: Vec<MigrationUnit>,

    /// Unapplied units below the applied high-water mark; never applied
    pub out_of_order: Vec<MigrationUnit>,
}

/// Fail if two discovered units share an identifier, in any scope.
///
/// `units` must be sorted by id, as discovery yields them.
pub(crate) fn check_unique_ids(units: &[MigrationUnit]) -> EngineResult<()> {
    for pair in units.windows(2) {
        if pair[0].id == pair[1].id {
            return Err(EngineError::consistency(format!(
                "identifier {} is used by both {} and {}",
                pair[0].id,
                pair[0].label(),
                pair[1].label()
            )));
        }
    }
    Ok(())
}

/// Keep the units inside `scope`'s subtree.
pub(crate) fn in_scope(units: Vec<MigrationUnit>, scope: Option<&Scope>) -> Vec<MigrationUnit> {
    match scope {
        Some(scope) => units
            .into_iter()
            .filter(|unit| scope.contains(&unit.scope))
            .collect(),
        None => units,
    }
}

/// Plan a forward batch.
///
/// `discovered` and `applied` must already be restricted to the batch's
/// scope. A unit is pending when its id is above every applied id; an
/// unapplied unit below that mark is out of order, whatever its scope.
pub(crate) fn plan_forward(
    discovered: Vec<MigrationUnit>,
    applied: &[AppliedRecord],
    limit: Limit,
) -> ForwardPlan {
    let applied_ids: HashSet<UnitId> = applied.iter().map(|r| r.id).collect();
    let high_water = applied.iter().map(|r| r.id).max();

    let mut plan = ForwardPlan::default();
    for unit in discovered {
        if applied_ids.contains(&unit.id) {
            continue;
        }
        match high_water {
            Some(mark) if unit.id < mark => plan.out_of_order.push(unit),
            _ => plan.pending.push(unit),
        }
    }

    plan.pending = match limit {
        Limit::All => plan.pending,
        Limit::Count(n) => plan.pending.into_iter().take(n).collect(),
        Limit::Through(target) => plan
            .pending
            .into_iter()
            .take_while(|unit| unit.id <= target)
            .collect(),
    };
    plan
}

/// Plan a backward batch.
///
/// Walks `applied` from the highest id down, resolving each record to its
/// discovered unit. A record without a matching unit, or one whose unit moved
/// to another scope, is a consistency error. Every selected unit must be
/// reversible.
pub(crate) fn plan_backward(
    discovered: Vec<MigrationUnit>,
    applied: &[AppliedRecord],
    limit: Limit,
) -> EngineResult<Vec<MigrationUnit>> {
    let mut by_id: HashMap<UnitId, MigrationUnit> =
        discovered.into_iter().map(|unit| (unit.id, unit)).collect();

    let mut records: Vec<&AppliedRecord> = applied.iter().collect();
    records.sort_by(|a, b| b.id.cmp(&a.id));

    let selected: Vec<&AppliedRecord> = match limit {
        Limit::All => records,
        Limit::Count(n) => records.into_iter().take(n).collect(),
        Limit::Through(target) => records
            .into_iter()
            .take_while(|record| record.id >= target)
            .collect(),
    };

    let mut plan = Vec::with_capacity(selected.len());
    for record in selected {
        let unit = by_id.remove(&record.id).ok_or_else(|| {
            EngineError::consistency(format!(
                "applied migration {}_{} (scope '{}') was not found in the migrations directory",
                record.id, record.name, record.scope
            ))
        })?;
        if unit.scope != record.scope {
            return Err(EngineError::consistency(format!(
                "migration {} was applied in scope '{}' but is now in scope '{}'",
                unit.id, record.scope, unit.scope
            )));
        }
        plan.push(unit);
    }

    if let Some(unit) = plan.iter().find(|unit| !unit.is_reversible()) {
        return Err(EngineError::Irreversible {
            id: unit.id,
            unit: unit.label(),
        });
    }
    Ok(plan)
}

#[cfg(test)]
#[path = "plan_test.rs"]
mod tests;
