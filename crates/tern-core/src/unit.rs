//! Migration units and applied records

use crate::migration_name::MigrationName;
use crate::scope::Scope;
use crate::unit_id::UnitId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One direction of a migration.
///
/// Both variants resolve to SQL text; they differ only in where the text came
/// from, which matters for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Procedure {
    /// A section of a single migration file (or SQL supplied in code)
    Inline { sql: String },
    /// A companion `*.up.sql` / `*.down.sql` script
    Script { path: PathBuf, sql: String },
}

impl Procedure {
    /// Build an inline procedure from SQL text.
    pub fn inline(sql: impl Into<String>) -> Self {
        Procedure::Inline { sql: sql.into() }
    }

    /// SQL to hand to the driver.
    pub fn sql(&self) -> &str {
        match self {
            Procedure::Inline { sql } | Procedure::Script { sql, .. } => sql,
        }
    }

    /// Script file this procedure was read from, if any.
    pub fn script_path(&self) -> Option<&Path> {
        match self {
            Procedure::Inline { .. } => None,
            Procedure::Script { path, .. } => Some(path),
        }
    }

    /// True when the procedure contains nothing but whitespace and `--`
    /// comments.
    pub fn is_empty(&self) -> bool {
        is_blank_sql(self.sql())
    }
}

/// True when `sql` holds no statements: only blank lines and `--` comments.
pub fn is_blank_sql(sql: &str) -> bool {
    sql.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with("--")
    })
}

/// A named, ordered, optionally revertible schema change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnit {
    /// Global ordering token
    pub id: UnitId,

    /// Slug, unique within `scope`
    pub name: MigrationName,

    /// Namespace the unit was discovered in
    pub scope: Scope,

    /// Forward change
    pub up: Procedure,

    /// Reverse change; `None` marks the unit irreversible
    pub down: Option<Procedure>,

    /// Files the unit was loaded from
    pub artifacts: Vec<PathBuf>,
}

impl MigrationUnit {
    /// Create a root-scope unit with inline forward SQL and no reverse.
    pub fn new(id: impl Into<UnitId>, name: MigrationName, up_sql: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name,
            scope: Scope::root(),
            up: Procedure::inline(up_sql),
            down: None,
            artifacts: Vec::new(),
        }
    }

    /// Attach inline reverse SQL.
    pub fn with_down(mut self, down_sql: impl Into<String>) -> Self {
        self.down = Some(Procedure::inline(down_sql));
        self
    }

    /// Place the unit in a scope.
    pub fn in_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// True when the unit can be reverted.
    pub fn is_reversible(&self) -> bool {
        self.down.is_some()
    }

    /// Qualified label used in logs and errors (`scope/id_name`).
    pub fn label(&self) -> String {
        if self.scope.is_root() {
            format!("{}_{}", self.id, self.name)
        } else {
            format!("{}/{}_{}", self.scope, self.id, self.name)
        }
    }
}

impl fmt::Display for MigrationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Persisted proof that a unit's forward change completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRecord {
    /// Identifier of the applied unit
    pub id: UnitId,

    /// Name at the time it was applied
    pub name: String,

    /// Scope at the time it was applied
    pub scope: Scope,

    /// When the record was written
    pub applied_at: DateTime<Utc>,
}

impl AppliedRecord {
    /// Build the record for `unit` applied at `applied_at`.
    pub fn for_unit(unit: &MigrationUnit, applied_at: DateTime<Utc>) -> Self {
        Self {
            id: unit.id,
            name: unit.name.to_string(),
            scope: unit.scope.clone(),
            applied_at,
        }
    }
}

#[cfg(test)]
#[path = "unit_test.rs"]
mod tests;
