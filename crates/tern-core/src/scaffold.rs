//! Scaffolding for new migration files

use crate::discovery::{Loader, MigrationSource};
use crate::error::{CoreError, CoreResult};
use crate::migration_name::MigrationName;
use crate::scope::Scope;
use crate::unit_id::UnitId;
use chrono::Utc;
use std::path::{Path, PathBuf};

/// File layout for a new migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaffoldLayout {
    /// One `<id>_<name>.sql` file with up/down sections
    #[default]
    Inline,
    /// `<id>_<name>.up.sql` and `<id>_<name>.down.sql`
    Pair,
}

/// Files written for a new migration
#[derive(Debug, Clone)]
pub struct Scaffolded {
    /// Identifier assigned to the migration
    pub id: UnitId,

    /// Files created, up first
    pub files: Vec<PathBuf>,
}

/// Create the file(s) for a new migration in `scope`.
///
/// The identifier is derived from the current time and bumped past the
/// highest identifier already on disk, so identifiers stay strictly
/// increasing even when two migrations are created within one second.
pub fn create_migration(
    source: &MigrationSource,
    scope: &Scope,
    name: &MigrationName,
    layout: ScaffoldLayout,
) -> CoreResult<Scaffolded> {
    let latest = Loader::new(source.clone())
        .discover(None)?
        .map(|unit| unit.map(|u| u.id))
        .try_fold(None, |max: Option<UnitId>, id| {
            id.map(|id| Some(max.map_or(id, |m| m.max(id))))
        })?;
    let id = UnitId::next_after(latest).ok_or_else(|| CoreError::IdentifiersExhausted {
        latest: latest.map(|id| id.to_string()).unwrap_or_default(),
    })?;

    let dir = source.root.join(scope.to_relative_path());
    std::fs::create_dir_all(&dir).map_err(|e| CoreError::IoWithPath {
        path: dir.display().to_string(),
        source: e,
    })?;

    let stem = format!("{id}_{name}");
    let contents = match layout {
        ScaffoldLayout::Inline => {
            vec![(dir.join(format!("{stem}.sql")), inline_template(name, id))]
        }
        ScaffoldLayout::Pair => vec![
            (dir.join(format!("{stem}.up.sql")), script_template(name, id, "up")),
            (dir.join(format!("{stem}.down.sql")), script_template(name, id, "down")),
        ],
    };
    let files = write_all_new(&contents)?;

    log::info!("Created migration {} in scope '{}'", stem, scope);
    Ok(Scaffolded { id, files })
}

/// Write every file or none: on failure, files already written are removed.
fn write_all_new(contents: &[(PathBuf, String)]) -> CoreResult<Vec<PathBuf>> {
    let mut written: Vec<PathBuf> = Vec::with_capacity(contents.len());
    for (path, content) in contents {
        if let Err(e) = write_new(path, content) {
            for done in &written {
                if let Err(cleanup) = std::fs::remove_file(done) {
                    log::warn!(
                        "Could not remove partial migration file {}: {cleanup}",
                        done.display()
                    );
                }
            }
            return Err(e);
        }
        written.push(path.clone());
    }
    Ok(written)
}

fn write_new(path: &Path, content: &str) -> CoreResult<()> {
    if path.exists() {
        return Err(CoreError::MigrationExists {
            path: path.display().to_string(),
        });
    }
    std::fs::write(path, content).map_err(|e| CoreError::IoWithPath {
        path: path.display().to_string(),
        source: e,
    })
}

fn inline_template(name: &MigrationName, id: UnitId) -> String {
    format!(
        "-- Migration: {name}\n\
         -- ID: {id}\n\
         -- Created: {created}\n\n\
         -- up\n\n\n\
         -- down\n\n",
        created = Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}

fn script_template(name: &MigrationName, id: UnitId, direction: &str) -> String {
    format!(
        "-- Migration: {name} ({direction})\n\
         -- ID: {id}\n\
         -- Created: {created}\n\n",
        created = Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}

#[cfg(test)]
#[path = "scaffold_test.rs"]
mod tests;
