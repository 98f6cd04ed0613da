//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tern_core::{Config, Loader, MigrationSource, Scope};
use tern_db::Database;
use tern_engine::{BatchResult, Direction, Engine, Limit};
use tern_store::TableStore;

use crate::cli::GlobalArgs;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; main prints nothing for it.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Exit code used when the user interrupts a batch.
pub(crate) const INTERRUPTED: i32 = 130;

/// Loaded project: its root directory and configuration.
#[derive(Debug)]
pub(crate) struct Project {
    pub root: PathBuf,
    pub config: Config,
}

impl Project {
    pub fn source(&self) -> MigrationSource {
        MigrationSource::from_config(&self.config, &self.root)
    }
}

/// Load the project named by the global CLI arguments.
///
/// An explicit `--config` must exist; otherwise a missing `tern.yml` falls
/// back to defaults.
pub(crate) fn load_project(global: &GlobalArgs) -> Result<Project> {
    let root = global.project_dir.clone();
    let config = match &global.config {
        Some(path) => Config::load(path).context("Failed to load configuration file")?,
        None => {
            Config::load_from_dir_or_default(&root).context("Failed to load project configuration")?
        }
    };
    Ok(Project { root, config })
}

/// Open the database for the selected target, honouring `--database`.
///
/// Relative file paths resolve against the project directory.
pub(crate) fn create_database_connection(
    project: &Project,
    global: &GlobalArgs,
) -> Result<Arc<dyn Database>> {
    let mut db_config = project
        .config
        .database_for(global.target.as_deref())
        .context("Failed to get database configuration")?;
    if let Some(path) = &global.database {
        db_config.path = path.clone();
    }
    db_config.path = resolve_db_path(&project.root, &db_config.path);
    if db_config.path == ":memory:" {
        log::warn!("Using an in-memory database; changes are discarded when tern exits");
    }

    tern_db::open_database(&db_config).context("Failed to connect to database")
}

fn resolve_db_path(root: &Path, path: &str) -> String {
    if path == ":memory:" || Path::new(path).is_absolute() {
        path.to_string()
    } else {
        root.join(path).display().to_string()
    }
}

/// Build an engine over the project's migrations, store and database.
pub(crate) fn build_engine(global: &GlobalArgs) -> Result<Engine> {
    let project = load_project(global)?;
    let db = create_database_connection(&project, global)?;
    let store = TableStore::from_config(Arc::clone(&db), &project.config)
        .context("Failed to set up the migration store")?;
    log::debug!(
        "Migrations in {}, bookkeeping in {}",
        project.source().root.display(),
        store.table()
    );
    Ok(Engine::new(Loader::new(project.source()), Arc::new(store), db))
}

/// Map `--count` / `--to` / `--all` to an engine limit. `None` leaves the
/// engine default in place.
pub(crate) fn limit_from(
    count: Option<usize>,
    to: Option<tern_core::UnitId>,
    all: bool,
) -> Option<Limit> {
    if all {
        Some(Limit::All)
    } else if let Some(id) = to {
        Some(Limit::Through(id))
    } else {
        count.map(Limit::Count)
    }
}

/// Run one batch, abandoning it on Ctrl-C, and report the outcome.
///
/// Dropping the in-flight run future drops its open transaction, which
/// rolls the current migration back.
pub(crate) async fn run_batch(
    global: &GlobalArgs,
    direction: Direction,
    limit: Option<Limit>,
    scope: Option<&Scope>,
) -> Result<()> {
    let mut engine = build_engine(global)?;

    let result = tokio::select! {
        result = engine.run(direction, limit, scope) => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted: the migration in progress was rolled back");
            return Err(ExitCode(INTERRUPTED).into());
        }
    };

    report_batch(&result);
    match result.exit_code() {
        0 => Ok(()),
        code => Err(ExitCode(code).into()),
    }
}

fn report_batch(result: &BatchResult) {
    let verb = result.direction.verb();
    for id in &result.completed {
        println!("  \u{2713} {verb} {id}");
    }
    if let Some(err) = &result.error {
        match err.failed_unit() {
            Some(id) => eprintln!("  \u{2717} {id}: {err}"),
            None => eprintln!("  \u{2717} {err}"),
        }
    }

    let count = result.completed.len();
    match (count, result.direction, result.is_success()) {
        (0, Direction::Up, true) => println!("No pending migrations"),
        (0, Direction::Down, true) => println!("No migrations to revert"),
        (_, _, true) => println!(
            "{} {} migration{}",
            capitalize(verb),
            count,
            if count == 1 { "" } else { "s" }
        ),
        (_, _, false) => println!(
            "{} {} migration{} before the failure",
            capitalize(verb),
            count,
            if count == 1 { "" } else { "s" }
        ),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Calculate column widths for a table given headers and row data.
pub(crate) fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }
    widths
}

/// Print a left-aligned table with a dashed separator under the header.
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);
    let render = |cells: Vec<String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", render(headers.iter().map(|h| h.to_string()).collect()));
    println!("{}", render(widths.iter().map(|&w| "-".repeat(w)).collect()));
    for row in rows {
        println!("{}", render(row.clone()));
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
