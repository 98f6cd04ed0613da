//! Status command implementation

use anyhow::{Context, Result};
use tern_engine::{StatusEntry, UnitStatus};

use crate::cli::{GlobalArgs, OutputFormat, StatusArgs};
use crate::commands::common::{build_engine, print_table};

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let engine = build_engine(global)?;
    let entries = engine
        .status(args.scope.as_ref())
        .await
        .context("Failed to read migration status")?;

    match args.output {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&entries).context("Failed to serialize status")?;
            println!("{json}");
        }
        OutputFormat::Table => print_status_table(&entries),
    }
    Ok(())
}

fn print_status_table(entries: &[StatusEntry]) {
    if entries.is_empty() {
        println!("No migrations found");
        return;
    }

    let rows: Vec<Vec<String>> = entries.iter().map(status_row).collect();
    print_table(&["ID", "SCOPE", "NAME", "STATUS", "APPLIED AT"], &rows);

    let pending = entries
        .iter()
        .filter(|e| e.status == UnitStatus::Pending)
        .count();
    let out_of_order = entries
        .iter()
        .filter(|e| e.status == UnitStatus::OutOfOrder)
        .count();
    println!();
    println!("{} total, {} pending", entries.len(), pending);
    if out_of_order > 0 {
        println!(
            "{out_of_order} migration(s) are older than the latest applied one in their scope and will not be applied"
        );
    }
}

fn status_row(entry: &StatusEntry) -> Vec<String> {
    let (status, applied_at) = match &entry.status {
        UnitStatus::Applied { applied_at } => (
            "applied",
            applied_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ),
        UnitStatus::Pending => ("pending", String::new()),
        UnitStatus::OutOfOrder => ("out of order", String::new()),
        UnitStatus::Missing => ("missing", String::new()),
    };
    let scope = if entry.scope.is_root() {
        "-".to_string()
    } else {
        entry.scope.to_string()
    };
    vec![
        entry.id.to_string(),
        scope,
        entry.name.clone(),
        status.to_string(),
        applied_at,
    ]
}

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;
