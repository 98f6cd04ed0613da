//! New command implementation

use anyhow::{Context, Result};
use tern_core::{create_migration, MigrationName, ScaffoldLayout, Scope};

use crate::cli::{GlobalArgs, NewArgs};
use crate::commands::common::load_project;

/// Execute the new command
pub async fn execute(args: &NewArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let name = MigrationName::slugify(&args.name)?;
    let scope = args.scope.clone().unwrap_or_else(Scope::root);
    let layout = if args.pair {
        ScaffoldLayout::Pair
    } else {
        ScaffoldLayout::Inline
    };

    let created = create_migration(&project.source(), &scope, &name, layout)
        .with_context(|| format!("Failed to create migration '{name}'"))?;

    for file in &created.files {
        let shown = file.strip_prefix(&project.root).unwrap_or(file);
        println!("Created {}", shown.display());
    }
    Ok(())
}

#[cfg(test)]
#[path = "new_test.rs"]
mod tests;
