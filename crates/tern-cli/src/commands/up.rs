//! Up command implementation

use anyhow::Result;
use tern_engine::Direction;

use crate::cli::{GlobalArgs, UpArgs};
use crate::commands::common::{limit_from, run_batch};

/// Execute the up command
pub async fn execute(args: &UpArgs, global: &GlobalArgs) -> Result<()> {
    let limit = limit_from(args.count, args.to, false);
    run_batch(global, Direction::Up, limit, args.scope.as_ref()).await
}
