//! Down command implementation

use anyhow::Result;
use tern_engine::Direction;

use crate::cli::{DownArgs, GlobalArgs};
use crate::commands::common::{limit_from, run_batch};

/// Execute the down command
pub async fn execute(args: &DownArgs, global: &GlobalArgs) -> Result<()> {
    let limit = limit_from(args.count, args.to, args.all);
    run_batch(global, Direction::Down, limit, args.scope.as_ref()).await
}
