use anyhow::Result;
use cairn_core::{Priority, TaskId};
use clap::Args;
use std::path::Path;

use super::open_ledger;
use crate::output::{OutputMode, render_success};

#[derive(Args, Debug)]
pub struct PrioritizeArgs {
    /// Task to re-rank.
    pub id: String,
    /// high, medium, or low.
    pub priority: Priority,
}

pub fn run_prioritize(args: &PrioritizeArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let id = TaskId::from(args.id.as_str());
    ledger.prioritize(&id, args.priority)?;
    render_success(output, &format!("{id} is now {}", args.priority))
}
