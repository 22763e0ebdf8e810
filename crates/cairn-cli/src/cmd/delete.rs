use anyhow::Result;
use cairn_core::TaskId;
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use super::open_ledger;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Task to remove.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct Deleted {
    id: TaskId,
    /// Tasks whose dependency on the deleted task was dropped.
    rewired: Vec<TaskId>,
}

pub fn run_delete(args: &DeleteArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let id = TaskId::from(args.id.as_str());
    let rewired = ledger.delete_task(&id)?;
    render(output, &Deleted { id, rewired }, |d, w| {
        writeln!(w, "✓ Deleted {}", d.id)?;
        if !d.rewired.is_empty() {
            let ids: Vec<&str> = d.rewired.iter().map(TaskId::as_str).collect();
            writeln!(w, "  dropped from deps of: {}", ids.join(", "))?;
        }
        Ok(())
    })
}
