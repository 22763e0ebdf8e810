use anyhow::Result;
use cairn_core::TaskId;
use clap::Args;
use std::path::Path;

use super::open_ledger;
use crate::output::{OutputMode, render_success};

#[derive(Args, Debug)]
pub struct KillArgs {
    /// Task whose attempt was killed.
    pub id: String,

    /// Why the attempt was killed (timeout, context limit).
    #[arg(long, required_unless_present = "clear", conflicts_with = "clear")]
    pub reason: Option<String>,

    /// Clear an earlier kill flag instead.
    #[arg(long)]
    pub clear: bool,
}

pub fn run_kill(args: &KillArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let id = TaskId::from(args.id.as_str());
    let reason = args.reason.as_deref().unwrap_or_default();
    ledger.mark_killed(&id, reason)?;
    if reason.is_empty() {
        render_success(output, &format!("Cleared kill flag on {id}"))
    } else {
        render_success(output, &format!("Flagged {id} for decomposition: {reason}"))
    }
}
