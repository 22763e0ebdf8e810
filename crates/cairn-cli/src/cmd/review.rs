//! `cairn accept` and `cairn reject`: the verifier's verdict on done work.

use anyhow::Result;
use cairn_core::TaskId;
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use super::open_ledger;
use crate::output::{OutputMode, render, render_success};

#[derive(Args, Debug)]
pub struct AcceptArgs {
    /// Task to accept (defaults to the oldest done task).
    pub id: Option<String>,
}

#[derive(Args, Debug)]
pub struct RejectArgs {
    /// Task to reject (defaults to the oldest done task).
    pub id: Option<String>,

    /// What failed, for whoever picks the task up again.
    #[arg(long)]
    pub reason: String,
}

#[derive(Debug, Serialize)]
struct Rejected {
    id: TaskId,
    reject_count: u32,
    escalated: bool,
}

pub fn run_accept(args: &AcceptArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let id = args.id.as_deref().map(TaskId::from);
    let accepted = ledger.accept(id.as_ref())?;
    render_success(output, &format!("Accepted {accepted}"))
}

pub fn run_reject(args: &RejectArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let id = args.id.as_deref().map(TaskId::from);
    let id = ledger.reject(id.as_ref(), &args.reason)?;

    let state = ledger.state()?;
    let threshold = ledger.effective_config(&state).max_rejections;
    let reject_count = state.task(&id).map_or(0, |t| t.reject_count);
    let report = Rejected {
        escalated: threshold > 0 && reject_count >= threshold,
        id,
        reject_count,
    };
    render(output, &report, |r, w| {
        writeln!(w, "✓ Rejected {} (rejection {})", r.id, r.reject_count)?;
        if r.escalated {
            writeln!(w, "  escalation: rejected {} times, needs a human", r.reject_count)?;
        }
        Ok(())
    })
}
