//! `cairn status` and `cairn stage`.

use anyhow::Result;
use cairn_core::{LedgerState, Stage, Task, Tombstone, derive_stage, graph};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use super::{open_ledger, write_task_line};
use crate::output::{OutputMode, pretty_kv, pretty_section, render};

#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Also list accepted and rejected tombstones.
    #[arg(long)]
    pub history: bool,
}

#[derive(Debug, Serialize)]
struct Counts {
    pending: usize,
    ready: usize,
    done: usize,
    accepted: usize,
    open_issues: usize,
}

#[derive(Debug, Serialize)]
struct Status<'a> {
    stage: Stage,
    spec: Option<&'a str>,
    counts: Counts,
    next: Option<&'a Task>,
    killed: Vec<&'a Task>,
    escalations: Vec<&'a Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accepted: Option<&'a [Tombstone]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejected: Option<&'a [Tombstone]>,
}

fn summarize(state: &LedgerState, max_rejections: u32, history: bool) -> Status<'_> {
    Status {
        stage: derive_stage(state),
        spec: state.spec.as_deref(),
        counts: Counts {
            pending: state.pending().len(),
            ready: graph::ready(state).len(),
            done: state.done().len(),
            accepted: state.tombstones.accepted.len(),
            open_issues: state.open_issues().len(),
        },
        next: graph::next_task(state),
        killed: state.killed(),
        escalations: state.escalations(max_rejections),
        accepted: history.then_some(state.tombstones.accepted.as_slice()),
        rejected: history.then_some(state.tombstones.rejected.as_slice()),
    }
}

fn write_tombstones(w: &mut dyn Write, heading: &str, stones: &[Tombstone]) -> std::io::Result<()> {
    writeln!(w)?;
    pretty_section(w, heading)?;
    for t in stones {
        match &t.reason {
            Some(reason) => writeln!(w, "{:<12} {}  ({reason})", t.id, t.name)?,
            None => writeln!(w, "{:<12} {}", t.id, t.name)?,
        }
    }
    Ok(())
}

pub fn run_status(args: &StatusArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let state = ledger.state()?;
    let max_rejections = ledger.effective_config(&state).max_rejections;
    let status = summarize(&state, max_rejections, args.history);

    render(output, &status, |s, w| {
        pretty_section(w, "cairn status")?;
        pretty_kv(w, "Stage", s.stage.as_str())?;
        pretty_kv(w, "Spec", s.spec.unwrap_or("(none)"))?;
        pretty_kv(
            w,
            "Tasks",
            format!(
                "{} pending ({} ready), {} done, {} accepted",
                s.counts.pending, s.counts.ready, s.counts.done, s.counts.accepted
            ),
        )?;
        pretty_kv(w, "Issues", format!("{} open", s.counts.open_issues))?;
        if let Some(next) = s.next {
            pretty_kv(w, "Next", format!("{} {}", next.id, next.name))?;
        }
        if !s.killed.is_empty() {
            writeln!(w)?;
            pretty_section(w, "Needs decomposition")?;
            for task in &s.killed {
                write_task_line(w, task)?;
            }
        }
        if !s.escalations.is_empty() {
            writeln!(w)?;
            pretty_section(w, "Escalations")?;
            for task in &s.escalations {
                write_task_line(w, task)?;
            }
        }
        if let Some(accepted) = s.accepted {
            write_tombstones(w, "Accepted", accepted)?;
        }
        if let Some(rejected) = s.rejected {
            write_tombstones(w, "Rejections", rejected)?;
        }
        Ok(())
    })
}

#[derive(Debug, Serialize)]
struct StageReport {
    stage: Stage,
}

pub fn run_stage(output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let report = StageReport {
        stage: ledger.stage()?,
    };
    render(output, &report, |r, w| writeln!(w, "{}", r.stage))
}
