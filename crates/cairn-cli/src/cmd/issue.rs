use anyhow::Result;
use cairn_core::{Issue, IssueDraft, IssueId, Priority};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use super::open_ledger;
use crate::output::{OutputMode, pretty_section, render};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// What is wrong and how it was observed.
    #[arg(long = "desc", value_name = "TEXT")]
    pub description: String,

    /// high, medium, or low.
    #[arg(long, default_value = "medium")]
    pub priority: Priority,

    /// Spec file (defaults to the active spec).
    #[arg(long)]
    pub spec: Option<String>,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Issue to mark fixed (defaults to every open issue).
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
struct Recorded {
    id: IssueId,
}

#[derive(Debug, Serialize)]
struct Resolved {
    resolved: usize,
}

pub fn run_add(args: &AddArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let id = ledger.add_issue(IssueDraft {
        description: args.description.clone(),
        priority: args.priority,
        spec: args.spec.clone(),
    })?;
    render(output, &Recorded { id }, |r, w| writeln!(w, "✓ Recorded issue {}", r.id))
}

pub fn run_resolve(args: &ResolveArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let id = args.id.as_deref().map(IssueId::from);
    let resolved = ledger.resolve_issues(id.as_ref())?;
    render(output, &Resolved { resolved }, |r, w| match r.resolved {
        0 => writeln!(w, "(no open issues)"),
        n => writeln!(w, "✓ Resolved {n} issue(s)"),
    })
}

pub fn run_list(output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let state = ledger.state()?;
    let issues: Vec<&Issue> = state.issues();
    render(output, &issues, |issues, w| {
        if issues.is_empty() {
            return writeln!(w, "(no issues)");
        }
        pretty_section(w, "Issues")?;
        for issue in issues {
            let status = if issue.is_open() { "open" } else { "fixed" };
            writeln!(
                w,
                "{:<12} {:<6} {:<6} {}",
                issue.id, status, issue.priority, issue.description
            )?;
        }
        Ok(())
    })
}
