//! `cairn add` and `cairn check`: the same proposal, recorded or dry-run.

use anyhow::{Context as _, Result};
use cairn_core::{IssueId, LedgerError, Priority, TaskDraft, TaskId, Violation};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use super::open_ledger;
use crate::output::{OutputMode, render};

#[derive(Args, Debug, Clone, Default)]
pub struct TaskArgs {
    /// Short imperative title.
    #[arg(long)]
    pub name: String,

    /// Where to look and what to change (file paths, line numbers).
    #[arg(long, default_value = "")]
    pub notes: String,

    /// How a verifier confirms the work (a command and its expected result).
    #[arg(long, default_value = "")]
    pub accept: String,

    /// Task that must be accepted first (repeatable).
    #[arg(long = "dep", value_name = "ID")]
    pub deps: Vec<String>,

    /// high, medium, or low.
    #[arg(long)]
    pub priority: Option<Priority>,

    /// Spec file (defaults to the active spec).
    #[arg(long)]
    pub spec: Option<String>,

    /// Issue this task fixes.
    #[arg(long = "from-issue", value_name = "ISSUE")]
    pub created_from: Option<String>,

    /// Research findings as a JSON value.
    #[arg(long, value_name = "JSON")]
    pub research: Option<String>,
}

impl TaskArgs {
    fn to_draft(&self) -> Result<TaskDraft> {
        let research = self
            .research
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .context("--research must be valid JSON")?;
        Ok(TaskDraft {
            name: self.name.clone(),
            notes: self.notes.clone(),
            accept: self.accept.clone(),
            deps: self.deps.iter().map(|d| TaskId::from(d.as_str())).collect(),
            priority: self.priority,
            spec: self.spec.clone(),
            created_from: self.created_from.as_deref().map(IssueId::from),
            research,
        })
    }
}

#[derive(Debug, Serialize)]
struct Added {
    id: TaskId,
    name: String,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    ok: bool,
    violations: Vec<Violation>,
}

pub fn run_add(args: &TaskArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let id = ledger.add_task(args.to_draft()?)?;
    let added = Added {
        id,
        name: args.name.clone(),
    };
    render(output, &added, |a, w| writeln!(w, "✓ Added {} {}", a.id, a.name))
}

/// Dry-run validation. Fails, with the full violation list, when anything
/// would be rejected.
pub fn run_check(args: &TaskArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let violations = ledger.check_task(&args.to_draft()?)?;
    if violations.is_empty() {
        let report = CheckReport {
            ok: true,
            violations,
        };
        return render(output, &report, |_, w| writeln!(w, "✓ Task would be accepted"));
    }

    Err(LedgerError::ValidationFailed(violations).into())
}
