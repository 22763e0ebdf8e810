use anyhow::{Context as _, Result};
use cairn_core::{TaskDraft, TaskId};
use clap::Args;
use serde::Serialize;
use std::io::{Read as _, Write};
use std::path::{Path, PathBuf};

use super::open_ledger;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct DecomposeArgs {
    /// Task to split.
    pub id: String,

    /// JSON array of task drafts (`name`, `notes`, `accept`, optional
    /// `deps`, `priority`, `research`), or `-` for stdin.
    #[arg(long, value_name = "FILE")]
    pub from: PathBuf,
}

#[derive(Debug, Serialize)]
struct Decomposed {
    parent: TaskId,
    children: Vec<TaskId>,
}

fn read_drafts(from: &Path) -> Result<Vec<TaskDraft>> {
    let raw = if from == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read drafts from stdin")?;
        buf
    } else {
        std::fs::read_to_string(from)
            .with_context(|| format!("Failed to read {}", from.display()))?
    };
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of task drafts", from.display()))
}

pub fn run_decompose(args: &DecomposeArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let drafts = read_drafts(&args.from)?;
    let ledger = open_ledger(project_root)?;
    let parent = TaskId::from(args.id.as_str());
    let children = ledger.decompose(&parent, drafts)?;

    render(output, &Decomposed { parent, children }, |d, w| {
        writeln!(w, "✓ Split {} into {} task(s)", d.parent, d.children.len())?;
        for child in &d.children {
            writeln!(w, "  {child}")?;
        }
        Ok(())
    })
}
