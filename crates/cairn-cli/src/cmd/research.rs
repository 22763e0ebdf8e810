use anyhow::{Context as _, Result};
use cairn_core::TaskId;
use clap::Args;
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::open_ledger;
use crate::output::{OutputMode, render_success};

#[derive(Args, Debug)]
pub struct ResearchArgs {
    /// Task the findings belong to.
    pub id: String,

    /// Findings as inline JSON.
    #[arg(long, value_name = "JSON", conflicts_with = "file", required_unless_present = "file")]
    pub data: Option<String>,

    /// Read findings from a JSON file.
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

fn read_findings(args: &ResearchArgs) -> Result<Value> {
    let raw = match (&args.data, &args.file) {
        (Some(data), _) => data.clone(),
        (None, Some(file)) => std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?,
        (None, None) => anyhow::bail!("pass --data or --file"),
    };
    serde_json::from_str(&raw).context("research findings must be valid JSON")
}

pub fn run_research(args: &ResearchArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let findings = read_findings(args)?;
    let ledger = open_ledger(project_root)?;
    let id = TaskId::from(args.id.as_str());
    let cleared = findings.is_null();
    ledger.attach_research(&id, findings)?;
    if cleared {
        render_success(output, &format!("Cleared research on {id}"))
    } else {
        render_success(output, &format!("Attached research to {id}"))
    }
}
