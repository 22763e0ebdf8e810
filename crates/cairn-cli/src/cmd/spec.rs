use anyhow::Result;
use clap::Args;
use std::path::Path;

use super::open_ledger;
use crate::output::{OutputMode, render_success};

#[derive(Args, Debug)]
pub struct SpecArgs {
    /// Spec file the plan is built from.
    pub file: String,
}

pub fn run_spec(args: &SpecArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    ledger.set_spec(&args.file)?;
    render_success(output, &format!("Active spec is {}", args.file))
}
