//! `cairn done`: mark a pending task done.

use anyhow::Result;
use cairn_core::TaskId;
use clap::Args;
use std::path::Path;

use super::open_ledger;
use crate::output::{OutputMode, render_success};

#[derive(Args, Debug)]
pub struct DoneArgs {
    /// Task to mark done (defaults to the next ready task).
    pub id: Option<String>,
}

pub fn run_done(args: &DoneArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let id = args.id.as_deref().map(TaskId::from);
    let done = ledger.mark_done(id.as_ref())?;
    render_success(output, &format!("Marked {done} as done"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_args_parses_optional_id() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: DoneArgs,
        }
        let w = Wrapper::parse_from(["test", "t-789"]);
        assert_eq!(w.args.id.as_deref(), Some("t-789"));
        let w = Wrapper::parse_from(["test"]);
        assert!(w.args.id.is_none());
    }
}
