use anyhow::Result;
use cairn_core::{Task, graph};
use clap::{Args, ValueEnum};
use std::io::Write;
use std::path::Path;

use super::{open_ledger, write_task_line};
use crate::output::{OutputMode, render};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Ready,
    Blocked,
    Done,
    Killed,
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Which active tasks to show.
    #[arg(long, value_enum, default_value_t = StatusFilter::All)]
    pub status: StatusFilter,
}

pub fn run_list(args: &ListArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let state = ledger.state()?;
    let tasks: Vec<&Task> = match args.status {
        StatusFilter::All => state.tasks(),
        StatusFilter::Pending => state.pending(),
        StatusFilter::Ready => graph::ready(&state),
        StatusFilter::Blocked => graph::blocked(&state).into_iter().map(|b| b.task).collect(),
        StatusFilter::Done => state.done(),
        StatusFilter::Killed => state.killed(),
    };

    render(output, &tasks, |tasks, w| {
        if tasks.is_empty() {
            return writeln!(w, "(no tasks)");
        }
        for task in tasks {
            write_task_line(w, task)?;
        }
        Ok(())
    })
}
