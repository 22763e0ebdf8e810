use anyhow::Result;
use cairn_core::{Stage, derive_stage, graph};
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use super::open_ledger;
use crate::output::OutputMode;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Poll interval in milliseconds.
    #[arg(long, default_value_t = 1000, value_name = "MS")]
    pub interval: u64,

    /// Stop after reporting this many changes.
    #[arg(long, value_name = "N")]
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Change<'a> {
    stage: Stage,
    events: usize,
    next: Option<&'a str>,
}

/// Follow the ledger and print one line per change. JSON mode emits one
/// object per line so a driver can stream it.
pub fn run_watch(args: &WatchArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let mut watcher = ledger.watcher();
    let interval = Duration::from_millis(args.interval.max(1));
    let mut reported = 0usize;

    loop {
        if let Some(state) = watcher.poll()? {
            let change = Change {
                stage: derive_stage(state),
                events: state.events_applied(),
                next: graph::next_task(state).map(|t| t.id.as_str()),
            };
            let stdout = io::stdout();
            let mut out = stdout.lock();
            if output.is_json() {
                serde_json::to_writer(&mut out, &change)?;
                writeln!(out)?;
            } else {
                writeln!(
                    out,
                    "{:<12} events={:<6} next={}",
                    change.stage,
                    change.events,
                    change.next.unwrap_or("-")
                )?;
            }
            out.flush()?;

            reported += 1;
            if args.count.is_some_and(|n| reported >= n) {
                return Ok(());
            }
        }
        std::thread::sleep(interval);
    }
}
