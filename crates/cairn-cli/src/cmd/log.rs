//! `cairn log`: the raw records behind every other view.

use anyhow::Result;
use cairn_core::event;
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::Path;

use super::open_ledger;
use crate::output::{OutputMode, render};

#[derive(Args, Debug, Default)]
pub struct LogArgs {
    /// Only the last N records.
    #[arg(long, value_name = "N")]
    pub tail: Option<usize>,

    /// Also report lines that failed to decode.
    #[arg(long)]
    pub skipped: bool,
}

#[derive(Debug, Serialize)]
struct Line {
    line: usize,
    event: Value,
}

#[derive(Debug, Serialize)]
struct Skipped {
    line: usize,
    reason: String,
}

#[derive(Debug, Serialize)]
struct LogReport {
    records: Vec<Line>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skipped: Vec<Skipped>,
}

pub fn run_log(args: &LogArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let scan = ledger.scan()?;

    let start = args
        .tail
        .map_or(0, |n| scan.records.len().saturating_sub(n));
    let records = scan.records[start..]
        .iter()
        .map(|r| -> Result<Line> {
            let encoded = event::encode(&r.event)?;
            Ok(Line {
                line: r.line,
                event: serde_json::from_str(&encoded)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let skipped = if args.skipped {
        scan.skipped
            .into_iter()
            .map(|s| Skipped {
                line: s.line,
                reason: s.reason,
            })
            .collect()
    } else {
        Vec::new()
    };

    render(output, &LogReport { records, skipped }, |report, w| {
        for record in &report.records {
            writeln!(w, "{:>6}  {}", record.line, record.event)?;
        }
        for s in &report.skipped {
            writeln!(w, "{:>6}! {}", s.line, s.reason)?;
        }
        Ok(())
    })
}
