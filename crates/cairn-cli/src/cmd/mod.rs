//! One module per subcommand. Handlers take parsed args, the output mode,
//! and the project root, and return `anyhow::Result<()>`.

pub mod add;
pub mod config;
pub mod decompose;
pub mod delete;
pub mod done;
pub mod init;
pub mod issue;
pub mod kill;
pub mod list;
pub mod log;
pub mod next;
pub mod prioritize;
pub mod research;
pub mod review;
pub mod spec;
pub mod status;
pub mod watch;

use anyhow::{Context as _, Result};
use cairn_core::{Ledger, Task};
use std::io::{self, Write};
use std::path::Path;

/// Open the ledger under `project_root` with its file configuration.
pub fn open_ledger(project_root: &Path) -> Result<Ledger> {
    Ledger::open_configured(project_root)
        .with_context(|| format!("Failed to open ledger under {}", project_root.display()))
}

/// One-line task summary shared by list, next, and status.
pub fn write_task_line(w: &mut dyn Write, task: &Task) -> io::Result<()> {
    let mut flags = Vec::new();
    if let Some(reason) = &task.kill_reason {
        flags.push(format!("killed: {reason}"));
    }
    if task.reject_count > 0 {
        flags.push(format!("rejected x{}", task.reject_count));
    }
    if !task.deps.is_empty() {
        let deps: Vec<&str> = task.deps.iter().map(|d| d.as_str()).collect();
        flags.push(format!("deps: {}", deps.join(",")));
    }
    let suffix = if flags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", flags.join("; "))
    };
    writeln!(
        w,
        "{:<12} {:<7} {:<6} {}{suffix}",
        task.id,
        task.status,
        task.priority,
        task.name
    )
}
