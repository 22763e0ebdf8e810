use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use super::open_ledger;
use crate::output::{OutputMode, pretty_kv, pretty_section, render};

#[derive(Debug, Serialize)]
struct EmptyNext {
    message: String,
}

/// Execute `cairn next`: the highest-priority pending task whose deps are
/// all accepted. Having nothing ready is not an error.
pub fn run_next(output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let Some(task) = ledger.next_task()? else {
        let empty = EmptyNext {
            message: "No pending task is ready".to_string(),
        };
        return render(output, &empty, |_, w| writeln!(w, "(no ready tasks right now)"));
    };

    render(output, &task, |t, w| {
        pretty_section(w, &format!("{} {}", t.id, t.name))?;
        pretty_kv(w, "Priority", t.priority.as_str())?;
        pretty_kv(w, "Spec", &t.spec)?;
        if let Some(reason) = &t.reject_reason {
            pretty_kv(w, "Rejected", format!("x{}: {reason}", t.reject_count))?;
        }
        writeln!(w, "\nNotes:\n  {}", t.notes)?;
        writeln!(w, "\nAccept:\n  {}", t.accept)?;
        if let Some(research) = &t.research {
            writeln!(w, "\nResearch:\n  {research}")?;
        }
        Ok(())
    })
}
