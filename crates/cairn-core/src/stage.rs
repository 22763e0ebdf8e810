//! Workflow stage derivation.
//!
//! The stage is never stored. It is recomputed from [`LedgerState`] on every
//! read, checking the rules below in order; the first match wins.
//!
//! | # | Condition                          | Stage         |
//! |---|------------------------------------|---------------|
//! | 1 | no spec selected                   | `PLAN`        |
//! | 2 | any open issue                     | `INVESTIGATE` |
//! | 3 | any active task with a kill reason | `DECOMPOSE`   |
//! | 4 | any pending task                   | `BUILD`       |
//! | 5 | any done task                      | `VERIFY`      |
//! | 6 | otherwise                          | `COMPLETE`    |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::replay::LedgerState;

/// What the driver should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    /// Write the plan: no spec has been selected.
    Plan,
    /// Work the next ready task.
    Build,
    /// Review done tasks.
    Verify,
    /// Turn open issues into tasks.
    Investigate,
    /// Split a task whose last attempt was killed.
    Decompose,
    /// Nothing left to do.
    Complete,
}

impl Stage {
    pub const ALL: [Self; 6] = [
        Self::Plan,
        Self::Build,
        Self::Verify,
        Self::Investigate,
        Self::Decompose,
        Self::Complete,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "PLAN",
            Self::Build => "BUILD",
            Self::Verify => "VERIFY",
            Self::Investigate => "INVESTIGATE",
            Self::Decompose => "DECOMPOSE",
            Self::Complete => "COMPLETE",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}

/// Derive the current stage from a replayed state.
#[must_use]
pub fn derive_stage(state: &LedgerState) -> Stage {
    if state.spec.is_none() {
        return Stage::Plan;
    }
    if !state.open_issues().is_empty() {
        return Stage::Investigate;
    }

    let tasks = state.tasks();
    if tasks.iter().any(|t| t.needs_decomposition()) {
        Stage::Decompose
    } else if tasks.iter().any(|t| t.is_pending()) {
        Stage::Build
    } else if tasks.iter().any(|t| t.is_done()) {
        Stage::Verify
    } else {
        Stage::Complete
    }
}
