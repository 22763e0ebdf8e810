use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::model::{IssueId, TaskId};
use crate::validate::Violation;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    MalformedRecord,
    ValidationFailed,
    NotFound,
    InvalidTransition,
    DanglingDependency,
    CycleDetected,
    MaxDecomposeDepth,
    LedgerWriteFailed,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::MalformedRecord => "E1003",
            Self::ValidationFailed => "E2001",
            Self::NotFound => "E2002",
            Self::InvalidTransition => "E2003",
            Self::DanglingDependency => "E2004",
            Self::CycleDetected => "E2005",
            Self::MaxDecomposeDepth => "E2006",
            Self::LedgerWriteFailed => "E5001",
            Self::LockContention => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Ledger not initialized",
            Self::ConfigParseError => "Configuration error",
            Self::MalformedRecord => "Malformed ledger record",
            Self::ValidationFailed => "Content failed validation",
            Self::NotFound => "Id not found in the active set",
            Self::InvalidTransition => "Invalid lifecycle transition",
            Self::DanglingDependency => "Dependency does not resolve",
            Self::CycleDetected => "Cycle would be created",
            Self::MaxDecomposeDepth => "Maximum decomposition depth exceeded",
            Self::LedgerWriteFailed => "Ledger write failed",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `cairn init` to create .cairn/ledger.jsonl."),
            Self::ConfigParseError => Some("Fix .cairn/config.toml, or use a key listed by `cairn config show`."),
            Self::MalformedRecord => Some("The line is skipped on replay; inspect it with `cairn log`."),
            Self::ValidationFailed => Some("Address each listed field and resubmit the intent."),
            Self::NotFound => Some("Run `cairn list` to see active task and issue ids."),
            Self::InvalidTransition => {
                Some("Follow valid transitions: pending -> done -> accepted | pending.")
            }
            Self::DanglingDependency => {
                Some("Depend only on active task ids or tasks that were accepted.")
            }
            Self::CycleDetected => Some("Remove/adjust dependency links to keep the graph acyclic."),
            Self::MaxDecomposeDepth => {
                Some("Delete the task or rewrite it by hand instead of splitting it again.")
            }
            Self::LedgerWriteFailed => {
                Some("Check disk space and write permissions, then retry the whole intent.")
            }
            Self::LockContention => Some("Retry after the other `cairn` process releases its lock."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Every failure that can leave the ledger boundary.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// No ledger file exists under the working directory.
    #[error("no ledger at {0}")]
    NotInitialized(PathBuf),

    /// A ledger line could not be decoded.
    #[error("line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// Proposed content was rejected before becoming an event.
    #[error("validation failed: {}", summarize(.0))]
    ValidationFailed(Vec<Violation>),

    /// A dependency refers to an id that cannot satisfy it.
    #[error("task {task} depends on {dep}, which {}", dangling_reason(.deleted))]
    DanglingDependency {
        task: TaskId,
        dep: TaskId,
        deleted: bool,
    },

    /// Adding the dependencies would close a cycle.
    #[error("dependency cycle: {}", join_ids(.cycle))]
    CyclicDependency { cycle: Vec<TaskId> },

    /// The ledger lock could not be acquired in time.
    #[error("lock timed out after {waited:?} at {}", .path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    /// The referenced task is not in the active set.
    #[error("task {0} not found in the active set")]
    TaskNotFound(TaskId),

    /// The referenced issue is not tracked.
    #[error("issue {0} not found")]
    IssueNotFound(IssueId),

    /// Nothing eligible for an operation that auto-selects its target.
    #[error("no {0} task to select")]
    NothingToSelect(&'static str),

    /// The operation does not apply to the task's current status.
    #[error("task {id} is {status}; {op} requires {required}")]
    InvalidTransition {
        id: TaskId,
        op: &'static str,
        status: &'static str,
        required: &'static str,
    },

    /// A decomposition would nest deeper than allowed.
    #[error("task {id} is at decomposition depth {depth}; limit is {max}")]
    MaxDecomposeDepthExceeded { id: TaskId, depth: u32, max: u32 },

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// An event could not be serialized.
    #[error("failed to encode event: {0}")]
    Encode(#[from] crate::event::EncodeError),

    /// Disk I/O failed; the intent is not durable.
    #[error("ledger I/O error: {0}")]
    Io(#[from] io::Error),
}

impl LedgerError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized(_) => ErrorCode::NotInitialized,
            Self::MalformedRecord { .. } => ErrorCode::MalformedRecord,
            Self::ValidationFailed(_) => ErrorCode::ValidationFailed,
            Self::DanglingDependency { .. } => ErrorCode::DanglingDependency,
            Self::CyclicDependency { .. } => ErrorCode::CycleDetected,
            Self::LockTimeout { .. } => ErrorCode::LockContention,
            Self::TaskNotFound(_) | Self::IssueNotFound(_) | Self::NothingToSelect(_) => {
                ErrorCode::NotFound
            }
            Self::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            Self::MaxDecomposeDepthExceeded { .. } => ErrorCode::MaxDecomposeDepth,
            Self::Config(_) => ErrorCode::ConfigParseError,
            Self::Io(_) => ErrorCode::LedgerWriteFailed,
            Self::Encode(_) => ErrorCode::InternalUnexpected,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Whether retrying the same intent may succeed without changes.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    /// Violations carried by a validation failure, empty otherwise.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::ValidationFailed(v) => v,
            _ => &[],
        }
    }
}

impl From<crate::lock::LockError> for LedgerError {
    fn from(err: crate::lock::LockError) -> Self {
        match err {
            crate::lock::LockError::Timeout { path, waited } => Self::LockTimeout { path, waited },
            crate::lock::LockError::Io(e) => Self::Io(e),
        }
    }
}

const fn dangling_reason(deleted: &bool) -> &'static str {
    if *deleted {
        "was deleted without being accepted"
    } else {
        "was never recorded"
    }
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.code))
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, LedgerError};
    use crate::model::TaskId;
    use crate::validate::{Violation, ViolationCode};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::MalformedRecord,
            ErrorCode::ValidationFailed,
            ErrorCode::NotFound,
            ErrorCode::InvalidTransition,
            ErrorCode::DanglingDependency,
            ErrorCode::CycleDetected,
            ErrorCode::MaxDecomposeDepth,
            ErrorCode::LedgerWriteFailed,
            ErrorCode::LockContention,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::InvalidTransition.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn cycle_error_renders_path() {
        let err = LedgerError::CyclicDependency {
            cycle: vec![
                TaskId::new_unchecked("t-a"),
                TaskId::new_unchecked("t-b"),
                TaskId::new_unchecked("t-a"),
            ],
        };
        assert_eq!(err.to_string(), "dependency cycle: t-a -> t-b -> t-a");
        assert_eq!(err.code(), ErrorCode::CycleDetected);
    }

    #[test]
    fn validation_error_lists_fields_and_codes() {
        let err = LedgerError::ValidationFailed(vec![Violation::new(
            "notes",
            ViolationCode::NotesTooShort,
            "too short",
        )]);
        assert!(err.to_string().contains("notes: NOTES_TOO_SHORT"));
        assert_eq!(err.violations().len(), 1);
        assert!(!err.is_retryable());
    }

    #[test]
    fn only_lock_timeouts_are_retryable() {
        let err = LedgerError::LockTimeout {
            path: "x.lock".into(),
            waited: std::time::Duration::from_millis(5),
        };
        assert!(err.is_retryable());
        assert!(err.hint().is_some());
    }
}
