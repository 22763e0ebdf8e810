//! Event kind discriminator.
//!
//! Every ledger line carries its kind in the `t` field. The string forms are
//! short and stable because they are written once per event forever.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The ten event kinds understood by this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Scalar configuration overrides.
    Config,
    /// Select the active spec file.
    Spec,
    /// Create a task, or patch fields of an existing one.
    Task,
    /// Mark a pending task done.
    Done,
    /// Accept a done task (terminal).
    Accept,
    /// Reject a done task back to pending.
    Reject,
    /// Remove a task outright.
    Delete,
    /// Change a task's priority.
    Prioritize,
    /// Record an open issue.
    Issue,
    /// Mark one issue, or every open issue, fixed.
    IssueDone,
}

/// Error returned when parsing an unknown event kind string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventKind {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown event kind '{}': expected one of config, spec, task, done, \
             accept, reject, delete, prioritize, issue, issue_done",
            self.raw
        )
    }
}

impl std::error::Error for UnknownEventKind {}

impl EventKind {
    /// All known kinds in catalog order.
    pub const ALL: [Self; 10] = [
        Self::Config,
        Self::Spec,
        Self::Task,
        Self::Done,
        Self::Accept,
        Self::Reject,
        Self::Delete,
        Self::Prioritize,
        Self::Issue,
        Self::IssueDone,
    ];

    /// Return the canonical `t` value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Spec => "spec",
            Self::Task => "task",
            Self::Done => "done",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Delete => "delete",
            Self::Prioritize => "prioritize",
            Self::Issue => "issue",
            Self::IssueDone => "issue_done",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind { raw: s.to_string() })
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
