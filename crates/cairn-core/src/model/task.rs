use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::{fmt, str::FromStr};

use super::id::{IssueId, TaskId};

/// Scheduling priority for tasks and issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Selection rank: lower runs first.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an invalid priority string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePriorityError(pub String);

impl fmt::Display for ParsePriorityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid priority '{}': expected high, medium, or low",
            self.0
        )
    }
}

impl std::error::Error for ParsePriorityError {}

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Self::High),
            "medium" | "med" | "m" => Ok(Self::Medium),
            "low" | "l" => Ok(Self::Low),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}

/// Task lifecycle status. Serialized as the single-letter `s` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "p")]
    Pending,
    #[serde(rename = "d")]
    Done,
}

impl TaskStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work in the plan, as materialized by replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// The spec file this task belongs to.
    pub spec: String,
    pub name: String,
    pub notes: String,
    /// Acceptance criteria.
    pub accept: String,
    pub deps: BTreeSet<TaskId>,
    pub priority: Priority,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
    /// Number of times the task has been rejected.
    #[serde(skip_serializing_if = "is_zero")]
    pub reject_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_at: Option<DateTime<Utc>>,
    /// Issue this task was created to fix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_from: Option<IssueId>,
    /// Task this one was split out of.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research: Option<serde_json::Value>,
    /// Why the execution driver killed the last attempt (timeout, context limit).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kill_reason: Option<String>,
    pub decompose_depth: u32,
    /// Position in creation order; ties in selection go to the lower value.
    pub seq: u64,
}

impl Task {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    /// Whether the driver flagged this task for decomposition.
    #[must_use]
    pub fn needs_decomposition(&self) -> bool {
        self.kill_reason.is_some()
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// Issue status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    #[default]
    Open,
    Fixed,
}

/// A problem discovered during BUILD or VERIFY that must be investigated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub description: String,
    pub priority: Priority,
    pub status: IssueStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    pub seq: u64,
}

impl Issue {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == IssueStatus::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_rank_orders_high_first() {
        let mut all = [Priority::Low, Priority::High, Priority::Medium];
        all.sort_by_key(|p| p.rank());
        assert_eq!(all, [Priority::High, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn priority_parses_aliases() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("med".parse::<Priority>().unwrap(), Priority::Medium);
        assert_eq!(" l ".parse::<Priority>().unwrap(), Priority::Low);
        let err = "urgent".parse::<Priority>().unwrap_err();
        assert!(err.to_string().contains("urgent"));
    }

    #[test]
    fn status_serializes_as_single_letter() {
        assert_eq!(serde_json::to_string(&TaskStatus::Pending).unwrap(), "\"p\"");
        assert_eq!(serde_json::to_string(&TaskStatus::Done).unwrap(), "\"d\"");
        assert!(serde_json::from_str::<TaskStatus>("\"x\"").is_err());
    }
}
