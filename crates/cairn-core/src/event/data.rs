//! Typed payload structs, one per event kind.
//!
//! Unknown fields are preserved via `#[serde(flatten)]` so that a line
//! written by a newer build survives a decode/encode cycle unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::model::{IssueId, Priority, TaskId, TaskStatus};

/// Extra fields this build does not know about.
pub type Extra = BTreeMap<String, Value>;

/// Payload for `config`: arbitrary scalar overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConfigData {
    #[serde(flatten)]
    pub values: BTreeMap<String, Value>,
}

/// Payload for `spec`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecData {
    pub spec: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Payload for a `task` line that creates a task (carries `name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskData {
    pub id: TaskId,
    #[serde(default)]
    pub spec: String,
    pub name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub accept: String,
    #[serde(default)]
    pub deps: Vec<TaskId>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(rename = "s", default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_from: Option<IssueId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<TaskId>,
    /// `Some(Value::Null)` is a recorded `null`, distinct from absent.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub research: Option<Value>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub decompose_depth: u32,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Payload for a `task` line without `name`: a partial update of an
/// existing task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatchData {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kill_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deps: Option<Vec<TaskId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// `Some(Value::Null)` is a recorded `null`, distinct from absent.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub research: Option<Value>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl TaskPatchData {
    /// An empty patch for `id`.
    #[must_use]
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            kill_reason: None,
            deps: None,
            notes: None,
            research: None,
            extra: Extra::new(),
        }
    }
}

/// Payload shared by `done` and `accept`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkData {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Payload for `reject`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectData {
    pub id: TaskId,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Payload for `delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteData {
    pub id: TaskId,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Payload for `prioritize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrioritizeData {
    pub id: TaskId,
    pub priority: Priority,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Payload for `issue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueData {
    pub id: IssueId,
    pub desc: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Payload for `issue_done`. No id means every open issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDoneData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<IssueId>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Absent stays `None` via `#[serde(default)]`; any present value,
/// `null` included, becomes `Some`.
fn present_value<'de, D>(de: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(de).map(Some)
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(n: &u32) -> bool {
    *n == 0
}
