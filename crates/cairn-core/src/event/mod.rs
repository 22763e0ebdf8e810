//! Event data model for the plan ledger.
//!
//! The ledger is newline-delimited JSON, one event per line, discriminated by
//! the `t` field:
//!
//! ```text
//! {"accept":"cargo test parser passes","deps":[],"id":"t-1f9a2c04","name":"Add parser",...,"s":"p","t":"task"}
//! {"id":"t-1f9a2c04","t":"done"}
//! ```
//!
//! [`Event`] is a sum type over the known kinds. Lines whose kind this build
//! does not know decode into [`Event::Unknown`] and are carried verbatim so a
//! newer writer's records are never rewritten or lost.

pub mod canonical;
pub mod codec;
pub mod data;
pub mod kind;

pub use codec::{DecodeError, EncodeError, decode, encode, encode_line};
pub use data::{
    ConfigData, DeleteData, Extra, IssueData, IssueDoneData, MarkData, PrioritizeData, RejectData,
    SpecData, TaskData, TaskPatchData,
};
pub use kind::{EventKind, UnknownEventKind};

use serde_json::{Map, Value};
use std::fmt;

use crate::model::TaskId;

/// A single immutable ledger record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Config(ConfigData),
    Spec(SpecData),
    /// `task` line creating a task.
    Task(TaskData),
    /// `task` line patching an existing task.
    TaskPatch(TaskPatchData),
    Done(MarkData),
    Accept(MarkData),
    Reject(RejectData),
    Delete(DeleteData),
    Prioritize(PrioritizeData),
    Issue(IssueData),
    IssueDone(IssueDoneData),
    /// A kind this build does not understand, preserved as-is.
    Unknown(UnknownEvent),
}

/// A record with an unrecognised `t` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEvent {
    /// The raw `t` value.
    pub kind: String,
    /// Every other field on the line.
    pub fields: Map<String, Value>,
}

impl Event {
    /// The known kind, or `None` for [`Event::Unknown`].
    #[must_use]
    pub const fn kind(&self) -> Option<EventKind> {
        Some(match self {
            Self::Config(_) => EventKind::Config,
            Self::Spec(_) => EventKind::Spec,
            Self::Task(_) | Self::TaskPatch(_) => EventKind::Task,
            Self::Done(_) => EventKind::Done,
            Self::Accept(_) => EventKind::Accept,
            Self::Reject(_) => EventKind::Reject,
            Self::Delete(_) => EventKind::Delete,
            Self::Prioritize(_) => EventKind::Prioritize,
            Self::Issue(_) => EventKind::Issue,
            Self::IssueDone(_) => EventKind::IssueDone,
            Self::Unknown(_) => return None,
        })
    }

    /// The `t` value written for this event.
    #[must_use]
    pub fn kind_str(&self) -> &str {
        match self {
            Self::Unknown(u) => &u.kind,
            other => other.kind().map_or("", EventKind::as_str),
        }
    }

    /// The task this event targets, if any.
    #[must_use]
    pub const fn task_id(&self) -> Option<&TaskId> {
        match self {
            Self::Task(d) => Some(&d.id),
            Self::TaskPatch(d) => Some(&d.id),
            Self::Done(d) | Self::Accept(d) => Some(&d.id),
            Self::Reject(d) => Some(&d.id),
            Self::Delete(d) => Some(&d.id),
            Self::Prioritize(d) => Some(&d.id),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(d) => write!(f, "config: {} key(s)", d.values.len()),
            Self::Spec(d) => write!(f, "spec: {}", d.spec),
            Self::Task(d) => write!(f, "task {}: {}", d.id, d.name),
            Self::TaskPatch(d) => match &d.kill_reason {
                Some(reason) => write!(f, "task {} killed: {reason}", d.id),
                None => write!(f, "task {} updated", d.id),
            },
            Self::Done(d) => write!(f, "done {}", d.id),
            Self::Accept(d) => write!(f, "accept {}", d.id),
            Self::Reject(d) => write!(f, "reject {}: {}", d.id, preview(&d.reason)),
            Self::Delete(d) => write!(f, "delete {}", d.id),
            Self::Prioritize(d) => write!(f, "prioritize {} {}", d.id, d.priority),
            Self::Issue(d) => write!(f, "issue {}: {}", d.id, preview(&d.desc)),
            Self::IssueDone(d) => match &d.id {
                Some(id) => write!(f, "issue_done {id}"),
                None => f.write_str("issue_done (all)"),
            },
            Self::Unknown(u) => write!(f, "unknown kind '{}'", u.kind),
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > 40 {
        let head: String = text.chars().take(40).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}
