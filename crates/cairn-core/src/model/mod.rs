//! Domain types materialized by replay.

pub mod id;
pub mod task;

pub use id::{IssueId, TaskId};
pub use task::{Issue, IssueStatus, ParsePriorityError, Priority, Task, TaskStatus};
