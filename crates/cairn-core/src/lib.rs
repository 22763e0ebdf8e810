//! cairn-core: the plan ledger and workflow state machine.
//!
//! The project's plan lives in `.cairn/ledger.jsonl`, an append-only log of
//! JSON events. Every read replays the whole log into a [`LedgerState`]; the
//! workflow [`Stage`] is derived from that state and never stored.
//!
//! ## Layers
//!
//! - [`event`]: the record types and their line codec.
//! - [`lock`] and [`log`]: advisory-locked appends and tolerant reads.
//! - [`replay`]: fold events into tasks, issues, and tombstones.
//! - [`graph`]: dependency checks and next-task selection.
//! - [`validate`]: content rules for task and issue proposals.
//! - [`stage`]: the stage machine.
//! - [`ledger`]: the facade that ties the above into commands and queries.
//! - [`watch`]: polling change detection for long-running readers.
//!
//! # Conventions
//!
//! - **Errors**: library functions return [`LedgerError`]; config loading
//!   uses `anyhow::Result` with context.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `debug!`). The
//!   library never installs a subscriber.

pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod ledger;
pub mod lock;
pub mod log;
pub mod model;
pub mod replay;
pub mod stage;
pub mod validate;
pub mod watch;

pub use config::{LedgerConfig, ValidationConfig, load_config};
pub use error::{ErrorCode, LedgerError};
pub use event::Event;
pub use ledger::{CAIRN_DIR, IssueDraft, Ledger, TaskDraft};
pub use model::{Issue, IssueId, IssueStatus, Priority, Task, TaskId, TaskStatus};
pub use replay::{LedgerState, Tombstone, replay};
pub use stage::{Stage, derive_stage};
pub use validate::{Violation, ViolationCode};
pub use watch::Watcher;
