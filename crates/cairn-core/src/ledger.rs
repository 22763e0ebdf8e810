//! The ledger facade: every intent a caller can express, and every query.
//!
//! Each command runs inside [`AppendLog::transact`]: the ledger is replayed
//! under the writer lock, the intent is validated against that state, and the
//! resulting events are appended before the lock is released. A command that
//! fails validation appends nothing.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use crate::config::{LedgerConfig, load_config};
use crate::error::LedgerError;
use crate::event::{
    ConfigData, DeleteData, Event, Extra, IssueData, IssueDoneData, MarkData, PrioritizeData,
    RejectData, SpecData, TaskData, TaskPatchData,
};
use crate::graph::{self, Proposal};
use crate::log::{AppendLog, Scan};
use crate::model::{IssueId, Priority, Task, TaskId, TaskStatus};
use crate::replay::{LedgerState, replay};
use crate::stage::{Stage, derive_stage};
use crate::validate::{self, IssueContent, TaskContent, ValidationOptions, Violation};
use crate::watch::Watcher;

/// Name of the per-project state directory.
pub const CAIRN_DIR: &str = ".cairn";

/// A proposed task, before it has an id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TaskDraft {
    pub name: String,
    pub notes: String,
    pub accept: String,
    pub deps: Vec<TaskId>,
    /// `None` means medium for new tasks and the parent's priority for
    /// decomposed children.
    pub priority: Option<Priority>,
    /// Defaults to the ledger's active spec.
    pub spec: Option<String>,
    pub created_from: Option<IssueId>,
    pub research: Option<Value>,
}

impl TaskDraft {
    pub fn new(name: impl Into<String>, notes: impl Into<String>, accept: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            notes: notes.into(),
            accept: accept.into(),
            ..Self::default()
        }
    }

    fn content(&self) -> TaskContent<'_> {
        TaskContent {
            name: &self.name,
            notes: &self.notes,
            accept: &self.accept,
        }
    }
}

/// A proposed issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IssueDraft {
    pub description: String,
    pub priority: Priority,
    pub spec: Option<String>,
}

impl IssueDraft {
    pub fn new(description: impl Into<String>, priority: Priority) -> Self {
        Self {
            description: description.into(),
            priority,
            spec: None,
        }
    }
}

/// Handle on the ledger of one project root.
#[derive(Debug, Clone)]
pub struct Ledger {
    root: PathBuf,
    log: AppendLog,
    config: LedgerConfig,
}

impl Ledger {
    /// Open the existing ledger under `root`.
    ///
    /// `config` is the file-level configuration; `config` events recorded in
    /// the ledger are layered on top of it.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotInitialized`] if `<root>/.cairn/ledger.jsonl`
    /// does not exist.
    pub fn open(root: impl AsRef<Path>, config: LedgerConfig) -> Result<Self, LedgerError> {
        let ledger = Self::handle(root.as_ref(), config);
        if !ledger.log.exists() {
            return Err(LedgerError::NotInitialized(ledger.log.path().to_path_buf()));
        }
        let state = ledger.state()?;
        Ok(ledger.reconfigured(&state))
    }

    /// Create the ledger under `root` if needed and open it.
    ///
    /// Returns the ledger and whether it was newly created.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the directory or file cannot be created.
    pub fn init(root: impl AsRef<Path>, config: LedgerConfig) -> Result<(Self, bool), LedgerError> {
        let ledger = Self::handle(root.as_ref(), config);
        let created = ledger.log.create()?;
        if created {
            tracing::info!(path = %ledger.log.path().display(), "initialized ledger");
        }
        let state = ledger.state()?;
        Ok((ledger.reconfigured(&state), created))
    }

    /// Open the ledger under `root` with `.cairn/config.toml` applied.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Config`] if the config file cannot be read or
    /// parsed, otherwise as [`Ledger::open`].
    pub fn open_configured(root: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let root = root.as_ref();
        let config = load_config(root).map_err(|e| LedgerError::Config(format!("{e:#}")))?;
        Self::open(root, config)
    }

    fn handle(root: &Path, config: LedgerConfig) -> Self {
        let log = AppendLog::new(root.join(CAIRN_DIR))
            .with_options(config.lock_timeout(), config.durable);
        Self {
            root: root.to_path_buf(),
            log,
            config,
        }
    }

    fn reconfigured(mut self, state: &LedgerState) -> Self {
        let effective = self.effective_config(state);
        self.log = self
            .log
            .with_options(effective.lock_timeout(), effective.durable);
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn log(&self) -> &AppendLog {
        &self.log
    }

    /// File-level configuration, without ledger overrides.
    #[must_use]
    pub const fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Configuration with the ledger's `config` events applied.
    #[must_use]
    pub fn effective_config(&self, state: &LedgerState) -> LedgerConfig {
        self.config.clone().with_overrides(&state.config)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Replay the whole ledger.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the ledger cannot be read.
    pub fn state(&self) -> Result<LedgerState, LedgerError> {
        Ok(replay(&self.log.read_all()?))
    }

    /// Raw records with line numbers, for inspection.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the ledger cannot be read.
    pub fn scan(&self) -> Result<Scan, LedgerError> {
        self.log.scan()
    }

    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the ledger cannot be read.
    pub fn stage(&self) -> Result<Stage, LedgerError> {
        Ok(derive_stage(&self.state()?))
    }

    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the ledger cannot be read.
    pub fn next_task(&self) -> Result<Option<Task>, LedgerError> {
        let state = self.state()?;
        Ok(graph::next_task(&state).cloned())
    }

    /// Tasks rejected at least `max_rejections` times.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the ledger cannot be read.
    pub fn escalations(&self) -> Result<Vec<Task>, LedgerError> {
        let state = self.state()?;
        let threshold = self.effective_config(&state).max_rejections;
        Ok(state.escalations(threshold).into_iter().cloned().collect())
    }

    /// Validate `draft` without recording anything.
    ///
    /// Content problems come back as violations; structural problems with
    /// the deps come back as errors.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DanglingDependency`] or
    /// [`LedgerError::CyclicDependency`] for bad deps.
    pub fn check_task(&self, draft: &TaskDraft) -> Result<Vec<Violation>, LedgerError> {
        let state = self.state()?;
        let opts = self.effective_config(&state).validation;
        let violations = validate::check_task(draft.content(), &opts);
        let probe = TaskId::generate(&draft.name, |c| state.is_known_id(c));
        graph::validate_dependencies(&state, &[Proposal::new(probe, draft.deps.clone())], &[])?;
        Ok(violations)
    }

    /// Poll-based change watcher over this ledger.
    #[must_use]
    pub fn watcher(&self) -> Watcher {
        Watcher::new(self.log.clone())
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Validate and record a new pending task.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ValidationFailed`] with every violation,
    /// [`LedgerError::DanglingDependency`] or [`LedgerError::CyclicDependency`]
    /// for bad deps, [`LedgerError::IssueNotFound`] if `created_from` names an
    /// unknown issue, or a write error.
    pub fn add_task(&self, draft: TaskDraft) -> Result<TaskId, LedgerError> {
        self.log.transact(|events| {
            let state = replay(&events);
            let opts = self.effective_config(&state).validation;
            reject_violations(validate::check_task(draft.content(), &opts))?;

            if let Some(issue) = &draft.created_from {
                if state.issue(issue).is_none() {
                    return Err(LedgerError::IssueNotFound(issue.clone()));
                }
            }

            let spec = draft
                .spec
                .clone()
                .or_else(|| state.spec.clone())
                .unwrap_or_default();
            let id = TaskId::generate(&format!("{spec}|{}", draft.name), |c| state.is_known_id(c));
            graph::validate_dependencies(&state, &[Proposal::new(id.clone(), draft.deps.clone())], &[])?;

            let event = Event::Task(TaskData {
                id: id.clone(),
                spec,
                name: draft.name,
                notes: draft.notes,
                accept: draft.accept,
                deps: dedup(draft.deps),
                priority: draft.priority.unwrap_or_default(),
                status: TaskStatus::Pending,
                created_from: draft.created_from,
                parent: None,
                research: draft.research,
                decompose_depth: 0,
                extra: Extra::new(),
            });
            tracing::info!(id = %id, "task added");
            Ok((vec![event], id))
        })
    }

    /// Mark a pending task done. Without an id, the next ready task is used.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TaskNotFound`], [`LedgerError::InvalidTransition`]
    /// if the task is already done, or [`LedgerError::NothingToSelect`].
    pub fn mark_done(&self, id: Option<&TaskId>) -> Result<TaskId, LedgerError> {
        self.log.transact(|events| {
            let state = replay(&events);
            let task = match id {
                Some(id) => active_task(&state, id)?,
                None => graph::next_task(&state).ok_or(LedgerError::NothingToSelect("ready pending"))?,
            };
            require(task, "done", TaskStatus::Pending)?;
            let id = task.id.clone();
            tracing::info!(id = %id, "task done");
            Ok((
                vec![Event::Done(MarkData {
                    id: id.clone(),
                    at: Some(Utc::now()),
                    extra: Extra::new(),
                })],
                id,
            ))
        })
    }

    /// Accept a done task. Without an id, the oldest done task is used.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TaskNotFound`] (accepted tasks are no longer
    /// active), [`LedgerError::InvalidTransition`] for a pending task, or
    /// [`LedgerError::NothingToSelect`].
    pub fn accept(&self, id: Option<&TaskId>) -> Result<TaskId, LedgerError> {
        self.log.transact(|events| {
            let state = replay(&events);
            let task = review_target(&state, id)?;
            require(task, "accept", TaskStatus::Done)?;
            let id = task.id.clone();
            tracing::info!(id = %id, "task accepted");
            Ok((
                vec![Event::Accept(MarkData {
                    id: id.clone(),
                    at: Some(Utc::now()),
                    extra: Extra::new(),
                })],
                id,
            ))
        })
    }

    /// Send a done task back to pending with a reason.
    ///
    /// # Errors
    ///
    /// Same as [`Ledger::accept`].
    pub fn reject(&self, id: Option<&TaskId>, reason: &str) -> Result<TaskId, LedgerError> {
        self.log.transact(|events| {
            let state = replay(&events);
            let task = review_target(&state, id)?;
            require(task, "reject", TaskStatus::Done)?;
            let id = task.id.clone();
            let threshold = self.effective_config(&state).max_rejections;
            if threshold > 0 && task.reject_count + 1 >= threshold {
                tracing::warn!(id = %id, rejections = task.reject_count + 1, "task escalated");
            } else {
                tracing::info!(id = %id, "task rejected");
            }
            Ok((
                vec![Event::Reject(RejectData {
                    id: id.clone(),
                    reason: reason.to_string(),
                    at: Some(Utc::now()),
                    extra: Extra::new(),
                })],
                id,
            ))
        })
    }

    /// Remove a task outright. Dependents lose the dep in the same batch.
    ///
    /// Returns the ids of the dependents that were rewired.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TaskNotFound`] if the task is not active.
    pub fn delete_task(&self, id: &TaskId) -> Result<Vec<TaskId>, LedgerError> {
        self.log.transact(|events| {
            let state = replay(&events);
            active_task(&state, id)?;

            let mut out = Vec::new();
            let mut rewired = Vec::new();
            for dependent in state.dependents_of(id) {
                let mut patch = TaskPatchData::new(dependent.id.clone());
                patch.deps = Some(dependent.deps.iter().filter(|d| *d != id).cloned().collect());
                out.push(Event::TaskPatch(patch));
                rewired.push(dependent.id.clone());
            }
            out.push(Event::Delete(DeleteData {
                id: id.clone(),
                extra: Extra::new(),
            }));
            tracing::info!(id = %id, dependents = rewired.len(), "task deleted");
            Ok((out, rewired))
        })
    }

    /// # Errors
    ///
    /// Returns [`LedgerError::TaskNotFound`] if the task is not active.
    pub fn prioritize(&self, id: &TaskId, priority: Priority) -> Result<(), LedgerError> {
        self.log.transact(|events| {
            let state = replay(&events);
            active_task(&state, id)?;
            Ok((
                vec![Event::Prioritize(PrioritizeData {
                    id: id.clone(),
                    priority,
                    extra: Extra::new(),
                })],
                (),
            ))
        })
    }

    /// Record that the driver killed the last attempt at `id`.
    ///
    /// An empty reason clears the flag.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TaskNotFound`] if the task is not active.
    pub fn mark_killed(&self, id: &TaskId, reason: &str) -> Result<(), LedgerError> {
        self.patch(id, |patch| patch.kill_reason = Some(reason.trim().to_string()))
    }

    /// Attach structured research findings to a task. `null` clears them.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TaskNotFound`] if the task is not active.
    pub fn attach_research(&self, id: &TaskId, research: Value) -> Result<(), LedgerError> {
        self.patch(id, move |patch| patch.research = Some(research))
    }

    fn patch<F>(&self, id: &TaskId, fill: F) -> Result<(), LedgerError>
    where
        F: FnOnce(&mut TaskPatchData),
    {
        self.log.transact(|events| {
            let state = replay(&events);
            active_task(&state, id)?;
            let mut patch = TaskPatchData::new(id.clone());
            fill(&mut patch);
            Ok((vec![Event::TaskPatch(patch)], ()))
        })
    }

    /// Replace `id` with smaller children in one batch.
    ///
    /// Children inherit the parent's spec and deps, record `parent`, and sit
    /// one decomposition level deeper. Tasks that depended on the parent are
    /// rewired to depend on every child. Children are validated with
    /// `strict = false`. Returns the child ids in draft order.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MaxDecomposeDepthExceeded`] if the parent is
    /// already at the depth limit (the parent is left untouched),
    /// [`LedgerError::ValidationFailed`] for bad children, dependency errors,
    /// or [`LedgerError::TaskNotFound`].
    pub fn decompose(&self, id: &TaskId, drafts: Vec<TaskDraft>) -> Result<Vec<TaskId>, LedgerError> {
        self.log.transact(|events| {
            let state = replay(&events);
            let parent = active_task(&state, id)?;
            let config = self.effective_config(&state);

            if parent.decompose_depth >= config.max_decompose_depth {
                return Err(LedgerError::MaxDecomposeDepthExceeded {
                    id: id.clone(),
                    depth: parent.decompose_depth,
                    max: config.max_decompose_depth,
                });
            }
            if drafts.is_empty() {
                return Err(LedgerError::InvalidTransition {
                    id: id.clone(),
                    op: "decompose",
                    status: parent.status.as_str(),
                    required: "at least one child",
                });
            }

            let relaxed = ValidationOptions {
                strict: false,
                ..config.validation
            };
            let violations: Vec<Violation> = drafts
                .iter()
                .enumerate()
                .flat_map(|(i, draft)| {
                    validate::check_task(draft.content(), &relaxed)
                        .into_iter()
                        .map(move |mut v| {
                            v.field = format!("children[{i}].{}", v.field);
                            v
                        })
                })
                .collect();
            reject_violations(violations)?;

            let mut taken: HashSet<String> = HashSet::new();
            let mut children = Vec::with_capacity(drafts.len());
            for draft in drafts {
                let child_id = TaskId::generate(&format!("{id}|{}", draft.name), |c| {
                    state.is_known_id(c) || taken.contains(c)
                });
                taken.insert(child_id.as_str().to_string());

                let mut deps: BTreeSet<TaskId> = parent.deps.clone();
                deps.extend(draft.deps.into_iter().filter(|d| d != id));
                children.push(TaskData {
                    id: child_id,
                    spec: parent.spec.clone(),
                    name: draft.name,
                    notes: draft.notes,
                    accept: draft.accept,
                    deps: deps.into_iter().collect(),
                    priority: draft.priority.unwrap_or(parent.priority),
                    status: TaskStatus::Pending,
                    created_from: parent.created_from.clone(),
                    parent: Some(id.clone()),
                    research: draft.research,
                    decompose_depth: parent.decompose_depth + 1,
                    extra: Extra::new(),
                });
            }
            let child_ids: Vec<TaskId> = children.iter().map(|c| c.id.clone()).collect();

            let mut patches = Vec::new();
            for dependent in state.dependents_of(id) {
                let mut deps: BTreeSet<TaskId> = dependent.deps.clone();
                deps.remove(id);
                deps.extend(child_ids.iter().cloned());
                let mut patch = TaskPatchData::new(dependent.id.clone());
                patch.deps = Some(deps.into_iter().collect());
                patches.push(patch);
            }

            let proposals: Vec<Proposal> = children
                .iter()
                .map(|c| Proposal::new(c.id.clone(), c.deps.clone()))
                .chain(patches.iter().map(|p| {
                    Proposal::new(p.id.clone(), p.deps.clone().unwrap_or_default())
                }))
                .collect();
            graph::validate_dependencies(&state, &proposals, std::slice::from_ref(id))?;

            let mut out: Vec<Event> = children.into_iter().map(Event::Task).collect();
            out.extend(patches.into_iter().map(Event::TaskPatch));
            out.push(Event::Delete(DeleteData {
                id: id.clone(),
                extra: Extra::new(),
            }));
            tracing::info!(id = %id, children = child_ids.len(), "task decomposed");
            Ok((out, child_ids))
        })
    }

    /// Validate and record an open issue.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ValidationFailed`] or a write error.
    pub fn add_issue(&self, draft: IssueDraft) -> Result<IssueId, LedgerError> {
        self.log.transact(|events| {
            let state = replay(&events);
            let opts = self.effective_config(&state).validation;
            reject_violations(validate::check_issue(
                IssueContent {
                    description: &draft.description,
                },
                &opts,
            ))?;

            let id = IssueId::generate(&draft.description, |c| state.is_known_id(c));
            let spec = draft.spec.or_else(|| state.spec.clone());
            tracing::info!(id = %id, priority = %draft.priority, "issue recorded");
            Ok((
                vec![Event::Issue(IssueData {
                    id: id.clone(),
                    desc: draft.description,
                    priority: draft.priority,
                    spec,
                    extra: Extra::new(),
                })],
                id,
            ))
        })
    }

    /// Mark one issue fixed, or every open issue when `id` is `None`.
    ///
    /// Returns how many issues changed state. Nothing is appended when that
    /// number is zero.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::IssueNotFound`] for an unknown id.
    pub fn resolve_issues(&self, id: Option<&IssueId>) -> Result<usize, LedgerError> {
        self.log.transact(|events| {
            let state = replay(&events);
            let count = match id {
                Some(id) => {
                    let issue = state
                        .issue(id)
                        .ok_or_else(|| LedgerError::IssueNotFound(id.clone()))?;
                    usize::from(issue.is_open())
                }
                None => state.open_issues().len(),
            };
            if count == 0 {
                return Ok((vec![], 0));
            }
            tracing::info!(count, "issues resolved");
            Ok((
                vec![Event::IssueDone(IssueDoneData {
                    id: id.cloned(),
                    extra: Extra::new(),
                })],
                count,
            ))
        })
    }

    /// Select the active spec file.
    ///
    /// # Errors
    ///
    /// Returns a write error.
    pub fn set_spec(&self, spec: &str) -> Result<(), LedgerError> {
        self.log.append(&Event::Spec(SpecData {
            spec: spec.to_string(),
            extra: Extra::new(),
        }))?;
        tracing::info!(spec, "spec selected");
        Ok(())
    }

    /// Record configuration overrides. An empty map records nothing.
    ///
    /// Every key is checked first; nothing is recorded if any is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Config`] for an unknown key or a value of the
    /// wrong type, or a write error.
    pub fn set_config(&self, values: BTreeMap<String, Value>) -> Result<(), LedgerError> {
        if values.is_empty() {
            return Ok(());
        }
        for (key, value) in &values {
            LedgerConfig::check_override(key, value)?;
        }
        self.log.append(&Event::Config(ConfigData { values }))
    }
}

fn reject_violations(violations: Vec<Violation>) -> Result<(), LedgerError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(LedgerError::ValidationFailed(violations))
    }
}

fn active_task<'s>(state: &'s LedgerState, id: &TaskId) -> Result<&'s Task, LedgerError> {
    state
        .task(id)
        .ok_or_else(|| LedgerError::TaskNotFound(id.clone()))
}

fn review_target<'s>(state: &'s LedgerState, id: Option<&TaskId>) -> Result<&'s Task, LedgerError> {
    match id {
        Some(id) => active_task(state, id),
        None => graph::first_done(state).ok_or(LedgerError::NothingToSelect("done")),
    }
}

fn require(task: &Task, op: &'static str, status: TaskStatus) -> Result<(), LedgerError> {
    if task.status == status {
        Ok(())
    } else {
        Err(LedgerError::InvalidTransition {
            id: task.id.clone(),
            op,
            status: task.status.as_str(),
            required: status.as_str(),
        })
    }
}

fn dedup(deps: Vec<TaskId>) -> Vec<TaskId> {
    deps.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}
