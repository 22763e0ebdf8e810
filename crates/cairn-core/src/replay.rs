//! Replay: fold the event sequence into a [`LedgerState`].
//!
//! Replay is a pure left-to-right fold. It never fails; events that make no
//! sense against the current state (patching a task that is gone, accepting
//! twice) are logged at `debug` or `warn` and skipped, so that any ledger a
//! writer could produce replays to *some* state. The same sequence always
//! yields an equal state.
//!
//! The state is rebuilt on every read and never persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::event::{Event, IssueData, MarkData, RejectData, TaskData, TaskPatchData};
use crate::model::{Issue, IssueId, IssueStatus, Task, TaskId, TaskStatus};

/// A record of a task that left the active set through review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tombstone {
    pub id: TaskId,
    pub name: String,
    /// Rejection reason; always `None` for accepted tombstones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
}

/// Review history. Accepted entries are terminal; rejected entries are
/// cumulative and the task itself lives on as pending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tombstones {
    pub accepted: Vec<Tombstone>,
    pub rejected: Vec<Tombstone>,
}

/// Everything the ledger currently says.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    /// Active spec file, `None` until a `spec` event is seen.
    pub spec: Option<String>,
    /// Merged `config` events, last writer wins per key.
    pub config: BTreeMap<String, Value>,
    pub tombstones: Tombstones,
    tasks: HashMap<TaskId, Task>,
    issues: HashMap<IssueId, Issue>,
    accepted: HashSet<TaskId>,
    deleted: HashSet<TaskId>,
    seen: HashSet<String>,
    next_seq: u64,
    applied: usize,
}

/// Replay `events` from an empty state.
pub fn replay<'a, I>(events: I) -> LedgerState
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut state = LedgerState::default();
    for event in events {
        state.apply(event);
    }
    state
}

impl LedgerState {
    /// Apply one event.
    pub fn apply(&mut self, event: &Event) {
        self.applied += 1;
        if let Some(id) = event.task_id() {
            self.seen.insert(id.as_str().to_string());
        }

        match event {
            Event::Config(d) => {
                for (key, value) in &d.values {
                    self.config.insert(key.clone(), value.clone());
                }
            }
            Event::Spec(d) => self.spec = Some(d.spec.clone()),
            Event::Task(d) => self.create_task(d),
            Event::TaskPatch(d) => self.patch_task(d),
            Event::Done(d) => self.mark_done(d),
            Event::Accept(d) => self.accept(d),
            Event::Reject(d) => self.reject(d),
            Event::Delete(d) => {
                if self.tasks.remove(&d.id).is_none() {
                    tracing::debug!(id = %d.id, "delete of inactive task");
                }
                if !self.accepted.contains(&d.id) {
                    self.deleted.insert(d.id.clone());
                }
            }
            Event::Prioritize(d) => match self.tasks.get_mut(&d.id) {
                Some(task) => task.priority = d.priority,
                None => tracing::debug!(id = %d.id, "prioritize of inactive task ignored"),
            },
            Event::Issue(d) => self.create_issue(d),
            Event::IssueDone(d) => match &d.id {
                Some(id) => match self.issues.get_mut(id) {
                    Some(issue) => issue.status = IssueStatus::Fixed,
                    None => tracing::debug!(id = %id, "issue_done for unknown issue ignored"),
                },
                None => {
                    for issue in self.issues.values_mut() {
                        issue.status = IssueStatus::Fixed;
                    }
                }
            },
            Event::Unknown(u) => {
                tracing::debug!(kind = %u.kind, "ignoring event of unknown kind");
            }
        }
    }

    fn create_task(&mut self, d: &TaskData) {
        if self.tasks.contains_key(&d.id) || self.accepted.contains(&d.id) || self.deleted.contains(&d.id)
        {
            tracing::warn!(id = %d.id, "duplicate task id; later create ignored");
            return;
        }
        let seq = self.bump_seq();
        self.tasks.insert(
            d.id.clone(),
            Task {
                id: d.id.clone(),
                spec: d.spec.clone(),
                name: d.name.clone(),
                notes: d.notes.clone(),
                accept: d.accept.clone(),
                deps: d.deps.iter().cloned().collect(),
                priority: d.priority,
                status: d.status,
                reject_reason: None,
                reject_count: 0,
                done_at: None,
                created_from: d.created_from.clone(),
                parent: d.parent.clone(),
                research: d.research.clone().filter(|r| !r.is_null()),
                kill_reason: None,
                decompose_depth: d.decompose_depth,
                seq,
            },
        );
    }

    fn patch_task(&mut self, d: &TaskPatchData) {
        let Some(task) = self.tasks.get_mut(&d.id) else {
            tracing::warn!(id = %d.id, "patch for inactive task ignored");
            return;
        };
        if let Some(reason) = &d.kill_reason {
            // An empty reason clears the flag.
            task.kill_reason = (!reason.is_empty()).then(|| reason.clone());
        }
        if let Some(deps) = &d.deps {
            task.deps = deps.iter().cloned().collect::<BTreeSet<_>>();
        }
        if let Some(notes) = &d.notes {
            task.notes.clone_from(notes);
        }
        if let Some(research) = &d.research {
            // A recorded null clears earlier findings.
            task.research = (!research.is_null()).then(|| research.clone());
        }
    }

    fn mark_done(&mut self, d: &MarkData) {
        match self.tasks.get_mut(&d.id) {
            Some(task) if task.is_pending() => {
                task.status = TaskStatus::Done;
                task.done_at = d.at;
                task.kill_reason = None;
            }
            Some(_) => tracing::debug!(id = %d.id, "done for task already done"),
            None => tracing::debug!(id = %d.id, "done for inactive task ignored"),
        }
    }

    fn accept(&mut self, d: &MarkData) {
        let Some(task) = self.tasks.remove(&d.id) else {
            tracing::debug!(id = %d.id, "accept for inactive task ignored");
            return;
        };
        self.accepted.insert(task.id.clone());
        self.tombstones.accepted.push(Tombstone {
            id: task.id,
            name: task.name,
            reason: None,
            at: d.at,
        });
    }

    fn reject(&mut self, d: &RejectData) {
        let Some(task) = self.tasks.get_mut(&d.id) else {
            tracing::debug!(id = %d.id, "reject for inactive task ignored");
            return;
        };
        task.status = TaskStatus::Pending;
        task.done_at = None;
        task.reject_reason = Some(d.reason.clone());
        task.reject_count += 1;
        self.tombstones.rejected.push(Tombstone {
            id: task.id.clone(),
            name: task.name.clone(),
            reason: Some(d.reason.clone()),
            at: d.at,
        });
    }

    fn create_issue(&mut self, d: &IssueData) {
        self.seen.insert(d.id.as_str().to_string());
        if self.issues.contains_key(&d.id) {
            tracing::warn!(id = %d.id, "duplicate issue id; later issue ignored");
            return;
        }
        let seq = self.bump_seq();
        self.issues.insert(
            d.id.clone(),
            Issue {
                id: d.id.clone(),
                description: d.desc.clone(),
                priority: d.priority,
                status: IssueStatus::Open,
                spec: d.spec.clone(),
                seq,
            },
        );
    }

    const fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Number of events folded into this state, unknown kinds included.
    #[must_use]
    pub const fn events_applied(&self) -> usize {
        self.applied
    }

    /// An active (pending or done) task.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    #[must_use]
    pub fn issue(&self, id: &IssueId) -> Option<&Issue> {
        self.issues.get(id)
    }

    /// Every active task in creation order.
    #[must_use]
    pub fn tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().collect();
        tasks.sort_by_key(|t| t.seq);
        tasks
    }

    /// Pending tasks in creation order.
    #[must_use]
    pub fn pending(&self) -> Vec<&Task> {
        self.tasks().into_iter().filter(|t| t.is_pending()).collect()
    }

    /// Done tasks awaiting review, in creation order.
    #[must_use]
    pub fn done(&self) -> Vec<&Task> {
        self.tasks().into_iter().filter(|t| t.is_done()).collect()
    }

    /// Active tasks the driver flagged for decomposition.
    #[must_use]
    pub fn killed(&self) -> Vec<&Task> {
        self.tasks()
            .into_iter()
            .filter(|t| t.needs_decomposition())
            .collect()
    }

    /// Every tracked issue in creation order.
    #[must_use]
    pub fn issues(&self) -> Vec<&Issue> {
        let mut issues: Vec<&Issue> = self.issues.values().collect();
        issues.sort_by_key(|i| i.seq);
        issues
    }

    #[must_use]
    pub fn open_issues(&self) -> Vec<&Issue> {
        self.issues().into_iter().filter(|i| i.is_open()).collect()
    }

    /// Tasks rejected at least `threshold` times.
    #[must_use]
    pub fn escalations(&self, threshold: u32) -> Vec<&Task> {
        self.tasks()
            .into_iter()
            .filter(|t| threshold > 0 && t.reject_count >= threshold)
            .collect()
    }

    #[must_use]
    pub fn is_active(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    #[must_use]
    pub fn is_accepted(&self, id: &TaskId) -> bool {
        self.accepted.contains(id)
    }

    /// Deleted without ever being accepted.
    #[must_use]
    pub fn is_deleted(&self, id: &TaskId) -> bool {
        self.deleted.contains(id)
    }

    /// Whether `raw` has appeared anywhere in the log as a task or issue id.
    #[must_use]
    pub fn is_known_id(&self, raw: &str) -> bool {
        self.seen.contains(raw)
    }

    /// Active tasks that list `id` among their deps, in creation order.
    #[must_use]
    pub fn dependents_of(&self, id: &TaskId) -> Vec<&Task> {
        self.tasks()
            .into_iter()
            .filter(|t| t.deps.contains(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{
        ConfigData, DeleteData, Extra, IssueDoneData, PrioritizeData, SpecData, UnknownEvent,
    };
    use crate::model::Priority;
    use chrono::TimeZone;
    use serde_json::json;

    fn tid(raw: &str) -> TaskId {
        TaskId::new_unchecked(raw)
    }

    fn task(id: &str, deps: &[&str]) -> Event {
        Event::Task(TaskData {
            id: tid(id),
            spec: "spec.md".into(),
            name: format!("Task {id}"),
            notes: String::new(),
            accept: String::new(),
            deps: deps.iter().map(|d| tid(d)).collect(),
            priority: Priority::Medium,
            status: TaskStatus::Pending,
            created_from: None,
            parent: None,
            research: None,
            decompose_depth: 0,
            extra: Extra::new(),
        })
    }

    fn done(id: &str) -> Event {
        Event::Done(MarkData {
            id: tid(id),
            at: Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).single(),
            extra: Extra::new(),
        })
    }

    fn accept(id: &str) -> Event {
        Event::Accept(MarkData {
            id: tid(id),
            at: None,
            extra: Extra::new(),
        })
    }

    fn reject(id: &str, reason: &str) -> Event {
        Event::Reject(RejectData {
            id: tid(id),
            reason: reason.into(),
            at: None,
            extra: Extra::new(),
        })
    }

    fn delete(id: &str) -> Event {
        Event::Delete(DeleteData {
            id: tid(id),
            extra: Extra::new(),
        })
    }

    fn issue(id: &str) -> Event {
        Event::Issue(IssueData {
            id: IssueId::new_unchecked(id),
            desc: "tests fail on main".into(),
            priority: Priority::High,
            spec: None,
            extra: Extra::new(),
        })
    }

    #[test]
    fn empty_log_is_empty_state() {
        let state = replay(std::iter::empty());
        assert!(state.spec.is_none());
        assert!(state.tasks().is_empty());
        assert_eq!(state.events_applied(), 0);
    }

    #[test]
    fn replay_is_deterministic() {
        let events = vec![
            Event::Spec(SpecData {
                spec: "spec.md".into(),
                extra: Extra::new(),
            }),
            task("t-1", &[]),
            task("t-2", &["t-1"]),
            done("t-1"),
            accept("t-1"),
            issue("i-1"),
        ];
        assert_eq!(replay(&events), replay(&events));
    }

    #[test]
    fn tasks_keep_creation_order() {
        let state = replay(&[task("t-b", &[]), task("t-a", &[]), task("t-c", &[])]);
        let ids: Vec<&str> = state.tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["t-b", "t-a", "t-c"]);
    }

    #[test]
    fn done_moves_pending_to_done_with_timestamp() {
        let state = replay(&[task("t-1", &[]), done("t-1")]);
        let t = state.task(&tid("t-1")).unwrap();
        assert!(t.is_done());
        assert!(t.done_at.is_some());
        assert!(state.pending().is_empty());
        assert_eq!(state.done().len(), 1);
    }

    #[test]
    fn accept_removes_task_and_adds_one_tombstone() {
        let state = replay(&[task("t-1", &[]), done("t-1"), accept("t-1"), accept("t-1")]);
        assert!(state.task(&tid("t-1")).is_none());
        assert!(state.is_accepted(&tid("t-1")));
        assert_eq!(state.tombstones.accepted.len(), 1);
        assert_eq!(state.tombstones.accepted[0].name, "Task t-1");
    }

    #[test]
    fn reject_returns_to_pending_and_counts() {
        let state = replay(&[
            task("t-1", &[]),
            done("t-1"),
            reject("t-1", "tests fail"),
            done("t-1"),
            reject("t-1", "still failing"),
        ]);
        let t = state.task(&tid("t-1")).unwrap();
        assert!(t.is_pending());
        assert_eq!(t.reject_count, 2);
        assert_eq!(t.reject_reason.as_deref(), Some("still failing"));
        assert!(t.done_at.is_none());
        assert_eq!(state.tombstones.rejected.len(), 2);
        assert_eq!(state.escalations(2).len(), 1);
        assert!(state.escalations(3).is_empty());
    }

    #[test]
    fn delete_removes_without_tombstone() {
        let state = replay(&[task("t-1", &[]), delete("t-1")]);
        assert!(state.tasks().is_empty());
        assert!(state.is_deleted(&tid("t-1")));
        assert!(state.tombstones.accepted.is_empty());
        assert!(state.is_known_id("t-1"));
    }

    #[test]
    fn deleting_an_accepted_id_keeps_it_accepted() {
        let state = replay(&[task("t-1", &[]), done("t-1"), accept("t-1"), delete("t-1")]);
        assert!(state.is_accepted(&tid("t-1")));
        assert!(!state.is_deleted(&tid("t-1")));
    }

    #[test]
    fn duplicate_create_is_ignored() {
        let mut dup = task("t-1", &[]);
        if let Event::Task(ref mut d) = dup {
            d.name = "Impostor".into();
        }
        let state = replay(&[task("t-1", &[]), dup]);
        assert_eq!(state.tasks().len(), 1);
        assert_eq!(state.task(&tid("t-1")).unwrap().name, "Task t-1");
    }

    #[test]
    fn patch_sets_and_clears_kill_reason() {
        let mut kill = TaskPatchData::new(tid("t-1"));
        kill.kill_reason = Some("context limit".into());
        let mut clear = TaskPatchData::new(tid("t-1"));
        clear.kill_reason = Some(String::new());

        let killed = replay(&[task("t-1", &[]), Event::TaskPatch(kill.clone())]);
        assert_eq!(killed.killed().len(), 1);

        let cleared = replay(&[task("t-1", &[]), Event::TaskPatch(kill), Event::TaskPatch(clear)]);
        assert!(cleared.killed().is_empty());
    }

    #[test]
    fn patch_replaces_deps_and_research() {
        let mut patch = TaskPatchData::new(tid("t-2"));
        patch.deps = Some(vec![]);
        patch.research = Some(json!({"files": ["src/lib.rs"]}));
        let state = replay(&[task("t-1", &[]), task("t-2", &["t-1"]), Event::TaskPatch(patch)]);
        let t = state.task(&tid("t-2")).unwrap();
        assert!(t.deps.is_empty());
        assert_eq!(t.research, Some(json!({"files": ["src/lib.rs"]})));
    }

    #[test]
    fn null_research_patch_clears_findings() {
        let mut attach = TaskPatchData::new(tid("t-1"));
        attach.research = Some(json!({"files": ["src/lib.rs"]}));
        let mut clear = TaskPatchData::new(tid("t-1"));
        clear.research = Some(serde_json::Value::Null);
        let state = replay(&[task("t-1", &[]), Event::TaskPatch(attach), Event::TaskPatch(clear)]);
        assert_eq!(state.task(&tid("t-1")).unwrap().research, None);
    }

    #[test]
    fn patch_for_missing_task_is_ignored() {
        let mut patch = TaskPatchData::new(tid("t-9"));
        patch.notes = Some("n".into());
        let state = replay(&[Event::TaskPatch(patch)]);
        assert!(state.tasks().is_empty());
    }

    #[test]
    fn prioritize_updates_active_task() {
        let state = replay(&[
            task("t-1", &[]),
            Event::Prioritize(PrioritizeData {
                id: tid("t-1"),
                priority: Priority::High,
                extra: Extra::new(),
            }),
        ]);
        assert_eq!(state.task(&tid("t-1")).unwrap().priority, Priority::High);
    }

    #[test]
    fn issue_done_without_id_fixes_all() {
        let state = replay(&[
            issue("i-1"),
            issue("i-2"),
            Event::IssueDone(IssueDoneData {
                id: None,
                extra: Extra::new(),
            }),
        ]);
        assert_eq!(state.issues().len(), 2);
        assert!(state.open_issues().is_empty());
    }

    #[test]
    fn issue_done_with_id_fixes_one() {
        let state = replay(&[
            issue("i-1"),
            issue("i-2"),
            Event::IssueDone(IssueDoneData {
                id: Some(IssueId::new_unchecked("i-1")),
                extra: Extra::new(),
            }),
        ]);
        let open: Vec<&str> = state.open_issues().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(open, ["i-2"]);
        assert!(state.is_known_id("i-1"));
    }

    #[test]
    fn config_merges_last_writer_wins() {
        let mut first = BTreeMap::new();
        first.insert("max_rejections".to_string(), json!(5));
        first.insert("strict".to_string(), json!(true));
        let mut second = BTreeMap::new();
        second.insert("strict".to_string(), json!(false));

        let state = replay(&[
            Event::Config(ConfigData { values: first }),
            Event::Config(ConfigData { values: second }),
        ]);
        assert_eq!(state.config.get("max_rejections"), Some(&json!(5)));
        assert_eq!(state.config.get("strict"), Some(&json!(false)));
    }

    #[test]
    fn unknown_events_are_counted_but_ignored() {
        let state = replay(&[
            task("t-1", &[]),
            Event::Unknown(UnknownEvent {
                kind: "archive".into(),
                fields: serde_json::Map::new(),
            }),
        ]);
        assert_eq!(state.events_applied(), 2);
        assert_eq!(state.tasks().len(), 1);
    }

    #[test]
    fn dependents_are_found_by_dep() {
        let state = replay(&[task("t-1", &[]), task("t-2", &["t-1"]), task("t-3", &["t-1"])]);
        let ids: Vec<&str> = state
            .dependents_of(&tid("t-1"))
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, ["t-2", "t-3"]);
    }
}
