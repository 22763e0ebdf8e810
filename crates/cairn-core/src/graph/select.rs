//! Choosing the next unit of work.
//!
//! A task is *ready* when every dependency has been accepted. Among ready
//! pending tasks the selector takes the highest priority and breaks ties by
//! creation order, so two readers of the same ledger always pick the same
//! task.

use crate::model::{Task, TaskId};
use crate::replay::LedgerState;

/// A pending task that cannot start yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocked<'a> {
    pub task: &'a Task,
    /// Deps that are not accepted yet, in id order.
    pub waiting_on: Vec<&'a TaskId>,
}

/// Whether every dependency of `task` is an accepted tombstone.
#[must_use]
pub fn is_ready(task: &Task, state: &LedgerState) -> bool {
    task.deps.iter().all(|dep| state.is_accepted(dep))
}

/// Ready pending tasks in selection order.
#[must_use]
pub fn ready(state: &LedgerState) -> Vec<&Task> {
    let mut ready: Vec<&Task> = state
        .pending()
        .into_iter()
        .filter(|t| is_ready(t, state))
        .collect();
    ready.sort_by_key(|t| (t.priority.rank(), t.seq));
    ready
}

/// The task to work on next, or `None` if nothing is ready.
#[must_use]
pub fn next_task(state: &LedgerState) -> Option<&Task> {
    state
        .pending()
        .into_iter()
        .filter(|t| is_ready(t, state))
        .min_by_key(|t| (t.priority.rank(), t.seq))
}

/// The oldest done task, the default target of accept and reject.
#[must_use]
pub fn first_done(state: &LedgerState) -> Option<&Task> {
    state.done().into_iter().next()
}

/// Pending tasks that are waiting on unaccepted deps.
#[must_use]
pub fn blocked(state: &LedgerState) -> Vec<Blocked<'_>> {
    state
        .pending()
        .into_iter()
        .filter_map(|task| {
            let waiting_on: Vec<&TaskId> = task
                .deps
                .iter()
                .filter(|dep| !state.is_accepted(dep))
                .collect();
            (!waiting_on.is_empty()).then_some(Blocked { task, waiting_on })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, Extra, MarkData, TaskData};
    use crate::model::{Priority, TaskStatus};
    use crate::replay::replay;

    fn tid(raw: &str) -> TaskId {
        TaskId::new_unchecked(raw)
    }

    fn task(id: &str, priority: Priority, deps: &[&str]) -> Event {
        Event::Task(TaskData {
            id: tid(id),
            spec: "spec.md".into(),
            name: format!("Task {id}"),
            notes: String::new(),
            accept: String::new(),
            deps: deps.iter().map(|d| tid(d)).collect(),
            priority,
            status: TaskStatus::Pending,
            created_from: None,
            parent: None,
            research: None,
            decompose_depth: 0,
            extra: Extra::new(),
        })
    }

    fn mark(id: &str) -> MarkData {
        MarkData {
            id: tid(id),
            at: None,
            extra: Extra::new(),
        }
    }

    #[test]
    fn empty_state_has_no_next_task() {
        let state = replay(std::iter::empty());
        assert!(next_task(&state).is_none());
        assert!(first_done(&state).is_none());
    }

    #[test]
    fn higher_priority_wins() {
        let state = replay(&[
            task("t-low", Priority::Low, &[]),
            task("t-high", Priority::High, &[]),
            task("t-med", Priority::Medium, &[]),
        ]);
        assert_eq!(next_task(&state).map(|t| t.id.as_str()), Some("t-high"));
        let order: Vec<&str> = ready(&state).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(order, ["t-high", "t-med", "t-low"]);
    }

    #[test]
    fn ties_go_to_the_older_task() {
        let state = replay(&[
            task("t-zz", Priority::Medium, &[]),
            task("t-aa", Priority::Medium, &[]),
        ]);
        assert_eq!(next_task(&state).map(|t| t.id.as_str()), Some("t-zz"));
    }

    #[test]
    fn tasks_wait_for_accepted_deps() {
        let events = vec![
            task("t-1", Priority::Low, &[]),
            task("t-2", Priority::High, &["t-1"]),
        ];
        let state = replay(&events);
        assert_eq!(next_task(&state).map(|t| t.id.as_str()), Some("t-1"));

        let blocked = blocked(&state);
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].task.id.as_str(), "t-2");
        assert_eq!(blocked[0].waiting_on, vec![&tid("t-1")]);

        let mut events = events;
        events.push(Event::Done(mark("t-1")));
        let state = replay(&events);
        assert!(next_task(&state).is_none(), "done is not accepted");
        assert_eq!(first_done(&state).map(|t| t.id.as_str()), Some("t-1"));

        events.push(Event::Accept(mark("t-1")));
        let state = replay(&events);
        assert_eq!(next_task(&state).map(|t| t.id.as_str()), Some("t-2"));
        assert!(super::blocked(&state).is_empty());
    }

    #[test]
    fn done_tasks_are_never_selected() {
        let state = replay(&[task("t-1", Priority::High, &[]), Event::Done(mark("t-1"))]);
        assert!(next_task(&state).is_none());
    }
}
