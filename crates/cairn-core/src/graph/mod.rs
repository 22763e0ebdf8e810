//! The task dependency graph.
//!
//! ## Submodules
//!
//! - [`cycles`]: adjacency over the active set and DFS cycle detection.
//! - [`select`]: readiness and next-task selection.
//!
//! [`validate_dependencies`] is the gate every task creation and dependency
//! rewrite passes before it is appended.

pub mod cycles;
pub mod select;

pub use cycles::DepGraph;
pub use select::{Blocked, blocked, first_done, is_ready, next_task, ready};

use std::collections::HashSet;

use crate::error::LedgerError;
use crate::model::TaskId;
use crate::replay::LedgerState;

/// A task whose deps are about to be set, by creation or by patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub id: TaskId,
    pub deps: Vec<TaskId>,
}

impl Proposal {
    pub fn new(id: TaskId, deps: impl IntoIterator<Item = TaskId>) -> Self {
        Self {
            id,
            deps: deps.into_iter().collect(),
        }
    }
}

/// Check that `proposed` can be applied on top of `state`.
///
/// Every dep must be an active task, an accepted tombstone, or another
/// proposal in the same batch. The active graph with the proposals applied
/// (and `removed` dropped) must stay acyclic.
///
/// # Errors
///
/// Returns [`LedgerError::DanglingDependency`] for a dep that was never
/// recorded or was deleted without being accepted, and
/// [`LedgerError::CyclicDependency`] with the offending path for a cycle,
/// self-dependencies included.
pub fn validate_dependencies(
    state: &LedgerState,
    proposed: &[Proposal],
    removed: &[TaskId],
) -> Result<(), LedgerError> {
    let batch: HashSet<&TaskId> = proposed.iter().map(|p| &p.id).collect();
    let gone: HashSet<&TaskId> = removed.iter().collect();

    for p in proposed {
        for dep in &p.deps {
            if *dep == p.id {
                return Err(LedgerError::CyclicDependency {
                    cycle: vec![p.id.clone(), p.id.clone()],
                });
            }
            let resolves = batch.contains(dep)
                || state.is_accepted(dep)
                || (state.is_active(dep) && !gone.contains(dep));
            if !resolves {
                return Err(LedgerError::DanglingDependency {
                    task: p.id.clone(),
                    dep: dep.clone(),
                    deleted: state.is_deleted(dep) || gone.contains(dep),
                });
            }
        }
    }

    let mut graph = DepGraph::from_state(state);
    for id in removed {
        graph.remove(id);
    }
    for p in proposed {
        graph.set_deps(p.id.clone(), p.deps.iter().cloned());
    }
    for p in proposed {
        if let Some(cycle) = graph.find_cycle_from(&p.id) {
            return Err(LedgerError::CyclicDependency { cycle });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DeleteData, Event, Extra, MarkData, TaskData};
    use crate::model::{Priority, TaskStatus};
    use crate::replay::replay;

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

    fn proposal(id: &str, deps: &[&str]) -> Proposal {
        Proposal::new(tid(id), deps.iter().map(|d| tid(d)))
    }

    #[test]
    fn deps_on_active_and_accepted_tasks_resolve() {
        let state = replay(&[
            task("t-1", &[]),
            task("t-2", &[]),
            Event::Done(MarkData {
                id: tid("t-2"),
                at: None,
                extra: Extra::new(),
            }),
            Event::Accept(MarkData {
                id: tid("t-2"),
                at: None,
                extra: Extra::new(),
            }),
        ]);
        validate_dependencies(&state, &[proposal("t-3", &["t-1", "t-2"])], &[]).unwrap();
    }

    #[test]
    fn never_seen_dep_is_dangling() {
        let state = replay(&[task("t-1", &[])]);
        let err = validate_dependencies(&state, &[proposal("t-2", &["t-ghost"])], &[]).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::DanglingDependency { ref dep, deleted: false, .. } if dep.as_str() == "t-ghost"
        ));
    }

    #[test]
    fn deleted_dep_is_dangling() {
        let state = replay(&[
            task("t-1", &[]),
            Event::Delete(DeleteData {
                id: tid("t-1"),
                extra: Extra::new(),
            }),
        ]);
        let err = validate_dependencies(&state, &[proposal("t-2", &["t-1"])], &[]).unwrap_err();
        assert!(matches!(err, LedgerError::DanglingDependency { deleted: true, .. }));
    }

    #[test]
    fn dep_on_a_task_removed_in_the_same_batch_is_dangling() {
        let state = replay(&[task("t-1", &[])]);
        let err = validate_dependencies(&state, &[proposal("t-2", &["t-1"])], &[tid("t-1")])
            .unwrap_err();
        assert!(matches!(err, LedgerError::DanglingDependency { deleted: true, .. }));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let state = replay(std::iter::empty());
        let err = validate_dependencies(&state, &[proposal("t-1", &["t-1"])], &[]).unwrap_err();
        assert_eq!(err.to_string(), "dependency cycle: t-1 -> t-1");
    }

    #[test]
    fn two_node_cycle_through_a_patch_is_rejected() {
        let state = replay(&[task("t-a", &[]), task("t-b", &["t-a"])]);
        let err = validate_dependencies(&state, &[proposal("t-a", &["t-b"])], &[]).unwrap_err();
        let LedgerError::CyclicDependency { cycle } = err else {
            panic!("expected cycle, got {err:?}");
        };
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 3);
    }

    #[test]
    fn n_node_cycle_is_rejected() {
        let state = replay(&[
            task("t-a", &[]),
            task("t-b", &["t-a"]),
            task("t-c", &["t-b"]),
            task("t-d", &["t-c"]),
        ]);
        let err = validate_dependencies(&state, &[proposal("t-a", &["t-d"])], &[]).unwrap_err();
        let LedgerError::CyclicDependency { cycle } = err else {
            panic!("expected cycle");
        };
        assert_eq!(cycle.len(), 5);
    }

    #[test]
    fn batch_members_may_depend_on_each_other() {
        let state = replay(std::iter::empty());
        validate_dependencies(
            &state,
            &[proposal("t-1", &[]), proposal("t-2", &["t-1"])],
            &[],
        )
        .unwrap();

        let err = validate_dependencies(
            &state,
            &[proposal("t-1", &["t-2"]), proposal("t-2", &["t-1"])],
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::CyclicDependency { .. }));
    }
}
