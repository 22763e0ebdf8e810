//! Cycle detection for the task dependency graph.
//!
//! # Design
//!
//! - **DFS-based**: three-colour depth-first search. Reaching a node that is
//!   still on the stack closes a cycle; the stack slice from that node is the
//!   cycle path.
//! - **Check on add**: the committed graph is acyclic, so any new cycle must
//!   pass through a proposed task. Searching from each proposal is enough.
//! - **O(V+E)**: each node and edge is visited at most once per search.
//! - Ids with no entry (accepted tombstones, unknown ids) are leaves.

use std::collections::HashMap;

use crate::model::TaskId;
use crate::replay::LedgerState;

/// `task -> deps` adjacency for the active set plus any proposed changes.
#[derive(Debug, Clone, Default)]
pub struct DepGraph {
    edges: HashMap<TaskId, Vec<TaskId>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the DFS stack.
    Gray,
    /// Fully explored.
    Black,
}

impl DepGraph {
    /// Graph of every active task's deps.
    #[must_use]
    pub fn from_state(state: &LedgerState) -> Self {
        let edges = state
            .tasks()
            .into_iter()
            .map(|t| (t.id.clone(), t.deps.iter().cloned().collect()))
            .collect();
        Self { edges }
    }

    /// Insert or replace the deps of `id`.
    pub fn set_deps(&mut self, id: TaskId, deps: impl IntoIterator<Item = TaskId>) {
        let mut deps: Vec<TaskId> = deps.into_iter().collect();
        deps.sort();
        deps.dedup();
        self.edges.insert(id, deps);
    }

    /// Drop `id` and its outgoing edges.
    pub fn remove(&mut self, id: &TaskId) {
        self.edges.remove(id);
    }

    #[must_use]
    pub fn deps_of(&self, id: &TaskId) -> &[TaskId] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// A cycle reachable from `start`, as a path that begins and ends on the
    /// same id (`[a, b, a]`), or `None`.
    #[must_use]
    pub fn find_cycle_from(&self, start: &TaskId) -> Option<Vec<TaskId>> {
        let mut color = HashMap::new();
        self.dfs(start, &mut color)
    }

    /// Any cycle in the graph. Nodes are tried in id order so the answer is
    /// deterministic.
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<TaskId>> {
        let mut nodes: Vec<&TaskId> = self.edges.keys().collect();
        nodes.sort();

        let mut color = HashMap::new();
        for node in nodes {
            if color.contains_key(node) {
                continue;
            }
            if let Some(cycle) = self.dfs(node, &mut color) {
                return Some(cycle);
            }
        }
        None
    }

    /// Depth-first search from `root` with an explicit stack, so chain
    /// length is bounded by memory rather than thread stack size.
    fn dfs(&self, root: &TaskId, color: &mut HashMap<TaskId, Color>) -> Option<Vec<TaskId>> {
        // Each frame is a node on the current path and the index of the next
        // dep to visit.
        let mut stack: Vec<(&TaskId, usize)> = vec![(root, 0)];
        color.insert(root.clone(), Color::Gray);

        while let Some(frame) = stack.last_mut() {
            let (node, idx) = *frame;
            let Some(next) = self.deps_of(node).get(idx) else {
                color.insert(node.clone(), Color::Black);
                stack.pop();
                continue;
            };
            frame.1 += 1;

            match color.get(next) {
                Some(Color::Gray) => {
                    let start = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                    let mut cycle: Vec<TaskId> =
                        stack[start..].iter().map(|(n, _)| (*n).clone()).collect();
                    cycle.push(next.clone());
                    return Some(cycle);
                }
                Some(Color::Black) => {}
                None => {
                    color.insert(next.clone(), Color::Gray);
                    stack.push((next, 0));
                }
            }
        }
        None
    }
}
