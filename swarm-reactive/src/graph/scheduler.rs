//! Update Scheduler
//!
//! The scheduler determines which nodes a change reaches and the order in
//! which they must be recomputed. It ensures that every node is recomputed
//! after all the discovered nodes it reads from.
//!
//! # Algorithm
//!
//! 1. Discovery: depth-first walk of the dependents relation from the
//!    changed node. Each node carries a mark: on the current path, or
//!    finished. Reaching a node that is still on the path means the graph
//!    has a cycle, and planning fails before anything is written.
//! 2. Ordering: Kahn's algorithm over the discovered subset only. In-degrees
//!    count edges whose source was also discovered, so a node reachable
//!    through paths of different length (a diamond) is released only after
//!    its last discovered ancestor.
//!
//! The walk is iterative so a long chain cannot overflow the stack.

use std::collections::VecDeque;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::node::ReactiveId;
use super::registry::Registry;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

/// The outcome of planning a propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationPlan {
    /// The changed node.
    pub root: ReactiveId,

    /// Tree edges followed during discovery, `(ancestor, dependent)`.
    pub edges: Vec<(ReactiveId, ReactiveId)>,

    /// Topological order of the discovered subset, root first.
    pub order: Vec<ReactiveId>,
}

impl PropagationPlan {
    /// Nodes to recompute: the order without the root.
    pub fn dirty(&self) -> &[ReactiveId] {
        &self.order[1..]
    }

    /// Whether the change reaches no other node.
    pub fn is_noop(&self) -> bool {
        self.order.len() <= 1
    }
}

/// Plans propagations over a registry.
pub struct UpdateScheduler<'a> {
    registry: &'a Registry,
}

impl<'a> UpdateScheduler<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Discover, check and order everything reachable from `root`.
    pub fn plan(&self, root: ReactiveId) -> Result<PropagationPlan> {
        let (marks, edges) = self.discover(root)?;
        let order = self.topological_sort(root, &marks)?;

        Ok(PropagationPlan { root, edges, order })
    }

    /// Depth-first discovery with cycle detection.
    ///
    /// Returns the discovered nodes (in discovery order) and the tree edges.
    fn discover(
        &self,
        root: ReactiveId,
    ) -> Result<(IndexMap<ReactiveId, Mark>, Vec<(ReactiveId, ReactiveId)>)> {
        let mut marks: IndexMap<ReactiveId, Mark> = IndexMap::new();
        let mut edges = Vec::new();
        // (node, index of the next dependent to visit)
        let mut stack: Vec<(ReactiveId, usize)> = Vec::new();

        self.registry.get(root)?;
        marks.insert(root, Mark::OnPath);
        stack.push((root, 0));

        while let Some(frame) = stack.last_mut() {
            let (current, next) = *frame;
            let dependents = self.registry.get(current)?.dependents();

            match dependents.get_index(next) {
                Some(&dependent) => {
                    frame.1 += 1;
                    match marks.get(&dependent) {
                        Some(Mark::OnPath) => {
                            warn!(root = %root, closing = %dependent, "cyclic dependency detected");
                            return Err(Error::CyclicDependency { id: dependent });
                        }
                        Some(Mark::Done) => {}
                        None => {
                            self.registry.get(dependent)?;
                            marks.insert(dependent, Mark::OnPath);
                            edges.push((current, dependent));
                            stack.push((dependent, 0));
                        }
                    }
                }
                None => {
                    marks.insert(current, Mark::Done);
                    stack.pop();
                }
            }
        }

        Ok((marks, edges))
    }

    /// Kahn's algorithm restricted to the discovered subset.
    fn topological_sort(
        &self,
        root: ReactiveId,
        discovered: &IndexMap<ReactiveId, Mark>,
    ) -> Result<Vec<ReactiveId>> {
        let mut in_degree: IndexMap<ReactiveId, usize> =
            discovered.keys().map(|&id| (id, 0)).collect();

        // Count only edges whose source was discovered
        for &id in discovered.keys() {
            for dependent in self.registry.get(id)?.dependents() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree += 1;
                }
            }
        }

        let mut queue: VecDeque<ReactiveId> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut order = Vec::with_capacity(discovered.len());

        while let Some(id) = queue.pop_front() {
            order.push(id);

            for dependent in self.registry.get(id)?.dependents() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(*dependent);
                    }
                }
            }
        }

        // Discovery already rejected cycles; anything left over is one.
        if order.len() != discovered.len() {
            let closing = in_degree
                .iter()
                .find(|(_, &degree)| degree > 0)
                .map(|(&id, _)| id)
                .unwrap_or(root);
            return Err(Error::CyclicDependency { id: closing });
        }

        debug_assert_eq!(order.first(), Some(&root));
        Ok(order)
    }
}
