//! Node Registry
//!
//! The registry owns every reactive node of one runtime. Nodes live in a
//! dense arena indexed by [`ReactiveId`]; every cross-node reference
//! (operand or dependent) is an id resolved through the registry at use
//! time, so nodes never hold references to one another.
//!
//! # Id Allocation
//!
//! A fresh id is found by probing upward from `len + 1`, wrapping back to 1
//! past the limit. While no node is ever removed individually the first
//! probe hits, so allocation is amortized O(1); the worst case scans the
//! whole space once.

use tracing::debug;

use super::node::{ReactiveId, ReactiveNode};
use crate::error::{Error, Result};
use crate::reactive::{Expression, Value};

/// Arena of reactive nodes.
pub struct Registry {
    /// Slot `i` holds the node with id `i`. Slot 0 is always empty.
    slots: Vec<Option<ReactiveNode>>,

    /// Number of occupied slots.
    len: usize,

    /// Highest id the allocator may hand out.
    limit: u16,
}

impl Registry {
    /// Create an empty registry that allocates ids in `[1, limit]`.
    pub fn new(limit: u16) -> Self {
        Self {
            slots: Vec::new(),
            len: 0,
            limit: limit.max(1),
        }
    }

    /// Mark `value` reactive and return its id.
    ///
    /// Idempotent: a value that already carries an id of this registry gets
    /// that id back.
    pub fn create(&mut self, value: &Value) -> Result<ReactiveId> {
        if value.is_reactive() {
            return self.resolve(value);
        }

        let id = self.allocate_id()?;
        value.mark_reactive(id);
        self.insert(ReactiveNode::new(id, value.clone()));

        debug!(reactive = %id, value = %value.get(), "reactive created");
        Ok(id)
    }

    /// The id `value` is registered under in this registry.
    ///
    /// Fails with `NotReactive` for a plain value and with `NotFound` for a
    /// value whose id belongs to another registry.
    pub fn resolve(&self, value: &Value) -> Result<ReactiveId> {
        let id = value.reactive_id().ok_or(Error::NotReactive)?;
        match self.get(id) {
            Ok(node) if node.value().ptr_eq(value) => Ok(id),
            _ => Err(Error::NotFound(id)),
        }
    }

    /// Find a free id without claiming it.
    fn allocate_id(&self) -> Result<ReactiveId> {
        let limit = self.limit as usize;
        if self.len >= limit {
            return Err(Error::IdSpaceExhausted { limit: self.limit });
        }

        let mut candidate = self.len % limit + 1;
        for _ in 0..limit {
            if !self.contains_index(candidate) {
                return ReactiveId::new(candidate as u16)
                    .ok_or(Error::IdSpaceExhausted { limit: self.limit });
            }
            candidate = candidate % limit + 1;
        }

        Err(Error::IdSpaceExhausted { limit: self.limit })
    }

    fn contains_index(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    fn insert(&mut self, node: ReactiveNode) {
        let index = node.id().index();
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(node);
        self.len += 1;
    }

    /// Look up a node.
    pub fn get(&self, id: ReactiveId) -> Result<&ReactiveNode> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(Error::NotFound(id))
    }

    /// Look up a node mutably.
    pub fn get_mut(&mut self, id: ReactiveId) -> Result<&mut ReactiveNode> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(Error::NotFound(id))
    }

    pub fn contains(&self, id: ReactiveId) -> bool {
        self.contains_index(id.index())
    }

    /// Attach `expr` to `dependent` and record the edges it introduces.
    ///
    /// Rebinding replaces the previous expression and drops the edges only
    /// it introduced. Every referenced node must exist; on error nothing is
    /// changed.
    pub fn bind(&mut self, dependent: ReactiveId, expr: Expression) -> Result<()> {
        self.get(dependent)?;
        let reads = expr.reads();
        for &ancestor in &reads {
            self.get(ancestor)?;
        }

        let previous = self.get_mut(dependent)?.set_expression(expr);

        if let Some(previous) = previous {
            for stale in previous.reads() {
                if !reads.contains(&stale) {
                    self.get_mut(stale)?.remove_dependent(dependent);
                }
            }
        }
        for &ancestor in &reads {
            self.get_mut(ancestor)?.add_dependent(dependent);
        }

        debug!(reactive = %dependent, reads = ?reads.as_slice(), "expression bound");
        Ok(())
    }

    /// Iterate over all nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ReactiveNode> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn limit(&self) -> u16 {
        self.limit
    }

    /// Release every node's edges and callbacks, then empty the registry.
    pub fn destroy_all(&mut self) {
        let released = self.len;
        for node in self.slots.iter_mut().flatten() {
            node.release();
        }
        self.slots.clear();
        self.len = 0;

        if released > 0 {
            debug!(released, "registry destroyed");
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(u16::MAX)
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.len)
            .field("limit", &self.limit)
            .finish()
    }
}
