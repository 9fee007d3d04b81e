//! Graph Nodes
//!
//! This module defines the node records that live in the registry.

use std::fmt;
use std::num::NonZeroU16;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::reactive::{Callback, Expression, Value};

/// Identifier of a reactive node.
///
/// Ids are in `[1, 65535]`; the host uses 0 as the "not reactive" sentinel,
/// which this type cannot represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactiveId(NonZeroU16);

impl ReactiveId {
    /// Wrap a raw id. Returns `None` for the sentinel 0.
    pub fn new(raw: u16) -> Option<Self> {
        NonZeroU16::new(raw).map(Self)
    }

    /// Get the raw id value.
    pub fn get(self) -> u16 {
        self.0.get()
    }

    pub(crate) fn index(self) -> usize {
        self.0.get() as usize
    }
}

impl fmt::Display for ReactiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reactive node.
pub struct ReactiveNode {
    id: ReactiveId,

    /// The host value this node refreshes in place.
    value: Value,

    /// Derivation expression. `None` marks a leaf.
    expr: Option<Expression>,

    /// Nodes whose expression reads this node, in binding order.
    dependents: IndexSet<ReactiveId>,

    /// Callbacks in registration order.
    callbacks: SmallVec<[Box<dyn Callback>; 2]>,
}

impl ReactiveNode {
    pub(crate) fn new(id: ReactiveId, value: Value) -> Self {
        Self {
            id,
            value,
            expr: None,
            dependents: IndexSet::new(),
            callbacks: SmallVec::new(),
        }
    }

    pub fn id(&self) -> ReactiveId {
        self.id
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn expression(&self) -> Option<&Expression> {
        self.expr.as_ref()
    }

    /// A leaf has no expression and is never recomputed.
    pub fn is_leaf(&self) -> bool {
        self.expr.is_none()
    }

    /// Replace the expression, returning the previous one.
    pub(crate) fn set_expression(&mut self, expr: Expression) -> Option<Expression> {
        self.expr.replace(expr)
    }

    pub fn dependents(&self) -> &IndexSet<ReactiveId> {
        &self.dependents
    }

    /// Add a dependent. Returns `false` if the edge already existed.
    pub(crate) fn add_dependent(&mut self, id: ReactiveId) -> bool {
        self.dependents.insert(id)
    }

    pub(crate) fn remove_dependent(&mut self, id: ReactiveId) -> bool {
        self.dependents.shift_remove(&id)
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    pub fn push_callback(&mut self, callback: Box<dyn Callback>) {
        self.callbacks.push(callback);
    }

    /// Detach the callback list for dispatch; see [`Self::restore_callbacks`].
    pub(crate) fn take_callbacks(&mut self) -> SmallVec<[Box<dyn Callback>; 2]> {
        std::mem::take(&mut self.callbacks)
    }

    pub(crate) fn restore_callbacks(&mut self, callbacks: SmallVec<[Box<dyn Callback>; 2]>) {
        debug_assert!(self.callbacks.is_empty());
        self.callbacks = callbacks;
    }

    /// Drop edges and callbacks, and detach the host value.
    pub(crate) fn release(&mut self) {
        self.dependents.clear();
        self.callbacks.clear();
        if self.value.reactive_id() == Some(self.id) {
            self.value.clear_reactive();
        }
    }
}

impl fmt::Debug for ReactiveNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveNode")
            .field("id", &self.id)
            .field("value", &self.value.get())
            .field("expr", &self.expr)
            .field("dependents", &self.dependents)
            .field("callback_count", &self.callbacks.len())
            .finish()
    }
}
