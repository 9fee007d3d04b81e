//! Graph Snapshots
//!
//! A point-in-time, serializable copy of the registry: values, expressions
//! and edges, with callbacks reduced to a count. Snapshots are for
//! inspection and for handing the graph state to the message relay; they
//! are never loaded back into a runtime.

use serde::{Deserialize, Serialize};

use super::node::ReactiveId;
use super::registry::Registry;
use crate::reactive::{Datum, Expression};

/// One node of a [`GraphSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: ReactiveId,
    pub value: Datum,
    pub expr: Option<Expression>,
    pub dependents: Vec<ReactiveId>,
    pub callbacks: usize,
}

/// Serializable copy of a registry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
}

impl GraphSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Compact MessagePack encoding.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }

    pub fn get(&self, id: ReactiveId) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

impl Registry {
    /// Copy the current state of every node, in id order.
    pub fn snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .iter()
            .map(|node| NodeSnapshot {
                id: node.id(),
                value: node.value().get(),
                expr: node.expression().cloned(),
                dependents: node.dependents().iter().copied().collect(),
                callbacks: node.callback_count(),
            })
            .collect();

        GraphSnapshot { nodes }
    }
}
