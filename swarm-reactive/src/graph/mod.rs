//! Dependency Graph
//!
//! This module implements the dependency graph between reactive values.
//!
//! # Overview
//!
//! The graph is a set of nodes keyed by [`ReactiveId`] where:
//!
//! - Leaf nodes hold values set directly by script code
//! - Derived nodes hold a binary expression over literals and other nodes
//! - Edges point from a node to its dependents: if B reads A, there is an
//!   edge from A to B
//!
//! When a node changes, the scheduler walks the edges to find every node
//! the change reaches, rejects cycles, and orders the reached subset so
//! that each node comes after everything it reads.
//!
//! # Design Decisions
//!
//! 1. Nodes live in a dense arena owned by the [`Registry`], and refer to
//!    each other only by id. Operands are resolved at evaluation time, so a
//!    node always reads the current value of its ancestors.
//!
//! 2. Dependents are an insertion-ordered set, so an edge is recorded once
//!    however many operands introduce it, and traversal is deterministic.
//!
//! 3. Nodes are only destroyed in bulk, when the owning VM tears down.

mod node;
mod registry;
mod scheduler;
mod snapshot;

pub use node::{ReactiveId, ReactiveNode};
pub use registry::Registry;
pub use scheduler::{PropagationPlan, UpdateScheduler};
pub use snapshot::{GraphSnapshot, NodeSnapshot};
