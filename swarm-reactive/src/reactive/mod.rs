//! Reactive Primitives
//!
//! This module implements the script-facing side of the engine: host
//! values, expressions, callbacks and the per-VM runtime.
//!
//! # Concepts
//!
//! ## Values
//!
//! A [`Value`] is owned by the host VM and shared with the engine. Marking
//! it reactive gives it a stable id; its contents are overwritten in place
//! whenever it is recomputed.
//!
//! ## Expressions
//!
//! A derived reactive is defined by one binary arithmetic [`Expression`]
//! over two operands, each a literal or another reactive.
//!
//! ## Callbacks
//!
//! Closures registered on a reactive run after each pass that refreshed
//! it, in registration order.
//!
//! # Implementation Notes
//!
//! The [`Runtime`] is single-threaded and synchronous. It is not a global:
//! every VM instance owns its own, and two runtimes never share nodes.

mod callback;
mod expr;
mod runtime;
mod value;

pub use callback::{callback, dispatch, Callback, Deferred, FnCallback, Invocation};
pub use expr::{Expression, Operand, OperandFault, Operator};
pub use runtime::{Propagation, Runtime};
pub use value::{Datum, DatumKind, Value};
