//! Swarm Reactive
//!
//! This crate provides the reactive-variable engine embedded in the script
//! VM of each robot in a swarm. It implements:
//!
//! - A registry of reactive nodes with compact 16-bit ids
//! - Binding of binary arithmetic expressions between reactives
//! - Propagation: discovery, cycle detection and topological evaluation
//! - Callback dispatch after each refresh
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `graph`: node records, the registry and the update scheduler
//! - `reactive`: host values, expressions, callbacks and the runtime
//!
//! # Example
//!
//! ```rust
//! use swarm_reactive::{Datum, Operator, Runtime, Value};
//!
//! let mut runtime = Runtime::default();
//!
//! // Mark a host value reactive
//! let speed = Value::int(2);
//! let speed_id = runtime.create(&speed).unwrap();
//!
//! // Define a derived value: distance = speed * 10
//! let distance = Value::int(0);
//! runtime.derive(&distance, Operator::Mul, speed_id, 10i64).unwrap();
//!
//! // Update the source; the derived value is refreshed in place
//! runtime.set(&speed, 5i64).unwrap();
//! assert_eq!(distance.get(), Datum::Int(50));
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::{NestedPolicy, RuntimeConfig};
pub use error::{ArithmeticFault, CallbackFault, Error, Result};
pub use graph::{GraphSnapshot, PropagationPlan, ReactiveId, Registry};
pub use reactive::{Callback, Datum, Expression, Invocation, Operand, Operator, Propagation, Runtime, Value};
