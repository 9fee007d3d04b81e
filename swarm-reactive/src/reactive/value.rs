//! Host Values
//!
//! A [`Value`] is a shared, mutable-in-place handle owned by the host VM.
//! The engine never swaps a value for a new one; it overwrites the datum
//! inside, so every part of the host holding the same handle observes the
//! refresh.
//!
//! # Identity
//!
//! Each value carries the reactive id it was registered under, or none. The
//! id lives next to the datum so that marking a value reactive twice finds
//! the existing node instead of creating a duplicate.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::graph::ReactiveId;

/// The payload of a host value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Datum {
    Nil,
    Int(i64),
    Float(f64),
    Str(String),
}

/// Type tag of a [`Datum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatumKind {
    Nil,
    Int,
    Float,
    Str,
}

impl Datum {
    pub fn kind(&self) -> DatumKind {
        match self {
            Datum::Nil => DatumKind::Nil,
            Datum::Int(_) => DatumKind::Int,
            Datum::Float(_) => DatumKind::Float,
            Datum::Str(_) => DatumKind::Str,
        }
    }

    /// Whether the evaluator can use this datum as an operand.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Datum::Int(_) | Datum::Float(_))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Datum::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Datum::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Nil => write!(f, "nil"),
            Datum::Int(i) => write!(f, "{}", i),
            Datum::Float(x) => write!(f, "{}", x),
            Datum::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl fmt::Display for DatumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatumKind::Nil => "nil",
            DatumKind::Int => "int",
            DatumKind::Float => "float",
            DatumKind::Str => "string",
        };
        f.write_str(name)
    }
}

impl From<i64> for Datum {
    fn from(i: i64) -> Self {
        Datum::Int(i)
    }
}

impl From<f64> for Datum {
    fn from(x: f64) -> Self {
        Datum::Float(x)
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::Str(s.to_string())
    }
}

#[derive(Debug)]
struct Slot {
    datum: Datum,
    reactive: Option<ReactiveId>,
}

/// A shared host value.
///
/// Cloning the handle shares the slot; it does not copy the datum.
#[derive(Clone)]
pub struct Value {
    slot: Arc<RwLock<Slot>>,
}

impl Value {
    pub fn new(datum: impl Into<Datum>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Slot {
                datum: datum.into(),
                reactive: None,
            })),
        }
    }

    pub fn int(i: i64) -> Self {
        Self::new(Datum::Int(i))
    }

    pub fn float(x: f64) -> Self {
        Self::new(Datum::Float(x))
    }

    /// A copy of the current datum.
    pub fn get(&self) -> Datum {
        self.slot.read().datum.clone()
    }

    /// Overwrite the datum in place.
    ///
    /// This does not propagate; use [`crate::Runtime::set`] for that.
    pub fn set(&self, datum: impl Into<Datum>) {
        self.slot.write().datum = datum.into();
    }

    pub fn kind(&self) -> DatumKind {
        self.slot.read().datum.kind()
    }

    /// The reactive id this value is registered under, if any.
    pub fn reactive_id(&self) -> Option<ReactiveId> {
        self.slot.read().reactive
    }

    pub fn is_reactive(&self) -> bool {
        self.reactive_id().is_some()
    }

    pub(crate) fn mark_reactive(&self, id: ReactiveId) {
        self.slot.write().reactive = Some(id);
    }

    pub(crate) fn clear_reactive(&self) {
        self.slot.write().reactive = None;
    }

    /// Whether both handles point at the same host value.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.read();
        f.debug_struct("Value")
            .field("datum", &slot.datum)
            .field("reactive", &slot.reactive)
            .finish()
    }
}

impl From<Datum> for Value {
    fn from(datum: Datum) -> Self {
        Value::new(datum)
    }
}
