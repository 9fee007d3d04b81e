//! Engine Errors
//!
//! Every failure the engine can report surfaces synchronously through
//! [`Error`]. Nothing is retried; the host VM decides whether a failure
//! halts the script.
//!
//! # Propagation Policy
//!
//! - [`Error::IdSpaceExhausted`]: creation fails, the registry is unchanged.
//! - [`Error::CyclicDependency`]: the whole pass is aborted before any value
//!   is written.
//! - [`Error::Arithmetic`] and [`Error::Evaluation`]: the pass stops at the
//!   failing node. Nodes evaluated earlier in the same pass keep their new
//!   values.
//! - [`Error::UnknownOperator`]: the evaluation error for an operator symbol
//!   outside `+ - * /`. An [`Operator`] can only name the four supported
//!   operations, so the symbol is refused when the host converts it, before
//!   any expression is bound.
//! - [`Error::Callback`]: dispatch stops for the rest of the pass. Value
//!   updates already applied stand.
//! - [`Error::NotFound`]: a stale or destroyed id was resolved, or a value
//!   registered with another runtime was handed in. Nothing is written.

use thiserror::Error;

use crate::graph::ReactiveId;
use crate::reactive::{DatumKind, Operator};

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fault raised by a host callback.
pub type CallbackFault = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the reactive engine.
#[derive(Debug, Error)]
pub enum Error {
    /// No free identifier is left in `[1, limit]`.
    #[error("cannot create more reactive variables (limit {limit})")]
    IdSpaceExhausted { limit: u16 },

    /// Discovery reached a node that is already on the current path.
    ///
    /// `id` is the node that closes the cycle.
    #[error("cyclic dependency closing at reactive {id}")]
    CyclicDependency { id: ReactiveId },

    /// Arithmetic failed while recomputing `id`.
    #[error("arithmetic error in reactive {id}: {source}")]
    Arithmetic {
        id: ReactiveId,
        #[source]
        source: ArithmeticFault,
    },

    /// The operands of `id`'s expression cannot be combined.
    ///
    /// Unsupported operators never reach evaluation; they are reported as
    /// [`Error::UnknownOperator`]. Use [`Error::is_evaluation`] to match both.
    #[error("cannot evaluate reactive {id}: unsupported operands {left} {op} {right}")]
    Evaluation {
        id: ReactiveId,
        op: Operator,
        left: DatumKind,
        right: DatumKind,
    },

    /// The host handed over an operator symbol outside `+ - * /`.
    ///
    /// This is the evaluation error for operators, raised by
    /// `Operator::try_from` instead of by a propagation pass.
    #[error("unsupported operator '{0}'")]
    UnknownOperator(char),

    /// A callback registered on `id` faulted.
    #[error("callback on reactive {id} failed: {source}")]
    Callback {
        id: ReactiveId,
        #[source]
        source: CallbackFault,
    },

    /// No node is registered under this id.
    #[error("reactive {0} not found")]
    NotFound(ReactiveId),

    /// The value was never marked reactive.
    #[error("value is not reactive")]
    NotReactive,

    /// A callback asked for a recalculation while the runtime rejects
    /// nested propagation.
    #[error("nested propagation of reactive {id} rejected")]
    NestedPropagation { id: ReactiveId },

    /// Callbacks kept scheduling follow-up passes past the configured limit.
    #[error("deferred propagation exceeded {limit} follow-up passes")]
    DeferredLimit { limit: usize },
}

/// Arithmetic faults raised by the expression evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArithmeticFault {
    #[error("division by zero")]
    DivisionByZero,

    /// Integer result does not fit in the host's integer type.
    #[error("integer overflow in '{0}'")]
    Overflow(Operator),
}

impl Error {
    /// Whether the failure happened before any value was written.
    pub fn is_clean_abort(&self) -> bool {
        matches!(
            self,
            Error::CyclicDependency { .. }
                | Error::IdSpaceExhausted { .. }
                | Error::NotReactive
                | Error::NestedPropagation { .. }
                | Error::UnknownOperator(_)
        )
    }

    /// Whether the failure is an evaluation error: unsupported operand
    /// types or an unsupported operator.
    pub fn is_evaluation(&self) -> bool {
        matches!(self, Error::Evaluation { .. } | Error::UnknownOperator(_))
    }
}
