//! Expression Evaluator
//!
//! A derived reactive is defined by exactly one binary arithmetic
//! expression. Operands are either literals or references to other
//! reactives by id; references are resolved against the registry at
//! evaluation time, never captured when the expression is bound.
//!
//! # Numeric Promotion
//!
//! | left  | right | result |
//! |-------|-------|--------|
//! | Int   | Int   | Int    |
//! | Int   | Float | Float  |
//! | Float | Int   | Float  |
//! | Float | Float | Float  |
//!
//! Integer arithmetic is checked: division truncates toward zero, division
//! by zero and overflow are arithmetic errors. Float arithmetic follows
//! IEEE 754, so `x / 0.0` yields an infinity or NaN.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::value::{Datum, DatumKind};
use crate::error::{ArithmeticFault, Error, Result};
use crate::graph::ReactiveId;

/// Binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
}

impl Operator {
    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
        }
    }

    /// Apply the operator with numeric promotion.
    pub fn apply(self, left: &Datum, right: &Datum) -> std::result::Result<Datum, OperandFault> {
        match (left, right) {
            (Datum::Int(l), Datum::Int(r)) => self.apply_int(*l, *r).map(Datum::Int),
            (Datum::Int(l), Datum::Float(r)) => Ok(Datum::Float(self.apply_float(*l as f64, *r))),
            (Datum::Float(l), Datum::Int(r)) => Ok(Datum::Float(self.apply_float(*l, *r as f64))),
            (Datum::Float(l), Datum::Float(r)) => Ok(Datum::Float(self.apply_float(*l, *r))),
            _ => Err(OperandFault::Unsupported {
                left: left.kind(),
                right: right.kind(),
            }),
        }
    }

    fn apply_int(self, l: i64, r: i64) -> std::result::Result<i64, OperandFault> {
        let result = match self {
            Operator::Add => l.checked_add(r),
            Operator::Sub => l.checked_sub(r),
            Operator::Mul => l.checked_mul(r),
            Operator::Div => {
                if r == 0 {
                    return Err(OperandFault::Arithmetic(ArithmeticFault::DivisionByZero));
                }
                // i64::MIN / -1 is the only overflowing quotient
                l.checked_div(r)
            }
        };
        result.ok_or(OperandFault::Arithmetic(ArithmeticFault::Overflow(self)))
    }

    fn apply_float(self, l: f64, r: f64) -> f64 {
        match self {
            Operator::Add => l + r,
            Operator::Sub => l - r,
            Operator::Mul => l * r,
            Operator::Div => l / r,
        }
    }
}

impl TryFrom<char> for Operator {
    type Error = Error;

    fn try_from(symbol: char) -> Result<Self> {
        match symbol {
            '+' => Ok(Operator::Add),
            '-' => Ok(Operator::Sub),
            '*' => Ok(Operator::Mul),
            '/' => Ok(Operator::Div),
            other => Err(Error::UnknownOperator(other)),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Why two operands could not be combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandFault {
    Arithmetic(ArithmeticFault),
    Unsupported { left: DatumKind, right: DatumKind },
}

/// One side of an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operand {
    Literal(Datum),
    Reactive(ReactiveId),
}

impl Operand {
    pub fn reactive_id(&self) -> Option<ReactiveId> {
        match self {
            Operand::Reactive(id) => Some(*id),
            Operand::Literal(_) => None,
        }
    }
}

impl From<ReactiveId> for Operand {
    fn from(id: ReactiveId) -> Self {
        Operand::Reactive(id)
    }
}

impl From<Datum> for Operand {
    fn from(datum: Datum) -> Self {
        Operand::Literal(datum)
    }
}

impl From<i64> for Operand {
    fn from(i: i64) -> Self {
        Operand::Literal(Datum::Int(i))
    }
}

impl From<f64> for Operand {
    fn from(x: f64) -> Self {
        Operand::Literal(Datum::Float(x))
    }
}

/// A binary expression defining a derived reactive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub op: Operator,
    pub left: Operand,
    pub right: Operand,
}

impl Expression {
    pub fn new(op: Operator, left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self {
            op,
            left: left.into(),
            right: right.into(),
        }
    }

    /// Reactive ids this expression reads, without duplicates.
    pub fn reads(&self) -> SmallVec<[ReactiveId; 2]> {
        let mut reads = SmallVec::new();
        for id in [self.left.reactive_id(), self.right.reactive_id()].into_iter().flatten() {
            if !reads.contains(&id) {
                reads.push(id);
            }
        }
        reads
    }

    /// Evaluate the expression for the node `id`.
    ///
    /// `resolve` returns the current datum of a referenced reactive.
    pub fn evaluate<F>(&self, id: ReactiveId, mut resolve: F) -> Result<Datum>
    where
        F: FnMut(ReactiveId) -> Result<Datum>,
    {
        let left = Self::operand_datum(&self.left, &mut resolve)?;
        let right = Self::operand_datum(&self.right, &mut resolve)?;

        self.op.apply(&left, &right).map_err(|fault| match fault {
            OperandFault::Arithmetic(source) => Error::Arithmetic { id, source },
            OperandFault::Unsupported { left, right } => Error::Evaluation {
                id,
                op: self.op,
                left,
                right,
            },
        })
    }

    fn operand_datum<F>(operand: &Operand, resolve: &mut F) -> Result<Datum>
    where
        F: FnMut(ReactiveId) -> Result<Datum>,
    {
        match operand {
            Operand::Literal(datum) => Ok(datum.clone()),
            Operand::Reactive(id) => resolve(*id),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |operand: &Operand| match operand {
            Operand::Literal(datum) => datum.to_string(),
            Operand::Reactive(id) => format!("#{}", id),
        };
        write!(f, "{} {} {}", side(&self.left), self.op, side(&self.right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(raw: u16) -> ReactiveId {
        ReactiveId::new(raw).unwrap()
    }

    fn literal(expr: &Expression) -> Result<Datum> {
        expr.evaluate(rid(1), |id| Err(Error::NotFound(id)))
    }

    #[test]
    fn integer_division_truncates() {
        let exact = Expression::new(Operator::Div, 4i64, 2i64);
        assert_eq!(literal(&exact).unwrap(), Datum::Int(2));

        let truncated = Expression::new(Operator::Div, 5i64, 2i64);
        assert_eq!(literal(&truncated).unwrap(), Datum::Int(2));

        let negative = Expression::new(Operator::Div, -7i64, 2i64);
        assert_eq!(literal(&negative).unwrap(), Datum::Int(-3));
    }

    #[test]
    fn mixed_operands_promote_to_float() {
        let right_float = Expression::new(Operator::Div, 5i64, 2.0f64);
        assert_eq!(literal(&right_float).unwrap(), Datum::Float(2.5));

        let left_float = Expression::new(Operator::Mul, 1.5f64, 2i64);
        assert_eq!(literal(&left_float).unwrap(), Datum::Float(3.0));

        let both = Expression::new(Operator::Sub, 1.0f64, 0.25f64);
        assert_eq!(literal(&both).unwrap(), Datum::Float(0.75));
    }

    #[test]
    fn integer_division_by_zero_is_arithmetic_error() {
        let expr = Expression::new(Operator::Div, 1i64, 0i64);
        match literal(&expr) {
            Err(Error::Arithmetic { id, source }) => {
                assert_eq!(id, rid(1));
                assert_eq!(source, ArithmeticFault::DivisionByZero);
            }
            other => panic!("expected arithmetic error, got {:?}", other),
        }
    }

    #[test]
    fn float_division_by_zero_is_infinite() {
        let expr = Expression::new(Operator::Div, 1.0f64, 0i64);
        let result = literal(&expr).unwrap();
        assert_eq!(result.as_float(), Some(f64::INFINITY));
    }

    #[test]
    fn integer_overflow_is_arithmetic_error() {
        let expr = Expression::new(Operator::Add, i64::MAX, 1i64);
        assert!(matches!(
            literal(&expr),
            Err(Error::Arithmetic { source: ArithmeticFault::Overflow(Operator::Add), .. })
        ));

        let expr = Expression::new(Operator::Div, i64::MIN, -1i64);
        assert!(matches!(literal(&expr), Err(Error::Arithmetic { .. })));
    }

    #[test]
    fn non_numeric_operand_is_evaluation_error() {
        let expr = Expression::new(Operator::Add, Datum::from("a"), 1i64);
        match literal(&expr) {
            Err(Error::Evaluation { left, right, op, .. }) => {
                assert_eq!(left, DatumKind::Str);
                assert_eq!(right, DatumKind::Int);
                assert_eq!(op, Operator::Add);
            }
            other => panic!("expected evaluation error, got {:?}", other),
        }
    }

    #[test]
    fn operands_resolve_through_callback() {
        let expr = Expression::new(Operator::Add, rid(2), rid(3));
        let result = expr.evaluate(rid(4), |id| Ok(Datum::Int(id.get() as i64 * 10)));
        assert_eq!(result.unwrap(), Datum::Int(50));
    }

    #[test]
    fn reads_are_deduplicated() {
        let expr = Expression::new(Operator::Mul, rid(2), rid(2));
        assert_eq!(expr.reads().as_slice(), &[rid(2)]);

        let expr = Expression::new(Operator::Mul, rid(2), 3i64);
        assert_eq!(expr.reads().as_slice(), &[rid(2)]);
    }

    #[test]
    fn operator_from_symbol() {
        assert_eq!(Operator::try_from('*').unwrap(), Operator::Mul);
        assert!(matches!(Operator::try_from('%'), Err(Error::UnknownOperator('%'))));
    }

    #[test]
    fn expression_display() {
        let expr = Expression::new(Operator::Sub, rid(5), 1.5f64);
        assert_eq!(expr.to_string(), "#5 - 1.5");
    }
}
