//! Arithmetic rules over operand kinds.

use super::{Algebra, AlgebraOperand, ArithmeticShape as S, Operand};
use crate::error::{FilterError, Result};
use crate::expr::ArithmeticOp;

/// Apply an arithmetic operator to two compiled operands.
///
/// Instants only add or subtract durations, and subtract other instants.
/// Null operands propagate.
pub fn arithmetic<A: Algebra>(
    alg: &A,
    op: ArithmeticOp,
    left: &AlgebraOperand<A>,
    right: &AlgebraOperand<A>,
) -> Result<AlgebraOperand<A>> {
    use ArithmeticOp::{Add, Div, Mod, Mul, Sub};
    use Operand as O;

    let invalid = || FilterError::InvalidArithmetic {
        op: op.token().to_string(),
        left: left.kind(),
        right: right.kind(),
    };

    match left {
        O::Null => match right {
            O::Null | O::Scalar(_) | O::Instant(_) | O::Duration(_) | O::Interval { .. } => {
                Ok(O::Null)
            }
            O::Condition(_) => Err(invalid()),
        },
        O::Scalar(a) => match right {
            O::Scalar(b) => Ok(O::Scalar(alg.arithmetic(op, S::Numbers, a, b)?)),
            O::Duration(d) if op == Mul => Ok(O::Duration(alg.arithmetic(
                Mul,
                S::DurationScalar,
                d,
                a,
            )?)),
            O::Null => Ok(O::Null),
            O::Duration(_) | O::Instant(_) | O::Interval { .. } | O::Condition(_) => {
                Err(invalid())
            }
        },
        O::Instant(t) => match right {
            O::Duration(d) => match op {
                Add | Sub => Ok(O::Instant(alg.arithmetic(op, S::InstantDuration, t, d)?)),
                Mul | Div | Mod => Err(invalid()),
            },
            O::Instant(u) => match op {
                Sub => Ok(O::Duration(alg.arithmetic(Sub, S::InstantInstant, t, u)?)),
                Add | Mul | Div | Mod => Err(invalid()),
            },
            O::Null => Ok(O::Null),
            O::Scalar(_) | O::Interval { .. } | O::Condition(_) => Err(invalid()),
        },
        O::Duration(d) => match right {
            O::Duration(e) => match op {
                Add | Sub => Ok(O::Duration(alg.arithmetic(op, S::DurationDuration, d, e)?)),
                Mul | Div | Mod => Err(invalid()),
            },
            O::Instant(t) => match op {
                Add => Ok(O::Instant(alg.arithmetic(Add, S::InstantDuration, t, d)?)),
                Sub | Mul | Div | Mod => Err(invalid()),
            },
            O::Scalar(n) => match op {
                Mul | Div => Ok(O::Duration(alg.arithmetic(op, S::DurationScalar, d, n)?)),
                Add | Sub | Mod => Err(invalid()),
            },
            O::Null => Ok(O::Null),
            O::Interval { .. } | O::Condition(_) => Err(invalid()),
        },
        O::Interval { start, end } => match right {
            O::Duration(d) => match op {
                Add | Sub => Ok(O::Interval {
                    start: alg.arithmetic(op, S::InstantDuration, start, d)?,
                    end: alg.arithmetic(op, S::InstantDuration, end, d)?,
                }),
                Mul | Div | Mod => Err(invalid()),
            },
            O::Null => Ok(O::Null),
            O::Scalar(_) | O::Instant(_) | O::Interval { .. } | O::Condition(_) => Err(invalid()),
        },
        O::Condition(_) => Err(invalid()),
    }
}

/// Unary minus. Defined for numbers and durations.
pub fn negate<A: Algebra>(alg: &A, operand: &AlgebraOperand<A>) -> Result<AlgebraOperand<A>> {
    match operand {
        Operand::Null => Ok(Operand::Null),
        Operand::Scalar(t) => Ok(Operand::Scalar(alg.negate(t)?)),
        Operand::Duration(t) => Ok(Operand::Duration(alg.negate(t)?)),
        Operand::Instant(_) | Operand::Interval { .. } | Operand::Condition(_) => {
            Err(FilterError::unsupported(
                "-",
                operand.kind(),
                operand.kind(),
                "only numbers and durations can be negated",
            ))
        }
    }
}
