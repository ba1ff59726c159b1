//! Lowering of filter expressions into backend-native conditions.
//!
//! Compilation is a recursive descent: children are compiled first, then the
//! operator rule is chosen from the runtime kinds of the compiled children
//! (see [`crate::compute`]). A backend only supplies leaf lowering and the
//! primitive [`Algebra`].
//!
//! Two backends ship with the crate:
//!
//! - [`PostgresBackend`] emits parameterized SQL for the query layer.
//! - [`EntityEvaluator`] evaluates directly against an in-memory [`Entity`]
//!   for live subscription matching.
//!
//! [`Entity`]: sensorthings_types::Entity

pub mod memory;
pub mod postgres;

pub use memory::{EntityEvaluator, Truth, evaluate};
pub use postgres::{
    ColumnMapping, ColumnResolver, DefaultColumns, NativeCondition, PostgresBackend, SqlCondition,
    SqlField, SqlParam, SqlType, TimestampType,
};

use crate::compute::{self, Algebra, AlgebraOperand, Operand};
use crate::error::{FilterError, Result};
use crate::expr::{Constant, Expression, LogicalOp, PropertyPath};
use sensorthings_types::ValueKind;

/// A compilation target.
pub trait Backend: Algebra + Sized {
    /// Lower a literal.
    fn constant(&self, constant: &Constant) -> Result<AlgebraOperand<Self>>;

    /// Lower a property reference.
    fn property(&self, path: &PropertyPath) -> Result<AlgebraOperand<Self>>;
}

/// Compile any expression node into an operand.
pub fn compile_operand<B: Backend>(backend: &B, expr: &Expression) -> Result<AlgebraOperand<B>> {
    match expr {
        Expression::Constant(c) => backend.constant(c),
        Expression::Property(path) => backend.property(path),
        Expression::Negate(inner) => compute::negate(backend, &compile_operand(backend, inner)?),
        Expression::Not(inner) => {
            let inner = compile_condition(backend, inner)?;
            Ok(Operand::Condition(backend.not(inner)))
        }
        Expression::Arithmetic { op, left, right } => {
            let left = compile_operand(backend, left)?;
            let right = compile_operand(backend, right)?;
            compute::arithmetic(backend, *op, &left, &right)
        }
        Expression::Compare { op, left, right } => {
            let left = compile_operand(backend, left)?;
            let right = compile_operand(backend, right)?;
            Ok(Operand::Condition(compute::compare(
                backend, *op, &left, &right,
            )?))
        }
        Expression::Logical { op, left, right } => {
            let left = compile_condition(backend, left)?;
            let right = compile_condition(backend, right)?;
            Ok(Operand::Condition(match op {
                LogicalOp::And => backend.and(left, right),
                LogicalOp::Or => backend.or(left, right),
            }))
        }
    }
}

/// Compile an expression that must produce a truth value.
///
/// Scalar operands (a boolean property or literal) are accepted through
/// [`Algebra::truthy`]; temporal operands are rejected.
pub fn compile_condition<B: Backend>(backend: &B, expr: &Expression) -> Result<B::Condition> {
    match compile_operand(backend, expr)? {
        Operand::Condition(c) => Ok(c),
        Operand::Scalar(t) => backend.truthy(&t),
        Operand::Null => Ok(backend.literal(None)),
        other @ (Operand::Instant(_) | Operand::Duration(_) | Operand::Interval { .. }) => {
            Err(FilterError::unsupported(
                "filter",
                other.kind(),
                ValueKind::Boolean,
                "a filter must evaluate to a boolean",
            ))
        }
    }
}
