//! Operator rules shared by every evaluation strategy.
//!
//! The rule tables in [`temporal`] and [`arithmetic`] decide, per operand
//! kind pair, which primitive comparisons and combinations an operator
//! reduces to. They are written once against the [`Algebra`] trait; the SQL
//! compiler and the in-memory evaluator each supply an algebra, so the two
//! cannot drift apart on boundary cases.

pub mod arithmetic;
pub mod operand;
pub mod temporal;

pub use arithmetic::{arithmetic, negate};
pub use operand::Operand;
pub use temporal::compare;

use crate::error::Result;
use crate::expr::ArithmeticOp;
use std::cmp::Ordering;

/// Primitive ordering comparison between two terms of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cmp {
    pub fn sql(&self) -> &'static str {
        match self {
            Cmp::Eq => "=",
            Cmp::Ne => "<>",
            Cmp::Lt => "<",
            Cmp::Le => "<=",
            Cmp::Gt => ">",
            Cmp::Ge => ">=",
        }
    }

    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Cmp::Eq => ordering == Ordering::Equal,
            Cmp::Ne => ordering != Ordering::Equal,
            Cmp::Lt => ordering == Ordering::Less,
            Cmp::Le => ordering != Ordering::Greater,
            Cmp::Gt => ordering == Ordering::Greater,
            Cmp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Operand kinds of an arithmetic primitive, after the rule table has
/// normalized their order (the instant always comes first, the duration
/// before a scalar factor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticShape {
    Numbers,
    InstantDuration,
    InstantInstant,
    DurationDuration,
    DurationScalar,
}

/// Primitive operations a backend provides to the rule tables.
pub trait Algebra {
    type Term: Clone;
    type Condition;

    fn cmp(&self, op: Cmp, left: &Self::Term, right: &Self::Term) -> Self::Condition;

    fn is_null(&self, term: &Self::Term) -> Self::Condition;

    /// `Some(b)` for a constant truth value, `None` for unknown.
    fn literal(&self, value: Option<bool>) -> Self::Condition;

    fn and(&self, left: Self::Condition, right: Self::Condition) -> Self::Condition;

    fn or(&self, left: Self::Condition, right: Self::Condition) -> Self::Condition;

    fn not(&self, inner: Self::Condition) -> Self::Condition;

    /// Use a scalar term (a boolean property, say) as a condition.
    fn truthy(&self, term: &Self::Term) -> Result<Self::Condition>;

    fn arithmetic(
        &self,
        op: ArithmeticOp,
        shape: ArithmeticShape,
        left: &Self::Term,
        right: &Self::Term,
    ) -> Result<Self::Term>;

    fn negate(&self, term: &Self::Term) -> Result<Self::Term>;
}

/// Operand type of an algebra.
pub type AlgebraOperand<A> = Operand<<A as Algebra>::Term, <A as Algebra>::Condition>;
