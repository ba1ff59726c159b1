//! Backend-agnostic filter expression tree.
//!
//! Trees are produced by an upstream filter parser and are immutable once
//! built. Share them behind an `Arc` between the query layer and any number
//! of live subscriptions.

mod ops;

pub use ops::{ArithmeticOp, ComparisonOp, LogicalOp};

use sensorthings_types::{
    EntityProperty, Id, Instant, Interval, NavigationProperty, Property, TimeDuration, Value,
    ValueKind,
};
use std::fmt;

/// A literal operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Bool(bool),
    /// Exact integer; entity ids stay here so they never round through `f64`.
    Integer(i64),
    Number(f64),
    Text(String),
    Instant(Instant),
    Duration(TimeDuration),
    Interval(Interval),
}

impl Constant {
    pub fn kind(&self) -> ValueKind {
        match self {
            Constant::Null => ValueKind::Null,
            Constant::Bool(_) => ValueKind::Boolean,
            Constant::Integer(_) | Constant::Number(_) | Constant::Text(_) => ValueKind::Scalar,
            Constant::Instant(_) => ValueKind::Instant,
            Constant::Duration(_) => ValueKind::Duration,
            Constant::Interval(_) => ValueKind::Interval,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Constant::Null => Value::Null,
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Integer(n) => Value::Integer(*n),
            Constant::Number(n) => Value::Number(*n),
            Constant::Text(s) => Value::Text(s.clone()),
            Constant::Instant(i) => Value::Instant(*i),
            Constant::Duration(d) => Value::Duration(*d),
            Constant::Interval(i) => Value::Interval(*i),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Null => f.write_str("null"),
            Constant::Bool(b) => write!(f, "{b}"),
            Constant::Integer(n) => write!(f, "{n}"),
            Constant::Number(n) => write!(f, "{n}"),
            Constant::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Constant::Instant(i) => i.fmt(f),
            Constant::Duration(d) => write!(f, "duration'{d}'"),
            Constant::Interval(i) => i.fmt(f),
        }
    }
}

impl From<bool> for Constant {
    fn from(v: bool) -> Self {
        Constant::Bool(v)
    }
}

impl From<f64> for Constant {
    fn from(v: f64) -> Self {
        Constant::Number(v)
    }
}

impl From<i64> for Constant {
    fn from(v: i64) -> Self {
        Constant::Integer(v)
    }
}

impl From<i32> for Constant {
    fn from(v: i32) -> Self {
        Constant::Integer(i64::from(v))
    }
}

impl From<&str> for Constant {
    fn from(v: &str) -> Self {
        Constant::Text(v.to_string())
    }
}

impl From<String> for Constant {
    fn from(v: String) -> Self {
        Constant::Text(v)
    }
}

impl From<&Id> for Constant {
    fn from(id: &Id) -> Self {
        match id {
            Id::Long(v) => Constant::Integer(*v),
            Id::Text(s) => Constant::Text(s.clone()),
        }
    }
}

impl From<Instant> for Constant {
    fn from(v: Instant) -> Self {
        Constant::Instant(v)
    }
}

impl From<TimeDuration> for Constant {
    fn from(v: TimeDuration) -> Self {
        Constant::Duration(v)
    }
}

impl From<Interval> for Constant {
    fn from(v: Interval) -> Self {
        Constant::Interval(v)
    }
}

/// Navigation hops followed by a final property, e.g. `Datastream/@iot.id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath(Vec<Property>);

impl PropertyPath {
    /// # Panics
    ///
    /// Panics if `segments` is empty.
    pub fn new(segments: Vec<Property>) -> Self {
        assert!(!segments.is_empty(), "property path must not be empty");
        Self(segments)
    }

    pub fn single(property: impl Into<Property>) -> Self {
        Self(vec![property.into()])
    }

    /// `navigation/.../property`
    pub fn through(navigation: &[NavigationProperty], property: EntityProperty) -> Self {
        let mut segments: Vec<Property> = navigation.iter().copied().map(Property::from).collect();
        segments.push(property.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[Property] {
        &self.0
    }

    pub fn last(&self) -> Property {
        self.0[self.0.len() - 1]
    }

    /// The property itself when the path has no navigation hops.
    pub fn as_local(&self) -> Option<EntityProperty> {
        match self.0.as_slice() {
            [Property::Entity(p)] => Some(*p),
            _ => None,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self.last() {
            Property::Entity(p) => p.value_kind(),
            Property::Navigation(_) => ValueKind::Scalar,
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(segment.wire_name())?;
        }
        Ok(())
    }
}

/// A node of the filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant(Constant),
    Property(PropertyPath),
    Negate(Box<Expression>),
    Not(Box<Expression>),
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Compare {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn constant(value: impl Into<Constant>) -> Self {
        Expression::Constant(value.into())
    }

    pub fn null() -> Self {
        Expression::Constant(Constant::Null)
    }

    pub fn property(property: impl Into<Property>) -> Self {
        Expression::Property(PropertyPath::single(property))
    }

    pub fn path(path: PropertyPath) -> Self {
        Expression::Property(path)
    }

    pub fn compare(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Expression::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn arithmetic(op: ArithmeticOp, left: Expression, right: Expression) -> Self {
        Expression::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn eq(left: Expression, right: Expression) -> Self {
        Self::compare(ComparisonOp::Equal, left, right)
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::Logical {
            op: LogicalOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::Logical {
            op: LogicalOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Expression) -> Self {
        Expression::Not(Box::new(inner))
    }

    pub fn negate(inner: Expression) -> Self {
        Expression::Negate(Box::new(inner))
    }

    /// Static result kind of this node.
    ///
    /// Property kinds come from their declaration; the runtime value of a
    /// property may still differ (an instant-valued `phenomenonTime`), which
    /// is why backends dispatch on the compiled operands, not on this.
    pub fn result_kind(&self) -> ValueKind {
        match self {
            Expression::Constant(c) => c.kind(),
            Expression::Property(path) => path.kind(),
            Expression::Negate(inner) => inner.result_kind(),
            Expression::Not(_) | Expression::Compare { .. } | Expression::Logical { .. } => {
                ValueKind::Boolean
            }
            Expression::Arithmetic { left, right, .. } => {
                use ValueKind as K;
                match (left.result_kind(), right.result_kind()) {
                    (K::Null, _) | (_, K::Null) => K::Null,
                    (K::Instant, K::Duration) | (K::Duration, K::Instant) => K::Instant,
                    (K::Instant, K::Instant) => K::Duration,
                    (K::Duration, K::Duration | K::Scalar) | (K::Scalar, K::Duration) => {
                        K::Duration
                    }
                    (K::Interval, K::Duration) => K::Interval,
                    _ => K::Scalar,
                }
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(c) => c.fmt(f),
            Expression::Property(p) => p.fmt(f),
            Expression::Negate(inner) => write!(f, "-({inner})"),
            Expression::Not(inner) => write!(f, "not ({inner})"),
            Expression::Arithmetic { op, left, right } => write!(f, "({left} {op} {right})"),
            Expression::Compare { op, left, right } => write!(f, "({left} {op} {right})"),
            Expression::Logical { op, left, right } => write!(f, "({left} {op} {right})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_kind_of_temporal_arithmetic() {
        let t = Expression::property(EntityProperty::ResultTime);
        let d = Expression::constant(TimeDuration::hours(1));
        assert_eq!(
            Expression::arithmetic(ArithmeticOp::Add, t.clone(), d.clone()).result_kind(),
            ValueKind::Instant
        );
        assert_eq!(
            Expression::arithmetic(ArithmeticOp::Sub, t.clone(), t.clone()).result_kind(),
            ValueKind::Duration
        );
        assert_eq!(
            Expression::arithmetic(
                ArithmeticOp::Add,
                Expression::property(EntityProperty::PhenomenonTime),
                d
            )
            .result_kind(),
            ValueKind::Interval
        );
        assert_eq!(
            Expression::eq(t, Expression::null()).result_kind(),
            ValueKind::Boolean
        );
    }

    #[test]
    fn test_display() {
        let expr = Expression::and(
            Expression::eq(
                Expression::path(PropertyPath::through(
                    &[NavigationProperty::Datastream],
                    EntityProperty::Id,
                )),
                Expression::constant(5),
            ),
            Expression::not(Expression::compare(
                ComparisonOp::LessThan,
                Expression::property(EntityProperty::Name),
                Expression::constant("it's"),
            )),
        );
        assert_eq!(
            expr.to_string(),
            "((Datastream/@iot.id = 5) and not ((name < 'it''s')))"
        );
    }

    #[test]
    fn test_local_path() {
        assert_eq!(
            PropertyPath::single(EntityProperty::Name).as_local(),
            Some(EntityProperty::Name)
        );
        assert_eq!(
            PropertyPath::through(&[NavigationProperty::Thing], EntityProperty::Name).as_local(),
            None
        );
    }
}
