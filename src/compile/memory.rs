//! In-memory evaluation of filters against a changed entity.
//!
//! Uses SQL null semantics so a filter gives the same answer here as it
//! would in the store: comparisons involving a missing value are
//! [`Truth::Unknown`], and an unknown filter does not match.

use super::{Backend, compile_condition};
use crate::compute::{Algebra, AlgebraOperand, ArithmeticShape, Cmp, Operand};
use crate::error::{FilterError, Result};
use crate::expr::{ArithmeticOp, Constant, Expression, PropertyPath};
use sensorthings_types::{Entity, EntityProperty, Property, Value, ValueKind};
use std::cmp::Ordering;

/// Three-valued truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    pub fn is_true(self) -> bool {
        self == Truth::True
    }

    pub fn and(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::False, _) | (_, Truth::False) => Truth::False,
            (Truth::True, Truth::True) => Truth::True,
            _ => Truth::Unknown,
        }
    }

    pub fn or(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::True, _) | (_, Truth::True) => Truth::True,
            (Truth::False, Truth::False) => Truth::False,
            _ => Truth::Unknown,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Truth {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }
}

impl From<bool> for Truth {
    fn from(b: bool) -> Self {
        if b { Truth::True } else { Truth::False }
    }
}

impl From<Option<bool>> for Truth {
    fn from(b: Option<bool>) -> Self {
        b.map_or(Truth::Unknown, Truth::from)
    }
}

/// Evaluates filters against one entity.
///
/// Plain properties and single-valued navigation ids (`Thing/@iot.id`) are
/// read from the entity. Any other navigation path fails with
/// [`FilterError::RequiresStore`].
#[derive(Debug, Clone, Copy)]
pub struct EntityEvaluator<'a> {
    entity: &'a Entity,
}

impl<'a> EntityEvaluator<'a> {
    pub fn new(entity: &'a Entity) -> Self {
        Self { entity }
    }

    pub fn evaluate(&self, expr: &Expression) -> Result<Truth> {
        compile_condition(self, expr)
    }
}

/// `true` only when the filter is definitely satisfied.
pub fn evaluate(expr: &Expression, entity: &Entity) -> Result<bool> {
    Ok(EntityEvaluator::new(entity).evaluate(expr)?.is_true())
}

fn operand(value: Value) -> Operand<Value, Truth> {
    match value {
        Value::Null => Operand::Null,
        Value::Instant(_) => Operand::Instant(value),
        Value::Duration(_) => Operand::Duration(value),
        Value::Interval(i) => Operand::Interval {
            start: Value::Instant(i.start()),
            end: Value::Instant(i.end()),
        },
        Value::Json(serde_json::Value::Null) => Operand::Null,
        Value::Bool(_) | Value::Integer(_) | Value::Number(_) | Value::Text(_) | Value::Json(_) => {
            Operand::Scalar(value)
        }
    }
}

/// Unwrap JSON scalars so they compare like native values.
fn normalize(value: &Value) -> Value {
    match value {
        Value::Json(serde_json::Value::Bool(b)) => Value::Bool(*b),
        Value::Json(serde_json::Value::Number(n)) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map_or(Value::Null, Value::Number),
        },
        Value::Json(serde_json::Value::String(s)) => Value::Text(s.clone()),
        Value::Json(serde_json::Value::Null) => Value::Null,
        other => other.clone(),
    }
}

fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (normalize(left), normalize(right)) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(&b)),
        (Value::Integer(a), Value::Number(b)) => (a as f64).partial_cmp(&b),
        (Value::Number(a), Value::Integer(b)) => a.partial_cmp(&(b as f64)),
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(&b),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(&b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(&b)),
        (Value::Instant(a), Value::Instant(b)) => Some(a.cmp(&b)),
        (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(&b)),
        (Value::Json(a), Value::Json(b)) => (a == b).then_some(Ordering::Equal),
        _ => None,
    }
}

/// Arithmetic runs on `f64`; exactness only matters for comparisons.
fn widen(value: Value) -> Value {
    match value {
        Value::Integer(n) => Value::Number(n as f64),
        other => other,
    }
}

impl Algebra for EntityEvaluator<'_> {
    type Term = Value;
    type Condition = Truth;

    fn cmp(&self, op: Cmp, left: &Value, right: &Value) -> Truth {
        match ordering(left, right) {
            Some(o) => op.holds(o).into(),
            None => Truth::Unknown,
        }
    }

    fn is_null(&self, term: &Value) -> Truth {
        normalize(term).is_null().into()
    }

    fn literal(&self, value: Option<bool>) -> Truth {
        value.into()
    }

    fn and(&self, left: Truth, right: Truth) -> Truth {
        left.and(right)
    }

    fn or(&self, left: Truth, right: Truth) -> Truth {
        left.or(right)
    }

    fn not(&self, inner: Truth) -> Truth {
        inner.not()
    }

    fn truthy(&self, term: &Value) -> Result<Truth> {
        match normalize(term) {
            Value::Bool(b) => Ok(b.into()),
            Value::Null => Ok(Truth::Unknown),
            other => Err(FilterError::unsupported(
                "filter",
                other.kind(),
                ValueKind::Boolean,
                "value is not a boolean",
            )),
        }
    }

    fn arithmetic(
        &self,
        op: ArithmeticOp,
        shape: ArithmeticShape,
        left: &Value,
        right: &Value,
    ) -> Result<Value> {
        let invalid = || FilterError::InvalidArithmetic {
            op: op.token().to_string(),
            left: left.kind(),
            right: right.kind(),
        };
        let result = match (shape, widen(normalize(left)), widen(normalize(right))) {
            (_, Value::Null, _) | (_, _, Value::Null) => Value::Null,
            (ArithmeticShape::Numbers, Value::Number(a), Value::Number(b)) => match op {
                ArithmeticOp::Add => Value::Number(a + b),
                ArithmeticOp::Sub => Value::Number(a - b),
                ArithmeticOp::Mul => Value::Number(a * b),
                // Division by zero yields null, like the NULLIF guard in SQL.
                ArithmeticOp::Div if b == 0.0 => Value::Null,
                ArithmeticOp::Div => Value::Number(a / b),
                ArithmeticOp::Mod if b == 0.0 => Value::Null,
                ArithmeticOp::Mod => Value::Number(a % b),
            },
            (ArithmeticShape::InstantDuration, Value::Instant(t), Value::Duration(d)) => {
                let shifted = match op {
                    ArithmeticOp::Add => t.checked_add(d),
                    ArithmeticOp::Sub => t.checked_sub(d),
                    ArithmeticOp::Mul | ArithmeticOp::Div | ArithmeticOp::Mod => None,
                };
                Value::Instant(shifted.ok_or_else(invalid)?)
            }
            (ArithmeticShape::InstantInstant, Value::Instant(a), Value::Instant(b)) => {
                Value::Duration(a.since(&b))
            }
            (ArithmeticShape::DurationDuration, Value::Duration(a), Value::Duration(b)) => match op {
                ArithmeticOp::Add => Value::Duration(a.checked_add(b).ok_or_else(invalid)?),
                ArithmeticOp::Sub => Value::Duration(a.checked_sub(b).ok_or_else(invalid)?),
                ArithmeticOp::Mul | ArithmeticOp::Div | ArithmeticOp::Mod => return Err(invalid()),
            },
            (ArithmeticShape::DurationScalar, Value::Duration(d), Value::Number(n)) => {
                let factor = match op {
                    ArithmeticOp::Mul => n,
                    ArithmeticOp::Div if n == 0.0 => return Ok(Value::Null),
                    ArithmeticOp::Div => 1.0 / n,
                    ArithmeticOp::Add | ArithmeticOp::Sub | ArithmeticOp::Mod => {
                        return Err(invalid());
                    }
                };
                Value::Duration(d.mul_f64(factor).ok_or_else(invalid)?)
            }
            _ => return Err(invalid()),
        };
        Ok(result)
    }

    fn negate(&self, term: &Value) -> Result<Value> {
        match normalize(term) {
            Value::Integer(n) => n.checked_neg().map(Value::Integer).ok_or_else(|| {
                FilterError::InvalidArithmetic {
                    op: "-".to_string(),
                    left: ValueKind::Scalar,
                    right: ValueKind::Scalar,
                }
            }),
            Value::Number(n) => Ok(Value::Number(-n)),
            Value::Duration(d) => Ok(Value::Duration(-d)),
            Value::Null => Ok(Value::Null),
            other => Err(FilterError::unsupported(
                "-",
                other.kind(),
                other.kind(),
                "only numbers and durations can be negated",
            )),
        }
    }
}

impl Backend for EntityEvaluator<'_> {
    fn constant(&self, constant: &Constant) -> Result<AlgebraOperand<Self>> {
        Ok(operand(constant.to_value()))
    }

    fn property(&self, path: &PropertyPath) -> Result<AlgebraOperand<Self>> {
        let value = match path.segments() {
            [Property::Entity(p)] => self.entity.get(*p),
            [Property::Navigation(nav), Property::Entity(p)]
                if !nav.is_set() && *p == EntityProperty::Id =>
            {
                match self.entity.link(*nav) {
                    Some(id) => Some(Value::from(id)),
                    None => return Err(FilterError::RequiresStore(path.to_string())),
                }
            }
            _ => return Err(FilterError::RequiresStore(path.to_string())),
        };
        Ok(operand(value.unwrap_or(Value::Null)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ComparisonOp;
    use sensorthings_types::{EntityType, Instant, Interval, NavigationProperty, TimeDuration};

    fn instant(s: &str) -> Instant {
        Instant::parse(s).unwrap()
    }

    fn interval(a: &str, b: &str) -> Interval {
        Interval::new(instant(a), instant(b)).unwrap()
    }

    fn observation() -> Entity {
        Entity::new(EntityType::Observation)
            .with_id(7)
            .with_property(EntityProperty::Result, 21.5)
            .with_property(
                EntityProperty::PhenomenonTime,
                interval("2020-01-01T00:00:00Z", "2020-01-05T00:00:00Z"),
            )
            .with_property(EntityProperty::ResultTime, instant("2020-01-05T00:00:00Z"))
            .with_link(NavigationProperty::Datastream, 5)
    }

    #[test]
    fn test_kleene_logic() {
        use Truth::*;
        assert_eq!(Unknown.and(False), False);
        assert_eq!(Unknown.and(True), Unknown);
        assert_eq!(Unknown.or(True), True);
        assert_eq!(Unknown.or(False), Unknown);
        assert_eq!(Unknown.not(), Unknown);
    }

    #[test]
    fn test_scalar_comparison() {
        let entity = observation();
        let expr = Expression::compare(
            ComparisonOp::GreaterThan,
            Expression::property(EntityProperty::Result),
            Expression::constant(20),
        );
        assert!(evaluate(&expr, &entity).unwrap());

        let expr = Expression::compare(
            ComparisonOp::LessEqual,
            Expression::property(EntityProperty::Result),
            Expression::constant(20),
        );
        assert!(!evaluate(&expr, &entity).unwrap());
    }

    #[test]
    fn test_missing_property_is_unknown() {
        let entity = observation();
        let gt = Expression::compare(
            ComparisonOp::GreaterThan,
            Expression::property(EntityProperty::Name),
            Expression::constant("a"),
        );
        let evaluator = EntityEvaluator::new(&entity);
        assert_eq!(evaluator.evaluate(&gt).unwrap(), Truth::Unknown);
        assert_eq!(
            evaluator.evaluate(&Expression::not(gt)).unwrap(),
            Truth::Unknown
        );

        let is_null = Expression::eq(Expression::property(EntityProperty::Name), Expression::null());
        assert!(evaluate(&is_null, &entity).unwrap());
    }

    #[test]
    fn test_navigation_id_from_link() {
        let entity = observation();
        let expr = Expression::eq(
            Expression::path(PropertyPath::through(
                &[NavigationProperty::Datastream],
                EntityProperty::Id,
            )),
            Expression::constant(5),
        );
        assert!(evaluate(&expr, &entity).unwrap());

        let deeper = Expression::eq(
            Expression::path(PropertyPath::through(
                &[NavigationProperty::Datastream, NavigationProperty::Thing],
                EntityProperty::Id,
            )),
            Expression::constant(1),
        );
        assert!(matches!(
            evaluate(&deeper, &entity),
            Err(FilterError::RequiresStore(_))
        ));
    }

    #[test]
    fn test_interval_property_against_instant() {
        let entity = observation();
        let contains = Expression::compare(
            ComparisonOp::Contains,
            Expression::property(EntityProperty::PhenomenonTime),
            Expression::constant(instant("2020-01-03T00:00:00Z")),
        );
        assert!(evaluate(&contains, &entity).unwrap());

        // The end bound is exclusive for containment of an instant.
        let at_end = Expression::compare(
            ComparisonOp::Contains,
            Expression::property(EntityProperty::PhenomenonTime),
            Expression::property(EntityProperty::ResultTime),
        );
        assert!(!evaluate(&at_end, &entity).unwrap());
    }

    #[test]
    fn test_instant_arithmetic_in_filter() {
        let entity = observation();
        // resultTime - 1 day = 2020-01-04
        let expr = Expression::eq(
            Expression::arithmetic(
                ArithmeticOp::Sub,
                Expression::property(EntityProperty::ResultTime),
                Expression::constant(TimeDuration::days(1)),
            ),
            Expression::constant(instant("2020-01-04T00:00:00Z")),
        );
        assert!(evaluate(&expr, &entity).unwrap());
    }

    #[test]
    fn test_temporal_filter_result_is_rejected() {
        let entity = observation();
        let err = evaluate(&Expression::property(EntityProperty::ResultTime), &entity).unwrap_err();
        assert!(matches!(
            err,
            FilterError::UnsupportedOperandCombination {
                left: ValueKind::Instant,
                ..
            }
        ));
    }

    #[test]
    fn test_division_by_zero_is_null() {
        let entity = observation();
        let expr = Expression::eq(
            Expression::arithmetic(
                ArithmeticOp::Div,
                Expression::property(EntityProperty::Result),
                Expression::constant(0),
            ),
            Expression::null(),
        );
        assert!(evaluate(&expr, &entity).unwrap());
    }

    #[test]
    fn test_duration_sum_overflow_is_an_error() {
        let huge = TimeDuration::parse("P100000000000D").unwrap();
        let sum = Expression::compare(
            ComparisonOp::GreaterThan,
            Expression::arithmetic(
                ArithmeticOp::Add,
                Expression::constant(huge),
                Expression::constant(huge),
            ),
            Expression::constant(TimeDuration::zero()),
        );
        assert!(matches!(
            evaluate(&sum, &observation()),
            Err(FilterError::InvalidArithmetic {
                left: ValueKind::Duration,
                right: ValueKind::Duration,
                ..
            })
        ));

        let difference = Expression::arithmetic(
            ArithmeticOp::Sub,
            Expression::constant(-huge),
            Expression::constant(huge),
        );
        assert!(evaluate(&Expression::eq(difference, Expression::null()), &observation()).is_err());
    }
}
