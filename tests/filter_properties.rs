//! Property-based checks of the comparison rules, run through the in-memory
//! evaluator:
//! - interval equality is symmetric
//! - on instants, `<` is the complement of `>=`
//! - SQL compilation is stable for a given expression

use chrono::DateTime;
use proptest::prelude::*;
use sensorthings_filter::{
    ComparisonOp, Entity, EntityProperty, EntityType, Expression, Instant, Interval,
    PostgresBackend, evaluate,
};

fn instant_strategy() -> impl Strategy<Value = Instant> {
    // 1970..2100, whole seconds.
    (0i64..4_102_444_800).prop_map(|secs| {
        Instant::from(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    })
}

fn interval_strategy() -> impl Strategy<Value = Interval> {
    (instant_strategy(), instant_strategy()).prop_map(|(a, b)| {
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        Interval::new(start, end).unwrap()
    })
}

fn holds(op: ComparisonOp, left: impl Into<Expression>, right: impl Into<Expression>) -> bool {
    let expr = Expression::compare(op, left.into(), right.into());
    evaluate(&expr, &Entity::new(EntityType::Observation).with_id(1)).unwrap()
}

fn lit<T: Into<sensorthings_filter::Constant>>(value: T) -> Expression {
    Expression::constant(value)
}

proptest! {
    #[test]
    fn interval_equality_is_symmetric(a in interval_strategy(), b in interval_strategy()) {
        prop_assert_eq!(
            holds(ComparisonOp::Equal, lit(a), lit(b)),
            holds(ComparisonOp::Equal, lit(b), lit(a))
        );
        prop_assert!(holds(ComparisonOp::Equal, lit(a), lit(a)));
    }

    #[test]
    fn instant_less_than_complements_greater_equal(
        t1 in instant_strategy(),
        t2 in instant_strategy(),
    ) {
        let lt = Expression::compare(ComparisonOp::LessThan, lit(t1), lit(t2));
        let not_ge = Expression::not(Expression::compare(
            ComparisonOp::GreaterEqual,
            lit(t1),
            lit(t2),
        ));
        let entity = Entity::new(EntityType::Observation);
        prop_assert_eq!(evaluate(&lt, &entity).unwrap(), evaluate(&not_ge, &entity).unwrap());
    }

    #[test]
    fn meets_is_symmetric_on_intervals(a in interval_strategy(), b in interval_strategy()) {
        prop_assert_eq!(
            holds(ComparisonOp::Meets, lit(a), lit(b)),
            holds(ComparisonOp::Meets, lit(b), lit(a))
        );
    }

    #[test]
    fn contained_instant_overlaps(i in interval_strategy(), t in instant_strategy()) {
        if holds(ComparisonOp::Contains, lit(i), lit(t)) {
            prop_assert!(holds(ComparisonOp::Overlaps, lit(i), lit(t)));
        }
    }

    #[test]
    fn compile_is_stable(t in instant_strategy(), threshold in -1.0e6f64..1.0e6) {
        let expr = Expression::and(
            Expression::compare(
                ComparisonOp::Before,
                Expression::property(EntityProperty::PhenomenonTime),
                lit(t),
            ),
            Expression::compare(
                ComparisonOp::LessEqual,
                Expression::property(EntityProperty::Result),
                lit(threshold),
            ),
        );
        let backend = PostgresBackend::new(EntityType::Observation);
        let first = backend.compile(&expr).unwrap();
        let second = backend.compile(&expr).unwrap();
        prop_assert_eq!(&first.sql, &second.sql);
        prop_assert_eq!(first.params.len(), 2);
        prop_assert_eq!(first.params, second.params);
    }
}
