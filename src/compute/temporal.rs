//! Comparison and interval-relation rules.
//!
//! Each operand-kind pair has its own row set. Instants are not promoted to
//! degenerate intervals: the instant rows below are the reductions filters
//! have always been evaluated with, and they differ from a textbook interval
//! algebra at the boundaries (an instant `overlaps` an interval it starts,
//! for example).

use super::{Algebra, AlgebraOperand, Cmp, Operand};
use crate::error::{FilterError, Result};
use crate::expr::ComparisonOp;
use sensorthings_types::ValueKind;

/// Apply a comparison operator to two compiled operands.
pub fn compare<A: Algebra>(
    alg: &A,
    op: ComparisonOp,
    left: &AlgebraOperand<A>,
    right: &AlgebraOperand<A>,
) -> Result<A::Condition> {
    use Operand as O;

    if op == ComparisonOp::Contains && !matches!(left, O::Interval { .. } | O::Null) {
        return Err(contains_error(left.kind(), right.kind()));
    }

    match left {
        O::Instant(t1) => match right {
            O::Instant(t2) => instant_instant(alg, op, t1, t2),
            O::Interval { start, end } => instant_interval(alg, op, t1, start, end),
            O::Null => Ok(null_comparison(alg, op, Some(t1))),
            O::Scalar(_) | O::Duration(_) | O::Condition(_) => Err(mismatch(op, left, right)),
        },
        O::Interval { start: s1, end: e1 } => match right {
            O::Instant(t2) => interval_instant(alg, op, s1, e1, t2),
            O::Interval { start: s2, end: e2 } => interval_interval(alg, op, s1, e1, s2, e2),
            O::Null => Ok(null_comparison(alg, op, Some(s1))),
            O::Scalar(_) | O::Duration(_) | O::Condition(_) => Err(mismatch(op, left, right)),
        },
        O::Duration(a) => match right {
            O::Duration(b) => ordered(alg, op, ValueKind::Duration, a, b),
            O::Null => Ok(null_comparison(alg, op, Some(a))),
            O::Scalar(_) | O::Instant(_) | O::Interval { .. } | O::Condition(_) => {
                Err(mismatch(op, left, right))
            }
        },
        O::Scalar(a) => match right {
            O::Scalar(b) => ordered(alg, op, ValueKind::Scalar, a, b),
            O::Null => Ok(null_comparison(alg, op, Some(a))),
            O::Duration(_) | O::Instant(_) | O::Interval { .. } | O::Condition(_) => {
                Err(mismatch(op, left, right))
            }
        },
        O::Null => match right {
            O::Null => Ok(null_comparison(alg, op, None)),
            O::Scalar(t) | O::Instant(t) | O::Duration(t) | O::Interval { start: t, .. } => {
                Ok(null_comparison(alg, op, Some(t)))
            }
            O::Condition(_) => Err(mismatch(op, left, right)),
        },
        O::Condition(_) => Err(mismatch(op, left, right)),
    }
}

fn contains_error(left: ValueKind, right: ValueKind) -> FilterError {
    FilterError::unsupported(
        ComparisonOp::Contains.token(),
        left,
        right,
        "first parameter of contains must be an interval",
    )
}

fn mismatch<T, C>(op: ComparisonOp, left: &Operand<T, C>, right: &Operand<T, C>) -> FilterError {
    FilterError::unsupported(
        op.token(),
        left.kind(),
        right.kind(),
        format!("can not compare between {} and {}", left.kind(), right.kind()),
    )
}

/// `x = null` tests for null; every other operator against null is unknown.
fn null_comparison<A: Algebra>(alg: &A, op: ComparisonOp, other: Option<&A::Term>) -> A::Condition {
    match (op, other) {
        (ComparisonOp::Equal, Some(t)) => alg.is_null(t),
        (ComparisonOp::Equal, None) => alg.literal(Some(true)),
        (ComparisonOp::NotEqual, Some(t)) => alg.not(alg.is_null(t)),
        (ComparisonOp::NotEqual, None) => alg.literal(Some(false)),
        _ => alg.literal(None),
    }
}

/// Plain ordering between two terms of the same non-temporal-span kind.
fn ordered<A: Algebra>(
    alg: &A,
    op: ComparisonOp,
    kind: ValueKind,
    a: &A::Term,
    b: &A::Term,
) -> Result<A::Condition> {
    let cmp = match op {
        ComparisonOp::Equal => Cmp::Eq,
        ComparisonOp::NotEqual => Cmp::Ne,
        ComparisonOp::GreaterThan => Cmp::Gt,
        ComparisonOp::GreaterEqual => Cmp::Ge,
        ComparisonOp::LessThan => Cmp::Lt,
        ComparisonOp::LessEqual => Cmp::Le,
        ComparisonOp::After
        | ComparisonOp::Before
        | ComparisonOp::Contains
        | ComparisonOp::Meets
        | ComparisonOp::Overlaps
        | ComparisonOp::Starts
        | ComparisonOp::Finishes => {
            return Err(FilterError::unsupported(
                op.token(),
                kind,
                kind,
                "interval relations need instant or interval operands",
            ));
        }
    };
    Ok(alg.cmp(cmp, a, b))
}

fn instant_instant<A: Algebra>(
    alg: &A,
    op: ComparisonOp,
    t1: &A::Term,
    t2: &A::Term,
) -> Result<A::Condition> {
    use ComparisonOp as Op;
    Ok(match op {
        Op::Equal => alg.cmp(Cmp::Eq, t1, t2),
        Op::NotEqual => alg.cmp(Cmp::Ne, t1, t2),
        Op::GreaterThan | Op::After => alg.cmp(Cmp::Gt, t1, t2),
        Op::GreaterEqual => alg.cmp(Cmp::Ge, t1, t2),
        Op::LessThan | Op::Before => alg.cmp(Cmp::Lt, t1, t2),
        Op::LessEqual => alg.cmp(Cmp::Le, t1, t2),
        Op::Contains => return Err(contains_error(ValueKind::Instant, ValueKind::Instant)),
        // A point has no span: meeting, overlapping, starting and finishing
        // another point all mean coinciding with it.
        Op::Meets | Op::Overlaps | Op::Starts | Op::Finishes => alg.cmp(Cmp::Eq, t1, t2),
    })
}

fn instant_interval<A: Algebra>(
    alg: &A,
    op: ComparisonOp,
    t1: &A::Term,
    s2: &A::Term,
    e2: &A::Term,
) -> Result<A::Condition> {
    use ComparisonOp as Op;
    let equal = |alg: &A| alg.and(alg.cmp(Cmp::Eq, t1, s2), alg.cmp(Cmp::Eq, t1, e2));
    Ok(match op {
        Op::Equal => equal(alg),
        Op::NotEqual => alg.not(equal(alg)),
        Op::GreaterThan | Op::After => alg.and(alg.cmp(Cmp::Ge, t1, e2), alg.cmp(Cmp::Gt, t1, s2)),
        Op::GreaterEqual => alg.cmp(Cmp::Ge, t1, e2),
        Op::LessThan | Op::Before => alg.cmp(Cmp::Lt, t1, s2),
        Op::LessEqual => alg.cmp(Cmp::Le, t1, s2),
        Op::Contains => return Err(contains_error(ValueKind::Instant, ValueKind::Interval)),
        Op::Meets => alg.or(alg.cmp(Cmp::Eq, t1, s2), alg.cmp(Cmp::Eq, t1, e2)),
        Op::Overlaps => alg.or(
            alg.cmp(Cmp::Eq, t1, s2),
            alg.and(alg.cmp(Cmp::Le, s2, t1), alg.cmp(Cmp::Gt, e2, t1)),
        ),
        Op::Starts => alg.cmp(Cmp::Eq, t1, s2),
        Op::Finishes => alg.cmp(Cmp::Eq, t1, e2),
    })
}

fn interval_instant<A: Algebra>(
    alg: &A,
    op: ComparisonOp,
    s1: &A::Term,
    e1: &A::Term,
    t2: &A::Term,
) -> Result<A::Condition> {
    use ComparisonOp as Op;
    let equal = |alg: &A| alg.and(alg.cmp(Cmp::Eq, s1, t2), alg.cmp(Cmp::Eq, e1, t2));
    Ok(match op {
        Op::Equal => equal(alg),
        Op::NotEqual => alg.not(equal(alg)),
        Op::GreaterThan | Op::After => alg.cmp(Cmp::Gt, s1, t2),
        Op::GreaterEqual => alg.cmp(Cmp::Ge, s1, t2),
        Op::LessThan | Op::Before => alg.cmp(Cmp::Lt, e1, t2),
        Op::LessEqual => alg.cmp(Cmp::Le, e1, t2),
        Op::Contains => alg.and(alg.cmp(Cmp::Le, s1, t2), alg.cmp(Cmp::Gt, e1, t2)),
        Op::Meets => alg.or(alg.cmp(Cmp::Eq, s1, t2), alg.cmp(Cmp::Eq, e1, t2)),
        Op::Overlaps => alg.or(
            alg.cmp(Cmp::Eq, s1, t2),
            alg.and(alg.cmp(Cmp::Le, s1, t2), alg.cmp(Cmp::Gt, e1, t2)),
        ),
        Op::Starts => alg.cmp(Cmp::Eq, s1, t2),
        Op::Finishes => alg.cmp(Cmp::Eq, e1, t2),
    })
}

fn interval_interval<A: Algebra>(
    alg: &A,
    op: ComparisonOp,
    s1: &A::Term,
    e1: &A::Term,
    s2: &A::Term,
    e2: &A::Term,
) -> Result<A::Condition> {
    use ComparisonOp as Op;
    let equal = |alg: &A| alg.and(alg.cmp(Cmp::Eq, s1, s2), alg.cmp(Cmp::Eq, e1, e2));
    Ok(match op {
        Op::Equal => equal(alg),
        Op::NotEqual => alg.not(equal(alg)),
        Op::GreaterThan | Op::After => alg.and(alg.cmp(Cmp::Ge, s1, e2), alg.cmp(Cmp::Gt, s1, s2)),
        Op::GreaterEqual => alg.cmp(Cmp::Ge, s1, e2),
        Op::LessThan | Op::Before => alg.and(alg.cmp(Cmp::Le, e1, s2), alg.cmp(Cmp::Lt, e1, e2)),
        Op::LessEqual => alg.cmp(Cmp::Le, e1, s2),
        Op::Contains => alg.and(alg.cmp(Cmp::Le, s1, s2), alg.cmp(Cmp::Ge, e1, e2)),
        Op::Meets => alg.or(alg.cmp(Cmp::Eq, s1, e2), alg.cmp(Cmp::Eq, e1, s2)),
        Op::Overlaps => alg.or(
            alg.cmp(Cmp::Eq, s1, s2),
            alg.and(alg.cmp(Cmp::Lt, s1, e2), alg.cmp(Cmp::Gt, e1, s2)),
        ),
        Op::Starts => alg.cmp(Cmp::Eq, s1, s2),
        Op::Finishes => alg.cmp(Cmp::Eq, e1, e2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::ArithmeticShape;
    use crate::expr::ArithmeticOp;

    /// Renders the rule a comparison reduces to, over named bounds.
    struct Symbolic;

    impl Algebra for Symbolic {
        type Term = &'static str;
        type Condition = String;

        fn cmp(&self, op: Cmp, left: &&'static str, right: &&'static str) -> String {
            format!("{left}{}{right}", op.sql())
        }

        fn is_null(&self, term: &&'static str) -> String {
            format!("{term} null")
        }

        fn literal(&self, value: Option<bool>) -> String {
            format!("{value:?}")
        }

        fn and(&self, left: String, right: String) -> String {
            format!("({left} and {right})")
        }

        fn or(&self, left: String, right: String) -> String {
            format!("({left} or {right})")
        }

        fn not(&self, inner: String) -> String {
            format!("not {inner}")
        }

        fn truthy(&self, term: &&'static str) -> Result<String> {
            Ok(term.to_string())
        }

        fn arithmetic(
            &self,
            _op: ArithmeticOp,
            _shape: ArithmeticShape,
            left: &&'static str,
            _right: &&'static str,
        ) -> Result<&'static str> {
            Ok(left)
        }

        fn negate(&self, term: &&'static str) -> Result<&'static str> {
            Ok(term)
        }
    }

    type Op = Operand<&'static str, String>;

    fn rule(op: ComparisonOp, left: &Op, right: &Op) -> String {
        compare(&Symbolic, op, left, right).unwrap()
    }

    #[test]
    fn test_instant_interval_rows() {
        let t = Op::Instant("t1");
        let i = Op::Interval { start: "s2", end: "e2" };
        assert_eq!(rule(ComparisonOp::GreaterThan, &t, &i), "(t1>=e2 and t1>s2)");
        assert_eq!(rule(ComparisonOp::Before, &t, &i), "t1<s2");
        assert_eq!(rule(ComparisonOp::Equal, &t, &i), "(t1=s2 and t1=e2)");
        assert_eq!(
            rule(ComparisonOp::Overlaps, &t, &i),
            "(t1=s2 or (s2<=t1 and e2>t1))"
        );
        assert_eq!(rule(ComparisonOp::NotEqual, &t, &i), "not (t1=s2 and t1=e2)");
    }

    #[test]
    fn test_interval_instant_rows() {
        let i = Op::Interval { start: "s1", end: "e1" };
        let t = Op::Instant("t2");
        let rows = [
            (ComparisonOp::GreaterThan, "s1>t2"),
            (ComparisonOp::After, "s1>t2"),
            (ComparisonOp::GreaterEqual, "s1>=t2"),
            (ComparisonOp::LessThan, "e1<t2"),
            (ComparisonOp::Before, "e1<t2"),
            (ComparisonOp::LessEqual, "e1<=t2"),
            (ComparisonOp::Contains, "(s1<=t2 and e1>t2)"),
            (ComparisonOp::Meets, "(s1=t2 or e1=t2)"),
            (ComparisonOp::Overlaps, "(s1=t2 or (s1<=t2 and e1>t2))"),
            (ComparisonOp::Starts, "s1=t2"),
            (ComparisonOp::Finishes, "e1=t2"),
            (ComparisonOp::Equal, "(s1=t2 and e1=t2)"),
            (ComparisonOp::NotEqual, "not (s1=t2 and e1=t2)"),
        ];
        for (op, expected) in rows {
            assert_eq!(rule(op, &i, &t), expected, "{op:?}");
        }
    }

    #[test]
    fn test_interval_interval_rows() {
        let a = Op::Interval { start: "s1", end: "e1" };
        let b = Op::Interval { start: "s2", end: "e2" };
        assert_eq!(rule(ComparisonOp::Contains, &a, &b), "(s1<=s2 and e1>=e2)");
        assert_eq!(rule(ComparisonOp::Meets, &a, &b), "(s1=e2 or e1=s2)");
        assert_eq!(rule(ComparisonOp::LessEqual, &a, &b), "e1<=s2");
        assert_eq!(rule(ComparisonOp::GreaterEqual, &a, &b), "s1>=e2");
        assert_eq!(rule(ComparisonOp::After, &a, &b), "(s1>=e2 and s1>s2)");
        assert_eq!(rule(ComparisonOp::Before, &a, &b), "(e1<=s2 and e1<e2)");
        assert_eq!(
            rule(ComparisonOp::Overlaps, &a, &b),
            "(s1=s2 or (s1<e2 and e1>s2))"
        );
    }

    #[test]
    fn test_instant_relations_collapse_to_equality() {
        let a = Op::Instant("t1");
        let b = Op::Instant("t2");
        for op in [
            ComparisonOp::Meets,
            ComparisonOp::Overlaps,
            ComparisonOp::Starts,
            ComparisonOp::Finishes,
        ] {
            assert_eq!(rule(op, &a, &b), "t1=t2");
        }
    }

    #[test]
    fn test_null_rows() {
        let x = Op::Scalar("x");
        assert_eq!(rule(ComparisonOp::Equal, &x, &Op::Null), "x null");
        assert_eq!(rule(ComparisonOp::NotEqual, &Op::Null, &x), "not x null");
        assert_eq!(rule(ComparisonOp::LessThan, &x, &Op::Null), "None");
        assert_eq!(rule(ComparisonOp::Equal, &Op::Null, &Op::Null), "Some(true)");
    }

    #[test]
    fn test_contains_rejects_every_non_interval_left() {
        let right = Op::Interval { start: "s2", end: "e2" };
        for left in [Op::Instant("t"), Op::Duration("d"), Op::Scalar("x")] {
            let err = compare(&Symbolic, ComparisonOp::Contains, &left, &right).unwrap_err();
            assert!(matches!(err, FilterError::UnsupportedOperandCombination { .. }));
        }
    }

    #[test]
    fn test_mismatched_kinds() {
        let err = compare(
            &Symbolic,
            ComparisonOp::Equal,
            &Op::Duration("d"),
            &Op::Interval { start: "s", end: "e" },
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot apply '=' to duration and interval: can not compare between duration and interval"
        );
    }
}
