use crate::error::{FilterError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Arithmetic operators of the filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithmeticOp {
    pub fn token(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
            ArithmeticOp::Mod => "%",
        }
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ArithmeticOp {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "+" => Ok(ArithmeticOp::Add),
            "-" => Ok(ArithmeticOp::Sub),
            "*" => Ok(ArithmeticOp::Mul),
            "/" => Ok(ArithmeticOp::Div),
            "%" => Ok(ArithmeticOp::Mod),
            other => Err(FilterError::UnknownOperator(other.to_string())),
        }
    }
}

/// Comparison and interval-relation operators.
///
/// The single-letter tokens name the interval relations: `a`fter,
/// `b`efore, `c`ontains, `m`eets, `o`verlaps, `s`tarts, `f`inishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    After,
    Before,
    Contains,
    Meets,
    Overlaps,
    Starts,
    Finishes,
}

impl ComparisonOp {
    pub const ALL: [ComparisonOp; 13] = [
        ComparisonOp::Equal,
        ComparisonOp::NotEqual,
        ComparisonOp::GreaterThan,
        ComparisonOp::GreaterEqual,
        ComparisonOp::LessThan,
        ComparisonOp::LessEqual,
        ComparisonOp::After,
        ComparisonOp::Before,
        ComparisonOp::Contains,
        ComparisonOp::Meets,
        ComparisonOp::Overlaps,
        ComparisonOp::Starts,
        ComparisonOp::Finishes,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterEqual => ">=",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessEqual => "<=",
            ComparisonOp::After => "a",
            ComparisonOp::Before => "b",
            ComparisonOp::Contains => "c",
            ComparisonOp::Meets => "m",
            ComparisonOp::Overlaps => "o",
            ComparisonOp::Starts => "s",
            ComparisonOp::Finishes => "f",
        }
    }

    /// Whether the operator only makes sense between temporal operands.
    pub fn is_interval_relation(&self) -> bool {
        matches!(
            self,
            ComparisonOp::After
                | ComparisonOp::Before
                | ComparisonOp::Contains
                | ComparisonOp::Meets
                | ComparisonOp::Overlaps
                | ComparisonOp::Starts
                | ComparisonOp::Finishes
        )
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ComparisonOp {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        ComparisonOp::ALL
            .into_iter()
            .find(|op| op.token() == s)
            .ok_or_else(|| FilterError::UnknownOperator(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => f.write_str("and"),
            LogicalOp::Or => f.write_str("or"),
        }
    }
}
