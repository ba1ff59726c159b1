//! PostgreSQL condition compiler.
//!
//! Produces a condition tree and its rendered text. Every literal becomes a
//! numbered bind parameter with an explicit cast; literal text never reaches
//! the SQL string.

use super::{Backend, compile_condition};
use crate::compute::{Algebra, AlgebraOperand, ArithmeticShape, Cmp, Operand};
use crate::error::{FilterError, Result};
use crate::expr::{ArithmeticOp, Constant, Expression, PropertyPath};
use sensorthings_types::{EntityProperty, EntityType, Instant, Property, ValueKind};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt::{self, Write};
use std::sync::Arc;

/// How timestamp columns are declared in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampType {
    #[default]
    WithTimeZone,
    WithoutTimeZone,
}

/// Explicit casts the compiler emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Timestamp(TimestampType),
    Interval,
}

impl SqlType {
    pub fn name(&self) -> &'static str {
        match self {
            SqlType::Timestamp(TimestampType::WithTimeZone) => "timestamptz",
            SqlType::Timestamp(TimestampType::WithoutTimeZone) => "timestamp",
            SqlType::Interval => "interval",
        }
    }
}

/// A bind parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl SqlParam {
    fn number(n: f64) -> Self {
        if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
            SqlParam::Integer(n as i64)
        } else {
            SqlParam::Float(n)
        }
    }
}

/// A value-producing SQL fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlField {
    Column(String),
    Param { index: usize, cast: Option<SqlType> },
    Null,
    Cast(Box<SqlField>, SqlType),
    /// `NULLIF(x, 0)`, guarding divisors.
    NullIfZero(Box<SqlField>),
    Binary {
        op: ArithmeticOp,
        left: Box<SqlField>,
        right: Box<SqlField>,
    },
    Negate(Box<SqlField>),
}

impl SqlField {
    /// Cast, unless the field is a parameter already bound with that type.
    pub fn cast(self, ty: SqlType) -> SqlField {
        match self {
            SqlField::Param { cast: Some(c), .. } if c == ty => self,
            other => SqlField::Cast(Box::new(other), ty),
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            SqlField::Column(name) => {
                let _ = write!(out, "\"{}\"", name.replace('"', "\"\""));
            }
            SqlField::Param { index, cast } => {
                let _ = write!(out, "${index}");
                if let Some(ty) = cast {
                    let _ = write!(out, "::{}", ty.name());
                }
            }
            SqlField::Null => out.push_str("NULL"),
            SqlField::Cast(inner, ty) => {
                out.push('(');
                inner.render(out);
                let _ = write!(out, ")::{}", ty.name());
            }
            SqlField::NullIfZero(inner) => {
                out.push_str("NULLIF(");
                inner.render(out);
                out.push_str(", 0)");
            }
            SqlField::Binary { op, left, right } => {
                out.push('(');
                left.render(out);
                let _ = write!(out, " {} ", op.token());
                right.render(out);
                out.push(')');
            }
            SqlField::Negate(inner) => {
                out.push_str("(-");
                inner.render(out);
                out.push(')');
            }
        }
    }
}

/// A boolean SQL fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlCondition {
    Compare {
        op: Cmp,
        left: SqlField,
        right: SqlField,
    },
    IsNull(SqlField),
    And(Box<SqlCondition>, Box<SqlCondition>),
    Or(Box<SqlCondition>, Box<SqlCondition>),
    Not(Box<SqlCondition>),
    /// `TRUE`, `FALSE`, or `NULL` for unknown.
    Literal(Option<bool>),
    /// A boolean-valued field used as a condition.
    Field(SqlField),
}

impl SqlCondition {
    pub fn render(&self, out: &mut String) {
        match self {
            SqlCondition::Compare { op, left, right } => {
                left.render(out);
                let _ = write!(out, " {} ", op.sql());
                right.render(out);
            }
            SqlCondition::IsNull(field) => {
                field.render(out);
                out.push_str(" IS NULL");
            }
            SqlCondition::And(l, r) => {
                out.push('(');
                l.render(out);
                out.push_str(" AND ");
                r.render(out);
                out.push(')');
            }
            SqlCondition::Or(l, r) => {
                out.push('(');
                l.render(out);
                out.push_str(" OR ");
                r.render(out);
                out.push(')');
            }
            SqlCondition::Not(inner) => {
                out.push_str("NOT (");
                inner.render(out);
                out.push(')');
            }
            SqlCondition::Literal(Some(true)) => out.push_str("TRUE"),
            SqlCondition::Literal(Some(false)) => out.push_str("FALSE"),
            SqlCondition::Literal(None) => out.push_str("NULL"),
            SqlCondition::Field(field) => field.render(out),
        }
    }
}

/// A compiled `WHERE` clause body and its parameters, in `$n` order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NativeCondition {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl fmt::Display for NativeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Where a property lives in the table of its entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnMapping {
    Scalar(String),
    Instant(String),
    Duration(String),
    Interval { start: String, end: String },
}

/// Maps property paths to columns.
pub trait ColumnResolver: Send + Sync {
    fn resolve(&self, entity_type: EntityType, path: &PropertyPath) -> Result<ColumnMapping>;
}

/// Snake-case columns named after the wire name.
///
/// Interval-valued properties are split into `<column>_start` and
/// `<column>_end`. Single-valued navigation ids map to `<link>_id`; any other
/// navigation path needs a join and is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultColumns;

impl ColumnResolver for DefaultColumns {
    fn resolve(&self, entity_type: EntityType, path: &PropertyPath) -> Result<ColumnMapping> {
        let unknown = || FilterError::UnknownProperty(format!("{entity_type}/{path}"));
        match path.segments() {
            [Property::Entity(EntityProperty::SelfLink)] => Err(unknown()),
            [Property::Entity(EntityProperty::Id)] => Ok(ColumnMapping::Scalar("id".to_string())),
            [Property::Entity(p)] if entity_type.has_property(*p) => {
                let column = snake_case(p.wire_name());
                Ok(match p.value_kind() {
                    ValueKind::Interval => ColumnMapping::Interval {
                        start: format!("{column}_start"),
                        end: format!("{column}_end"),
                    },
                    ValueKind::Instant => ColumnMapping::Instant(column),
                    ValueKind::Duration => ColumnMapping::Duration(column),
                    ValueKind::Null | ValueKind::Boolean | ValueKind::Scalar => {
                        ColumnMapping::Scalar(column)
                    }
                })
            }
            [Property::Navigation(nav), Property::Entity(EntityProperty::Id)]
                if !nav.is_set() && entity_type.navigation_properties().contains(nav) =>
            {
                Ok(ColumnMapping::Scalar(format!(
                    "{}_id",
                    snake_case(nav.name())
                )))
            }
            _ => Err(unknown()),
        }
    }
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Compiles filters over one entity type's table.
#[derive(Clone)]
pub struct PostgresBackend {
    entity_type: EntityType,
    timestamp_type: TimestampType,
    resolver: Arc<dyn ColumnResolver>,
}

impl fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresBackend")
            .field("entity_type", &self.entity_type)
            .field("timestamp_type", &self.timestamp_type)
            .finish_non_exhaustive()
    }
}

impl PostgresBackend {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            timestamp_type: TimestampType::default(),
            resolver: Arc::new(DefaultColumns),
        }
    }

    /// Backend using the timestamp cast of `config`.
    pub fn from_config(entity_type: EntityType, config: &crate::config::Config) -> Self {
        Self::new(entity_type).with_timestamp_type(config.timestamp_type)
    }

    pub fn with_timestamp_type(mut self, timestamp_type: TimestampType) -> Self {
        self.timestamp_type = timestamp_type;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ColumnResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Compile a filter into a `WHERE` clause body.
    ///
    /// The output depends only on the expression and this backend's
    /// settings, so it can be cached by expression.
    pub fn compile(&self, expr: &Expression) -> Result<NativeCondition> {
        log::debug!("Compiling filter {} over {}", expr, self.entity_type.plural());
        let session = SqlSession {
            backend: self,
            params: RefCell::new(Vec::new()),
        };
        let condition = compile_condition(&session, expr)?;
        let mut sql = String::new();
        condition.render(&mut sql);
        Ok(NativeCondition {
            sql,
            params: session.params.into_inner(),
        })
    }

    fn timestamp(&self) -> SqlType {
        SqlType::Timestamp(self.timestamp_type)
    }
}

/// Parameter numbering state of one compilation.
struct SqlSession<'a> {
    backend: &'a PostgresBackend,
    params: RefCell<Vec<SqlParam>>,
}

impl SqlSession<'_> {
    fn bind(&self, value: SqlParam, cast: Option<SqlType>) -> SqlField {
        let mut params = self.params.borrow_mut();
        params.push(value);
        SqlField::Param {
            index: params.len(),
            cast,
        }
    }

    fn bind_instant(&self, instant: &Instant) -> SqlField {
        let text = match self.backend.timestamp_type {
            TimestampType::WithTimeZone => instant.format(),
            TimestampType::WithoutTimeZone => instant.format_naive_utc(),
        };
        self.bind(SqlParam::Text(text), Some(self.backend.timestamp()))
    }
}

impl Algebra for SqlSession<'_> {
    type Term = SqlField;
    type Condition = SqlCondition;

    fn cmp(&self, op: Cmp, left: &SqlField, right: &SqlField) -> SqlCondition {
        SqlCondition::Compare {
            op,
            left: left.clone(),
            right: right.clone(),
        }
    }

    fn is_null(&self, term: &SqlField) -> SqlCondition {
        SqlCondition::IsNull(term.clone())
    }

    fn literal(&self, value: Option<bool>) -> SqlCondition {
        SqlCondition::Literal(value)
    }

    fn and(&self, left: SqlCondition, right: SqlCondition) -> SqlCondition {
        SqlCondition::And(Box::new(left), Box::new(right))
    }

    fn or(&self, left: SqlCondition, right: SqlCondition) -> SqlCondition {
        SqlCondition::Or(Box::new(left), Box::new(right))
    }

    fn not(&self, inner: SqlCondition) -> SqlCondition {
        SqlCondition::Not(Box::new(inner))
    }

    fn truthy(&self, term: &SqlField) -> Result<SqlCondition> {
        Ok(SqlCondition::Field(term.clone()))
    }

    fn arithmetic(
        &self,
        op: ArithmeticOp,
        shape: ArithmeticShape,
        left: &SqlField,
        right: &SqlField,
    ) -> Result<SqlField> {
        let ts = self.backend.timestamp();
        let (left, right) = match shape {
            ArithmeticShape::Numbers | ArithmeticShape::DurationScalar => {
                let left = match shape {
                    ArithmeticShape::DurationScalar => left.clone().cast(SqlType::Interval),
                    _ => left.clone(),
                };
                let right = match op {
                    ArithmeticOp::Div | ArithmeticOp::Mod => {
                        SqlField::NullIfZero(Box::new(right.clone()))
                    }
                    ArithmeticOp::Add | ArithmeticOp::Sub | ArithmeticOp::Mul => right.clone(),
                };
                (left, right)
            }
            ArithmeticShape::InstantDuration => (
                left.clone().cast(ts),
                right.clone().cast(SqlType::Interval),
            ),
            ArithmeticShape::InstantInstant => (left.clone().cast(ts), right.clone().cast(ts)),
            ArithmeticShape::DurationDuration => (
                left.clone().cast(SqlType::Interval),
                right.clone().cast(SqlType::Interval),
            ),
        };
        Ok(SqlField::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn negate(&self, term: &SqlField) -> Result<SqlField> {
        Ok(SqlField::Negate(Box::new(term.clone())))
    }
}

impl Backend for SqlSession<'_> {
    fn constant(&self, constant: &Constant) -> Result<AlgebraOperand<Self>> {
        Ok(match constant {
            Constant::Null => Operand::Null,
            Constant::Bool(b) => Operand::Scalar(self.bind(SqlParam::Bool(*b), None)),
            Constant::Integer(n) => Operand::Scalar(self.bind(SqlParam::Integer(*n), None)),
            Constant::Number(n) => Operand::Scalar(self.bind(SqlParam::number(*n), None)),
            Constant::Text(s) => Operand::Scalar(self.bind(SqlParam::Text(s.clone()), None)),
            Constant::Instant(i) => Operand::Instant(self.bind_instant(i)),
            Constant::Duration(d) => Operand::Duration(self.bind(
                SqlParam::Text(format!("{} milliseconds", d.as_delta().num_milliseconds())),
                Some(SqlType::Interval),
            )),
            Constant::Interval(i) => Operand::Interval {
                start: self.bind_instant(&i.start()),
                end: self.bind_instant(&i.end()),
            },
        })
    }

    fn property(&self, path: &PropertyPath) -> Result<AlgebraOperand<Self>> {
        let mapping = self.backend.resolver.resolve(self.backend.entity_type, path)?;
        Ok(match mapping {
            ColumnMapping::Scalar(c) => Operand::Scalar(SqlField::Column(c)),
            ColumnMapping::Instant(c) => Operand::Instant(SqlField::Column(c)),
            ColumnMapping::Duration(c) => Operand::Duration(SqlField::Column(c)),
            ColumnMapping::Interval { start, end } => Operand::Interval {
                start: SqlField::Column(start),
                end: SqlField::Column(end),
            },
        })
    }
}
