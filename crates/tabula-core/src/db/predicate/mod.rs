//! Module: db::predicate
//! Responsibility: filter-condition vocabulary and the flat AND/OR evaluator.
//! Does not own: query state accumulation, sorting, or pagination.
//!
//! Conditions are combined with a flat two-group rule rather than a nested
//! boolean tree: every `And` condition folds into one boolean, every `Or`
//! condition folds into a second one, and a row passes when either group
//! passes. `(A OR B) AND C` is not expressible.

mod eval;


use crate::value::Value;
use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;

// re-exports
pub use eval::{apply_filters, matches, passes};

///
/// Combinator
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Combinator {
    And,
    Or,
}

///
/// Operator
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    /// Case-sensitive substring containment on text-coerced values.
    Like,
    In,
    /// Inclusive on both bounds.
    Between,
    IsNull,
    IsNotNull,
}

impl Operator {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::In => "IN",
            Self::Between => "BETWEEN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// UnknownOperator
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("unknown filter operator '{0}'")]
pub struct UnknownOperator(pub String);

impl FromStr for Operator {
    type Err = UnknownOperator;

    /// Case-insensitive; inner whitespace is collapsed so `is  not null` parses.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let normalized = text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();

        let op = match normalized.as_str() {
            "=" => Self::Eq,
            "!=" => Self::Ne,
            ">" => Self::Gt,
            "<" => Self::Lt,
            ">=" => Self::Gte,
            "<=" => Self::Lte,
            "LIKE" => Self::Like,
            "IN" => Self::In,
            "BETWEEN" => Self::Between,
            "IS NULL" => Self::IsNull,
            "IS NOT NULL" => Self::IsNotNull,
            _ => return Err(UnknownOperator(text.to_string())),
        };

        Ok(op)
    }
}

///
/// Condition
///
/// One `(combinator, field, operator, value)` filter tuple.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub combinator: Combinator,
    pub field: String,
    pub op: Operator,
    pub value: Value,
}

impl Condition {
    #[must_use]
    pub fn new(
        combinator: Combinator,
        field: impl Into<String>,
        op: Operator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            combinator,
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn and(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self::new(Combinator::And, field, op, value)
    }

    #[must_use]
    pub fn or(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self::new(Combinator::Or, field, op, value)
    }
}

///
/// Operand
///
/// Right-hand side of `where_`/`or_where`.
///
/// A `(operator, value)` pair carries an explicit operator. A bare value
/// shifts into the value slot and the operator defaults to `=`. This means
/// a bare `"="` is the *value* `"="` compared with `=`, never an operator.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Operand {
    pub(crate) op: Option<String>,
    pub(crate) value: Value,
}

impl Operand {
    /// Resolve the operator text; a bare value resolves to `=`.
    pub fn operator(&self) -> Result<Operator, UnknownOperator> {
        self.op.as_deref().map_or(Ok(Operator::Eq), str::parse)
    }

    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }
}

impl<V: Into<Value>> From<(&str, V)> for Operand {
    fn from((op, value): (&str, V)) -> Self {
        Self {
            op: Some(op.to_string()),
            value: value.into(),
        }
    }
}

impl<V: Into<Value>> From<(Operator, V)> for Operand {
    fn from((op, value): (Operator, V)) -> Self {
        Self {
            op: Some(op.as_str().to_string()),
            value: value.into(),
        }
    }
}

macro_rules! impl_bare_operand {
    ( $( $type:ty ),* $(,)? ) => {
        $(
            impl From<$type> for Operand {
                fn from(value: $type) -> Self {
                    Self {
                        op: None,
                        value: value.into(),
                    }
                }
            }
        )*
    };
}

impl_bare_operand!(bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, &str, String, Value);
