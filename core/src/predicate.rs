//! Predicates and the condition tree a [`Query`](crate::Query) filters with.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{QuickDataError, Result};
use crate::geo::DistanceExpr;
use crate::value::{Attributes, Value};

/// Comparison operators accepted in a `where` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    Gt,
    Lte,
    Gte,
    Like,
    NotLike,
    In,
    NotIn,
}

impl Operator {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Lte => "<=",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        }
    }

    /// `IN` and `NOT IN` take a list operand; everything else a scalar.
    #[inline]
    pub const fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl FromStr for Operator {
    type Err = QuickDataError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "=" | "==" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::NotEq),
            "<" => Ok(Self::Lt),
            ">" => Ok(Self::Gt),
            "<=" => Ok(Self::Lte),
            ">=" => Ok(Self::Gte),
            "LIKE" => Ok(Self::Like),
            "NOT LIKE" => Ok(Self::NotLike),
            "IN" => Ok(Self::In),
            "NOT IN" => Ok(Self::NotIn),
            _ => Err(QuickDataError::InvalidArgument(format!(
                "unsupported operator `{s}`"
            ))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Scalar(Value),
    List(Vec<Value>),
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

macro_rules! operand_from_scalar {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Operand {
            fn from(value: $ty) -> Self {
                Self::Scalar(Value::from(value))
            }
        })*
    };
}

operand_from_scalar!(i32, i64, u32, f64, bool, &str, String);

impl<T: Into<Value>> From<Vec<T>> for Operand {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// `{field, operator, operand}` with the operand shape already checked.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    field: String,
    operator: Operator,
    operand: Operand,
}

impl Predicate {
    pub fn new(field: impl Into<String>, operator: Operator, operand: Operand) -> Result<Self> {
        let field = field.into();
        if field.trim().is_empty() {
            return Err(QuickDataError::invalid_predicate(&field, "empty column name"));
        }
        match (&operand, operator.takes_list()) {
            (Operand::List(_), false) => Err(QuickDataError::invalid_predicate(
                &field,
                format!("`{operator}` needs a single value, got a list"),
            )),
            (Operand::Scalar(_), true) => Err(QuickDataError::invalid_predicate(
                &field,
                format!("`{operator}` needs a list of values"),
            )),
            _ => Ok(Self {
                field,
                operator,
                operand,
            }),
        }
    }

    /// Shorthand for `field LIKE '%needle%'`.
    pub fn contains(field: impl Into<String>, needle: &str) -> Self {
        Self {
            field: field.into(),
            operator: Operator::Like,
            operand: Operand::Scalar(Value::Text(format!("%{needle}%"))),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: Operator::Eq,
            operand: Operand::Scalar(value.into()),
        }
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            operator: Operator::In,
            operand: Operand::List(values),
        }
    }

    #[inline]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[inline]
    pub const fn operator(&self) -> Operator {
        self.operator
    }

    #[inline]
    pub const fn operand(&self) -> &Operand {
        &self.operand
    }

    /// Evaluates against a row with SQL semantics: comparisons against NULL
    /// are false, except that `= NULL` and `!= NULL` test for null.
    pub fn matches(&self, row: &Attributes) -> bool {
        let left = row.get(&self.field).unwrap_or(&Value::Null);
        match (&self.operand, self.operator) {
            (Operand::Scalar(Value::Null), Operator::Eq) => left.is_null(),
            (Operand::Scalar(Value::Null), Operator::NotEq) => !left.is_null(),
            (Operand::Scalar(right), op) => match op {
                Operator::Like => right.as_str().is_some_and(|p| left.like(p)),
                Operator::NotLike => {
                    !left.is_null() && right.as_str().is_some_and(|p| !left.like(p))
                }
                _ => left.compare(right).is_some_and(|ord| match op {
                    Operator::Eq => ord.is_eq(),
                    Operator::NotEq => ord.is_ne(),
                    Operator::Lt => ord.is_lt(),
                    Operator::Gt => ord.is_gt(),
                    Operator::Lte => ord.is_le(),
                    Operator::Gte => ord.is_ge(),
                    _ => false,
                }),
            },
            (Operand::List(values), op) => {
                if left.is_null() {
                    return false;
                }
                let found = values
                    .iter()
                    .any(|v| left.compare(v).is_some_and(|o| o.is_eq()));
                if op == Operator::In { found } else { !found }
            }
        }
    }
}

/// Boolean tree of predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Predicate(Predicate),
    /// Row has coordinates and, when `max` is set, lies strictly within it.
    Distance { expr: DistanceExpr, max: Option<f64> },
}

impl Default for Condition {
    fn default() -> Self {
        Self::All(Vec::new())
    }
}

impl Condition {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::All(items) | Self::Any(items) => items.is_empty(),
            _ => false,
        }
    }

    /// An empty `All` is true; an empty `Any` is also treated as true, the
    /// way an empty grouped `WHERE ( )` is dropped by query builders.
    pub fn matches(&self, row: &Attributes) -> bool {
        match self {
            Self::All(items) => items.iter().all(|c| c.matches(row)),
            Self::Any(items) => items.is_empty() || items.iter().any(|c| c.matches(row)),
            Self::Predicate(p) => p.matches(row),
            Self::Distance { expr, max } => match expr.evaluate(row) {
                Some(d) => max.is_none_or(|m| d < m),
                None => false,
            },
        }
    }
}

impl From<Predicate> for Condition {
    fn from(value: Predicate) -> Self {
        Self::Predicate(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = QuickDataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(QuickDataError::InvalidArgument(format!(
                "sort direction must be asc or desc, got `{s}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}
