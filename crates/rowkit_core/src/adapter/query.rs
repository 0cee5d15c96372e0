//! Adapter-level query description.
//!
//! A [`QuerySpec`] is what a model query compiles to: column-keyed
//! predicates, ordering, a window and locking. Evaluation helpers are
//! provided so that in-process adapters share one interpretation.

use super::{QueryClient, Row};
use crate::types::SortDirection;
use rowkit_value::{deep_eq, Value};
use std::cmp::Ordering;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equal.
    Eq,
    /// Not equal.
    NotEq,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
}

/// A filter over storage rows. Column names are storage names.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column <op> value`.
    Compare {
        /// Column name.
        column: String,
        /// Operator.
        op: Operator,
        /// Right-hand value.
        value: Value,
    },
    /// `column IN (values)`.
    In {
        /// Column name.
        column: String,
        /// Candidate values.
        values: Vec<Value>,
    },
    /// `column IS NULL`.
    IsNull {
        /// Column name.
        column: String,
    },
    /// `column IS NOT NULL`.
    NotNull {
        /// Column name.
        column: String,
    },
    /// Matches when any of the inner predicates matches.
    Any(Vec<Predicate>),
}

impl Predicate {
    /// `column = value`.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column: column.into(),
            op: Operator::Eq,
            value: value.into(),
        }
    }

    /// Evaluates the predicate against a row. Missing columns read as null.
    pub fn matches(&self, row: &Row) -> bool {
        let read = |column: &str| row.get(column).cloned().unwrap_or(Value::Null);
        match self {
            Predicate::Compare { column, op, value } => {
                let actual = read(column);
                if actual.is_nullish() || value.is_nullish() {
                    return false;
                }
                match op {
                    Operator::Eq => deep_eq(&actual, value),
                    Operator::NotEq => !deep_eq(&actual, value),
                    Operator::Gt => compare_values(&actual, value) == Some(Ordering::Greater),
                    Operator::Gte => matches!(
                        compare_values(&actual, value),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                    Operator::Lt => compare_values(&actual, value) == Some(Ordering::Less),
                    Operator::Lte => matches!(
                        compare_values(&actual, value),
                        Some(Ordering::Less | Ordering::Equal)
                    ),
                }
            }
            Predicate::In { column, values } => {
                let actual = read(column);
                !actual.is_nullish() && values.iter().any(|candidate| deep_eq(&actual, candidate))
            }
            Predicate::IsNull { column } => read(column).is_nullish(),
            Predicate::NotNull { column } => !read(column).is_nullish(),
            Predicate::Any(inner) => inner.iter().any(|predicate| predicate.matches(row)),
        }
    }
}

/// Orders two scalar values. Returns `None` for values of unrelated types.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Some(x.cmp(y)),
        #[allow(clippy::cast_precision_loss)]
        (Value::Integer(x), Value::Float(y)) => (*x as f64).partial_cmp(y),
        #[allow(clippy::cast_precision_loss)]
        (Value::Float(x), Value::Integer(y)) => x.partial_cmp(&(*y as f64)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// A compiled query.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    /// Model that issued the query.
    pub model: String,
    /// Table to read.
    pub table: String,
    /// Primary key column of the table.
    pub primary_column: String,
    /// Filters, all of which must match.
    pub predicates: Vec<Predicate>,
    /// Ordering, applied in sequence.
    pub order_by: Vec<(String, SortDirection)>,
    /// Maximum number of rows.
    pub limit: Option<u64>,
    /// Number of rows to skip.
    pub offset: Option<u64>,
    /// Lock matched rows until the transaction completes.
    pub for_update: bool,
    /// Transaction or connection to run on.
    pub client: Option<QueryClient>,
}

impl QuerySpec {
    /// Creates an unfiltered query over `table`.
    pub fn new(
        model: impl Into<String>,
        table: impl Into<String>,
        primary_column: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            table: table.into(),
            primary_column: primary_column.into(),
            predicates: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            for_update: false,
            client: None,
        }
    }

    /// Whether every predicate matches `row`.
    pub fn matches(&self, row: &Row) -> bool {
        self.predicates.iter().all(|predicate| predicate.matches(row))
    }

    /// Sorts rows by the query's ordering. Nulls sort first.
    pub fn sort_rows(&self, rows: &mut [Row]) {
        if self.order_by.is_empty() {
            return;
        }
        rows.sort_by(|a, b| {
            for (column, direction) in &self.order_by {
                let left = a.get(column).unwrap_or(&Value::Null);
                let right = b.get(column).unwrap_or(&Value::Null);
                let ordering = match (left.is_nullish(), right.is_nullish()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    (false, false) => compare_values(left, right).unwrap_or(Ordering::Equal),
                };
                let ordering = match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    /// Applies offset and limit.
    pub fn window<T>(&self, items: Vec<T>) -> Vec<T> {
        let offset = usize::try_from(self.offset.unwrap_or(0)).unwrap_or(usize::MAX);
        let iter = items.into_iter().skip(offset);
        match self.limit {
            Some(limit) => iter
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
            None => iter.collect(),
        }
    }

    /// Filters, sorts and windows rows.
    pub fn apply(&self, rows: impl IntoIterator<Item = Row>) -> Vec<Row> {
        let mut matched: Vec<Row> = rows.into_iter().filter(|row| self.matches(row)).collect();
        self.sort_rows(&mut matched);
        self.window(matched)
    }
}
