use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Appended to a prefix to close a half-open `[prefix, prefix + sentinel)`
/// range over string fields.
pub const PREFIX_SENTINEL: char = '\u{f8ff}';

/// A single typed field of a stored document. Timestamps are kept as a
/// native temporal value, never as formatted strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Decimal(Decimal),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Orders two values of the same kind. Values of different kinds are
    /// incomparable.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => Some(Ordering::Equal),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            (FieldValue::Decimal(a), FieldValue::Decimal(b)) => Some(a.cmp(b)),
            (FieldValue::String(a), FieldValue::String(b)) => Some(a.cmp(b)),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Decimal(_) => "decimal",
            FieldValue::String(_) => "string",
            FieldValue::Timestamp(_) => "timestamp",
        }
    }

    /// Orders values of different kinds so sorting stays total.
    fn rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Bool(_) => 1,
            FieldValue::Decimal(_) => 2,
            FieldValue::String(_) => 3,
            FieldValue::Timestamp(_) => 4,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Decimal(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    fn field(&self, field: &'static str) -> Result<&FieldValue, DecodeError> {
        self.fields.get(field).ok_or_else(|| DecodeError::MissingField {
            id: self.id.clone(),
            field,
        })
    }

    fn wrong_type(
        &self,
        field: &'static str,
        expected: &'static str,
        actual: &FieldValue,
    ) -> DecodeError {
        DecodeError::WrongType {
            id: self.id.clone(),
            field,
            expected,
            actual: actual.kind(),
        }
    }

    pub fn string(&self, field: &'static str) -> Result<&str, DecodeError> {
        match self.field(field)? {
            FieldValue::String(value) => Ok(value.as_str()),
            other => Err(self.wrong_type(field, "string", other)),
        }
    }

    pub fn decimal(&self, field: &'static str) -> Result<Decimal, DecodeError> {
        match self.field(field)? {
            FieldValue::Decimal(value) => Ok(*value),
            other => Err(self.wrong_type(field, "decimal", other)),
        }
    }

    pub fn timestamp(&self, field: &'static str) -> Result<DateTime<Utc>, DecodeError> {
        match self.field(field)? {
            FieldValue::Timestamp(value) => Ok(*value),
            other => Err(self.wrong_type(field, "timestamp", other)),
        }
    }

    /// Absent fields and explicit nulls both decode to `None`.
    pub fn optional_timestamp(
        &self,
        field: &'static str,
    ) -> Result<Option<DateTime<Utc>>, DecodeError> {
        match self.fields.get(field) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(FieldValue::Timestamp(value)) => Ok(Some(*value)),
            Some(other) => Err(self.wrong_type(field, "timestamp", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Le => ordering != Ordering::Greater,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Ge => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        field: String,
        op: Comparison,
        value: FieldValue,
    },
    Or(Vec<Filter>),
}

impl Filter {
    fn compare(field: impl Into<String>, op: Comparison, value: impl Into<FieldValue>) -> Self {
        Filter::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, Comparison::Eq, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, Comparison::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, Comparison::Le, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, Comparison::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, Comparison::Ge, value)
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    /// A missing field, or a value of a different kind, never matches.
    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Filter::Compare { field, op, value } => fields
                .get(field)
                .and_then(|actual| actual.compare(value))
                .is_some_and(|ordering| op.accepts(ordering)),
            Filter::Or(filters) => filters.iter().any(|filter| filter.matches(fields)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// A collection query: every filter must match (AND), then ordering, then
/// the result limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters.iter().all(|filter| filter.matches(fields))
    }

    /// Evaluates the query over an unordered set of documents from
    /// `self.collection`. Shared by adapters that cannot push the query down
    /// to their backend.
    pub fn apply(&self, documents: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut matched: Vec<Document> = documents
            .into_iter()
            .filter(|document| self.matches(&document.fields))
            .collect();

        if let Some(order) = &self.order_by {
            matched.sort_by(|a, b| {
                let ordering = compare_field(a, b, &order.field);
                let ordering = match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                };
                ordering.then_with(|| a.id.cmp(&b.id))
            });
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }

        matched
    }
}

// documents lacking the field sort after those that have it
fn compare_field(a: &Document, b: &Document, field: &str) -> Ordering {
    match (a.fields.get(field), b.fields.get(field)) {
        (Some(x), Some(y)) => x
            .compare(y)
            .unwrap_or_else(|| x.rank().cmp(&y.rank())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
