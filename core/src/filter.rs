//! Fluent search description consumed by the [`QueryExecutor`](crate::QueryExecutor).

use crate::error::{QuickDataError, Result};
use crate::predicate::{Direction, Operand};
use crate::value::Value;

/// A `where` entry as supplied by the caller. The operator stays a string
/// until the executor compiles it, so malformed clauses surface as
/// `InvalidPredicate` at search time.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub key: String,
    pub operator: String,
    pub value: Operand,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchFilter {
    per_page: Option<u32>,
    should_paginate: bool,
    page: Option<u32>,
    wheres: Vec<WhereClause>,
    order_by: Vec<(String, Direction)>,
    with: Vec<String>,
    with_counts: Vec<String>,
    search_query: Option<String>,
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self {
            per_page: None,
            should_paginate: true,
            page: None,
            wheres: Vec::new(),
            order_by: Vec::new(),
            with: Vec::new(),
            with_counts: Vec::new(),
            search_query: None,
        }
    }
}

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value`.
    pub fn where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        self.where_op(column, "=", Operand::Scalar(value.into()))
    }

    /// `column <operator> value`. The operator is matched case-insensitively
    /// when the search runs.
    pub fn where_op(
        mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Operand>,
    ) -> Result<Self> {
        let key = column.into();
        if key.trim().is_empty() {
            return Err(QuickDataError::InvalidArgument(
                "where needs a column and a value".into(),
            ));
        }
        self.wheres.push(WhereClause {
            key,
            operator: operator.to_string(),
            value: value.into(),
        });
        Ok(self)
    }

    pub fn where_in<V: Into<Value>>(self, column: impl Into<String>, values: Vec<V>) -> Result<Self> {
        self.where_op(column, "IN", Operand::from(values))
    }

    pub fn where_not_in<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: Vec<V>,
    ) -> Result<Self> {
        self.where_op(column, "NOT IN", Operand::from(values))
    }

    /// Replaces the ordering. Columns are applied in the order given.
    pub fn order_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Direction)>,
        S: Into<String>,
    {
        self.order_by = fields.into_iter().map(|(c, d)| (c.into(), d)).collect();
        self
    }

    /// Replaces the eager-load set.
    pub fn with<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with = strings(relations);
        self
    }

    /// Replaces the relation-count set.
    pub fn with_counts<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_counts = strings(relations);
        self
    }

    pub fn set_per_page(mut self, per_page: u32) -> Result<Self> {
        if per_page == 0 {
            return Err(QuickDataError::InvalidArgument(
                "per_page must be greater than zero".into(),
            ));
        }
        self.per_page = Some(per_page);
        Ok(self)
    }

    pub fn set_should_paginate(mut self, paginate: bool) -> Self {
        self.should_paginate = paginate;
        self
    }

    pub fn set_page(mut self, page: u32) -> Self {
        self.page = Some(page.max(1));
        self
    }

    pub fn set_search_query(mut self, query: impl Into<String>) -> Self {
        self.search_query = Some(query.into());
        self
    }

    /// Page size, if one was set; the executor falls back to its settings.
    #[inline]
    pub const fn per_page(&self) -> Option<u32> {
        self.per_page
    }

    #[inline]
    pub const fn should_paginate(&self) -> bool {
        self.should_paginate
    }

    #[inline]
    pub const fn page(&self) -> Option<u32> {
        self.page
    }

    #[inline]
    pub fn wheres(&self) -> &[WhereClause] {
        &self.wheres
    }

    #[inline]
    pub fn order_by_fields(&self) -> &[(String, Direction)] {
        &self.order_by
    }

    #[inline]
    pub fn with_relations(&self) -> &[String] {
        &self.with
    }

    #[inline]
    pub fn with_count_relations(&self) -> &[String] {
        &self.with_counts
    }

    /// Trimmed search text; blank queries read as none.
    pub fn search_query(&self) -> Option<&str> {
        self.search_query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}
