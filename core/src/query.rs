//! Declarative query description handed to a [`Store`](crate::Store).
//!
//! A [`Query`] is plain data: the table, the condition tree, computed columns,
//! ordering and window. Eager loads and relation counts ride along so query
//! scopes and authorization callbacks can add them; the executor resolves them
//! after the store returns rows.

use crate::error::Result;
use crate::geo::DistanceExpr;
use crate::predicate::{Condition, Direction, Operand, Operator, OrderBy, Predicate};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub table: String,
    /// Computed columns, by alias, added to every returned row.
    pub computed: Vec<(String, DistanceExpr)>,
    pub condition: Condition,
    pub orders: Vec<OrderBy>,
    pub with: Vec<String>,
    pub with_counts: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// ANDs a condition onto the query.
    pub fn and_where(&mut self, condition: impl Into<Condition>) -> &mut Self {
        let condition = condition.into();
        match &mut self.condition {
            Condition::All(items) => items.push(condition),
            other => {
                let previous = std::mem::take(other);
                *other = Condition::All(vec![previous, condition]);
            }
        }
        self
    }

    /// ANDs a grouped OR of the given predicates. An empty group adds nothing.
    pub fn or_group(&mut self, predicates: impl IntoIterator<Item = Predicate>) -> &mut Self {
        let group: Vec<Condition> = predicates.into_iter().map(Condition::from).collect();
        if !group.is_empty() {
            self.and_where(Condition::Any(group));
        }
        self
    }

    pub fn where_op(
        &mut self,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Operand>,
    ) -> Result<&mut Self> {
        let predicate = Predicate::new(field, operator, value.into())?;
        Ok(self.and_where(predicate))
    }

    pub fn where_eq(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.and_where(Predicate::eq(field, value))
    }

    pub fn where_in(&mut self, field: impl Into<String>, values: Vec<Value>) -> &mut Self {
        self.and_where(Predicate::is_in(field, values))
    }

    pub fn where_not_in(&mut self, field: impl Into<String>, values: Vec<Value>) -> Result<&mut Self> {
        self.where_op(field, Operator::NotIn, Operand::List(values))
    }

    pub fn order_by(&mut self, column: impl Into<String>, direction: Direction) -> &mut Self {
        self.orders.push(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn with(&mut self, relation: impl Into<String>) -> &mut Self {
        let relation = relation.into();
        if !self.with.contains(&relation) {
            self.with.push(relation);
        }
        self
    }

    pub fn with_count(&mut self, relation: impl Into<String>) -> &mut Self {
        let relation = relation.into();
        if !self.with_counts.contains(&relation) {
            self.with_counts.push(relation);
        }
        self
    }

    pub fn select_distance(&mut self, alias: impl Into<String>, expr: DistanceExpr) -> &mut Self {
        let alias = alias.into();
        self.computed.retain(|(existing, _)| *existing != alias);
        self.computed.push((alias, expr));
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// Copy without ordering or window, for counting matches.
    pub fn for_count(&self) -> Self {
        Self {
            orders: Vec::new(),
            limit: None,
            offset: None,
            with: Vec::new(),
            with_counts: Vec::new(),
            ..self.clone()
        }
    }
}

/// Contributes supplemental predicates to a search before ordering is applied.
pub trait QueryScope {
    fn apply(&self, query: &mut Query) -> Result<()>;
}

impl<F> QueryScope for F
where
    F: Fn(&mut Query) -> Result<()>,
{
    fn apply(&self, query: &mut Query) -> Result<()> {
        self(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_where_flattens_into_all() {
        let mut q = Query::new("posts");
        q.where_eq("a", 1).where_eq("b", 2);
        match &q.condition {
            Condition::All(items) => assert_eq!(items.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_or_group_adds_nothing() {
        let mut q = Query::new("posts");
        q.or_group(Vec::new());
        assert!(q.condition.is_empty());
    }

    #[test]
    fn with_deduplicates() {
        let mut q = Query::new("posts");
        q.with("tags").with("tags").with_count("comments");
        assert_eq!(q.with, vec!["tags".to_string()]);
        assert_eq!(q.with_counts, vec!["comments".to_string()]);
    }

    #[test]
    fn for_count_drops_window_and_order() {
        let mut q = Query::new("posts");
        q.order_by("id", Direction::Desc).limit(5).offset(10);
        let c = q.for_count();
        assert!(c.orders.is_empty());
        assert_eq!(c.limit, None);
        assert_eq!(c.offset, None);
    }
}
