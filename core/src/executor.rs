//! Applies a [`SearchFilter`] to a base query and runs it against a store.
//!
//! The steps run in a fixed order because later steps may reference columns
//! added by earlier ones (a scope adding a computed `distance` column that the
//! ordering then sorts by, for instance):
//!
//! 1. free-text search across the entity's searchable fields
//! 2. supplemental predicates from a [`QueryScope`]
//! 3. ordering (explicit, else `id DESC`)
//! 4. eager loads and relation counts
//! 5. `where` clauses in input order
//! 6. pagination or a full fetch

use std::collections::BTreeMap;

use crate::config::{PredicatePolicy, Settings};
use crate::error::{QuickDataError, Result};
use crate::filter::{SearchFilter, WhereClause};
use crate::page::{Page, SearchResult};
use crate::predicate::{Direction, Operator, Predicate};
use crate::query::{Query, QueryScope};
use crate::quickdata_warn;
use crate::schema::{EntityId, PRIMARY_KEY, RelationDescriptor, RelationKind, Schema};
use crate::store::Store;
use crate::value::{Record, Value};

/// Executes searches for entities of one [`Schema`].
#[derive(Debug, Clone, Copy)]
pub struct QueryExecutor<'a> {
    schema: &'a Schema,
    settings: &'a Settings,
}

impl<'a> QueryExecutor<'a> {
    pub const fn new(schema: &'a Schema, settings: &'a Settings) -> Self {
        Self { schema, settings }
    }

    /// Empty query over the entity's table.
    pub fn base_query(&self, entity: EntityId) -> Query {
        Query::new(self.schema.get(entity).table.clone())
    }

    pub fn execute<S: Store>(
        &self,
        store: &mut S,
        entity: EntityId,
        mut query: Query,
        filter: &SearchFilter,
        scope: Option<&dyn QueryScope>,
    ) -> Result<SearchResult> {
        let schema = self.schema.get(entity);

        if let Some(needle) = filter.search_query() {
            query.or_group(
                schema
                    .searchable
                    .iter()
                    .map(|field| Predicate::contains(field.as_str(), needle)),
            );
        }

        if let Some(scope) = scope {
            scope.apply(&mut query)?;
        }

        if filter.order_by_fields().is_empty() {
            query.order_by(PRIMARY_KEY, Direction::Desc);
        } else {
            for (column, direction) in filter.order_by_fields() {
                query.order_by(column.as_str(), *direction);
            }
        }

        for relation in filter.with_relations() {
            query.with(relation.as_str());
        }
        for relation in filter.with_count_relations() {
            query.with_count(relation.as_str());
        }

        for clause in filter.wheres() {
            match compile_clause(clause) {
                Ok(predicate) => {
                    query.and_where(predicate);
                }
                Err(err) => match self.settings.invalid_predicates {
                    PredicatePolicy::Abort => return Err(err),
                    PredicatePolicy::Skip => {
                        quickdata_warn!(error = %err, "quickdata.search: skipping where clause");
                    }
                },
            }
        }

        if filter.should_paginate() {
            let per_page = filter.per_page().unwrap_or(self.settings.per_page);
            let page = filter.page().unwrap_or(1);
            Ok(SearchResult::Page(self.paginate(store, entity, query, per_page, page)?))
        } else {
            Ok(SearchResult::All(self.get(store, entity, &query)?))
        }
    }

    /// Runs `query` and resolves its eager loads and counts.
    pub fn get<S: Store>(&self, store: &mut S, entity: EntityId, query: &Query) -> Result<Vec<Record>> {
        let mut records = store.select(query)?;
        self.load(store, entity, &mut records, &query.with, &query.with_counts)?;
        Ok(records)
    }

    /// First match, with relations resolved.
    pub fn first<S: Store>(&self, store: &mut S, entity: EntityId, query: &Query) -> Result<Option<Record>> {
        let mut query = query.clone();
        query.limit(1);
        Ok(self.get(store, entity, &query)?.into_iter().next())
    }

    pub fn paginate<S: Store>(
        &self,
        store: &mut S,
        entity: EntityId,
        mut query: Query,
        per_page: u32,
        page: u32,
    ) -> Result<Page<Record>> {
        if per_page == 0 {
            return Err(QuickDataError::InvalidArgument(
                "per_page must be greater than zero".into(),
            ));
        }
        let page = page.max(1);
        let total = store.count(&query.for_count())?;
        query
            .limit(u64::from(per_page))
            .offset(Page::<Record>::offset(per_page, page));
        let data = self.get(store, entity, &query)?;
        Ok(Page::new(data, total, per_page, page))
    }

    /// Eager loads `with` (dotted paths load nested relations) and sets
    /// `<relation>_count` attributes for `counts`.
    pub fn load<S: Store>(
        &self,
        store: &mut S,
        entity: EntityId,
        records: &mut [Record],
        with: &[String],
        counts: &[String],
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        for (name, nested) in group_paths(with) {
            let relation = self.schema.relation(entity, name)?;
            self.load_relation(store, relation, records, &nested)?;
        }
        for name in counts {
            let relation = self.schema.relation(entity, name)?;
            self.count_relation(store, relation, records)?;
        }
        Ok(())
    }

    fn load_relation<S: Store>(
        &self,
        store: &mut S,
        relation: &RelationDescriptor,
        records: &mut [Record],
        nested: &[String],
    ) -> Result<()> {
        let parent_ids = ids_of(records);
        let related_table = &self.schema.get(relation.related).table;
        let mut grouped: BTreeMap<i64, Vec<Record>> = BTreeMap::new();

        match &relation.kind {
            RelationKind::HasMany { foreign_key } => {
                let mut query = Query::new(related_table.clone());
                query
                    .where_in(foreign_key.as_str(), parent_ids)
                    .order_by(PRIMARY_KEY, Direction::Asc);
                let mut children = store.select(&query)?;
                self.load(store, relation.related, &mut children, nested, &[])?;
                for child in children {
                    if let Some(parent) = child.key(foreign_key) {
                        grouped.entry(parent).or_default().push(child);
                    }
                }
            }
            RelationKind::ManyToMany { pivot, .. } => {
                let parent_keys: Vec<i64> = records.iter().filter_map(Record::id).collect();
                let rows = store.pivot_rows(pivot, &parent_keys)?;
                let mut related_ids: Vec<Value> = Vec::new();
                for row in &rows {
                    let id = Value::Integer(row.related_id);
                    if !related_ids.contains(&id) {
                        related_ids.push(id);
                    }
                }
                let mut query = Query::new(related_table.clone());
                query.where_in(PRIMARY_KEY, related_ids);
                let mut related = store.select(&query)?;
                self.load(store, relation.related, &mut related, nested, &[])?;
                let by_id: BTreeMap<i64, Record> = related
                    .into_iter()
                    .filter_map(|r| r.id().map(|id| (id, r)))
                    .collect();
                for row in rows {
                    let Some(found) = by_id.get(&row.related_id) else {
                        continue;
                    };
                    let mut linked = found.clone();
                    let mut pivot_attrs = row.attributes;
                    pivot_attrs.insert(pivot.foreign_key.clone(), Value::Integer(row.parent_id));
                    pivot_attrs.insert(pivot.related_key.clone(), Value::Integer(row.related_id));
                    linked.pivot = Some(pivot_attrs);
                    grouped.entry(row.parent_id).or_default().push(linked);
                }
            }
        }

        for record in records.iter_mut() {
            let children = record
                .id()
                .and_then(|id| grouped.get(&id).cloned())
                .unwrap_or_default();
            record.relations.insert(relation.name.clone(), children);
        }
        Ok(())
    }

    fn count_relation<S: Store>(
        &self,
        store: &mut S,
        relation: &RelationDescriptor,
        records: &mut [Record],
    ) -> Result<()> {
        let mut counts: BTreeMap<i64, i64> = BTreeMap::new();
        match &relation.kind {
            RelationKind::HasMany { foreign_key } => {
                let mut query = Query::new(self.schema.get(relation.related).table.clone());
                query.where_in(foreign_key.as_str(), ids_of(records));
                for child in store.select(&query)? {
                    if let Some(parent) = child.key(foreign_key) {
                        *counts.entry(parent).or_default() += 1;
                    }
                }
            }
            RelationKind::ManyToMany { pivot, .. } => {
                let parent_keys: Vec<i64> = records.iter().filter_map(Record::id).collect();
                for row in store.pivot_rows(pivot, &parent_keys)? {
                    *counts.entry(row.parent_id).or_default() += 1;
                }
            }
        }
        let column = format!("{}_count", relation.name);
        for record in records.iter_mut() {
            let count = record
                .id()
                .and_then(|id| counts.get(&id).copied())
                .unwrap_or(0);
            record.set(column.clone(), count);
        }
        Ok(())
    }
}

/// Compiles a caller-supplied clause into a checked predicate.
pub fn compile_clause(clause: &WhereClause) -> Result<Predicate> {
    let operator: Operator = clause.operator.parse().map_err(|_| {
        QuickDataError::InvalidPredicate {
            field: clause.key.clone(),
            reason: format!("unsupported operator `{}`", clause.operator),
        }
    })?;
    Predicate::new(clause.key.clone(), operator, clause.value.clone())
}

fn ids_of(records: &[Record]) -> Vec<Value> {
    records
        .iter()
        .filter_map(Record::id)
        .map(Value::Integer)
        .collect()
}

/// Groups `a`, `a.b`, `a.c.d` into `[("a", ["b", "c.d"])]`, keeping first-seen
/// order of the heads.
fn group_paths(paths: &[String]) -> Vec<(&str, Vec<String>)> {
    let mut groups: Vec<(&str, Vec<String>)> = Vec::new();
    for path in paths {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path.as_str(), None),
        };
        let index = match groups.iter().position(|(h, _)| *h == head) {
            Some(index) => index,
            None => {
                groups.push((head, Vec::new()));
                groups.len() - 1
            }
        };
        if let Some(rest) = rest {
            groups[index].1.push(rest.to_string());
        }
    }
    groups
}
