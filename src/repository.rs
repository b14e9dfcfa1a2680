//! CRUD, search and row-level authorization over one entity.

use quickdata_core::geo::DISTANCE_COLUMN;
use quickdata_core::{
    Attributes, Direction, EntityId, EntitySchema, Page, Payload, PRIMARY_KEY, Predicate, Query,
    QueryExecutor, QueryScope, QuickDataError, Record, Result, Schema, SearchFilter, SearchResult,
    Settings, Store, Value, quickdata_trace_op,
};
use serde::Serialize;

use crate::authorize::{self, Actor, QueryPermissions};
use crate::sync::RelationshipSynchronizer;

/// Optional per-entity behaviour. Every method defaults to a no-op.
pub trait RepositoryHooks<S: Store> {
    /// Extra predicates applied to every [`Repository::search`].
    fn scope_search(&self, _query: &mut Query) -> Result<()> {
        Ok(())
    }

    /// Runs after input is filled and before the record is saved.
    fn fill_custom_fields(&self, _store: &mut S, _record: &mut Record, _input: &Payload) -> Result<()> {
        Ok(())
    }

    /// Runs once the record has its id.
    fn after_save(&self, _store: &mut S, _record: &mut Record, _input: &Payload) -> Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<S: Store> RepositoryHooks<S> for NoHooks {}

/// `{value: id, name}` pair for select boxes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListItem {
    pub value: Value,
    pub name: Value,
}

/// Everything a repository operation needs besides the store. Copied into
/// transaction closures.
pub(crate) struct EntityContext<'a, S: Store> {
    pub(crate) schema: &'a Schema,
    pub(crate) settings: &'a Settings,
    pub(crate) entity: EntityId,
    pub(crate) hooks: &'a dyn RepositoryHooks<S>,
}

impl<S: Store> Clone for EntityContext<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Store> Copy for EntityContext<'_, S> {}

/// Copies scalar payload values onto `record` for the entity's fillable
/// columns. Other keys, nested relation data included, are ignored.
pub(crate) fn fill(entity: &EntitySchema, record: &mut Record, data: &Payload) -> Result<()> {
    for (column, json) in data {
        if !entity.is_fillable(column) {
            continue;
        }
        let value = Value::from_json(json).ok_or_else(|| QuickDataError::InvalidPayload {
            field: column.clone(),
            reason: "expected a scalar value".into(),
        })?;
        record.set(column.as_str(), value);
    }
    Ok(())
}

/// Columns written on save: everything except the key and values computed at
/// read time.
fn persistable(entity: &EntitySchema, record: &Record) -> Attributes {
    record
        .attributes
        .iter()
        .filter(|(column, _)| {
            column.as_str() != PRIMARY_KEY
                && column.as_str() != DISTANCE_COLUMN
                && !entity
                    .relations
                    .iter()
                    .any(|r| column.strip_suffix("_count") == Some(r.name.as_str()))
        })
        .map(|(column, value)| (column.clone(), value.clone()))
        .collect()
}

/// Inserts a record without an id, updates one with an id.
pub(crate) fn save<S: Store>(store: &mut S, entity: &EntitySchema, record: &mut Record) -> Result<()> {
    let values = persistable(entity, record);
    match record.id() {
        Some(id) => {
            if store.update(&entity.table, id, &values)? == 0 {
                return Err(QuickDataError::not_found(&entity.name, id));
            }
            quickdata_trace_op!("update", entity = entity.name, id = id);
        }
        None => {
            let id = store.insert(&entity.table, &values)?;
            record.set(PRIMARY_KEY, id);
            quickdata_trace_op!("create", entity = entity.name, id = id);
        }
    }
    Ok(())
}

impl<'a, S: Store> EntityContext<'a, S> {
    pub(crate) fn entity(&self) -> &'a EntitySchema {
        self.schema.get(self.entity)
    }

    fn executor(&self) -> QueryExecutor<'a> {
        QueryExecutor::new(self.schema, self.settings)
    }

    fn query(&self, relations: &[&str]) -> Query {
        let mut query = self.executor().base_query(self.entity);
        for relation in relations {
            query.with(*relation);
        }
        query
    }

    fn find(&self, store: &mut S, id: i64, relations: &[&str]) -> Result<Option<Record>> {
        let mut query = self.query(relations);
        query.where_eq(PRIMARY_KEY, id);
        self.executor().first(store, self.entity, &query)
    }

    fn create(&self, store: &mut S, data: &Payload) -> Result<Record> {
        let mut record = Record::new();
        fill(self.entity(), &mut record, data)?;
        save(store, self.entity(), &mut record)?;
        Ok(record)
    }

    fn update(&self, store: &mut S, mut record: Record, data: &Payload) -> Result<Record> {
        fill(self.entity(), &mut record, data)?;
        save(store, self.entity(), &mut record)?;
        Ok(record)
    }

    fn find_or_create(&self, store: &mut S, id: Option<i64>, data: &Payload) -> Result<Record> {
        match id {
            None => self.create(store, data),
            Some(id) => {
                let record = self
                    .find(store, id, &[])?
                    .ok_or_else(|| QuickDataError::not_found(&self.entity().name, id))?;
                self.update(store, record, data)
            }
        }
    }
}

/// Data access for one entity type. Obtained from
/// [`QuickData::repository`](crate::QuickData::repository).
pub struct Repository<'a, S: Store> {
    store: &'a mut S,
    ctx: EntityContext<'a, S>,
}

impl<'a, S: Store> Repository<'a, S> {
    pub(crate) fn new(
        store: &'a mut S,
        schema: &'a Schema,
        settings: &'a Settings,
        entity: EntityId,
    ) -> Self {
        Self {
            store,
            ctx: EntityContext {
                schema,
                settings,
                entity,
                hooks: &NoHooks,
            },
        }
    }

    pub fn with_hooks(mut self, hooks: &'a dyn RepositoryHooks<S>) -> Self {
        self.ctx.hooks = hooks;
        self
    }

    pub fn entity(&self) -> &'a EntitySchema {
        self.ctx.entity()
    }

    pub fn entity_id(&self) -> EntityId {
        self.ctx.entity
    }

    pub fn settings(&self) -> &'a Settings {
        self.ctx.settings
    }

    pub fn store(&mut self) -> &mut S {
        self.store
    }

    /// A blank, unsaved record.
    pub fn new_record(&self) -> Record {
        Record::new()
    }

    pub fn find(&mut self, id: i64, relations: &[&str]) -> Result<Option<Record>> {
        self.ctx.find(self.store, id, relations)
    }

    pub fn find_or_fail(&mut self, id: i64, relations: &[&str]) -> Result<Record> {
        self.find(id, relations)?
            .ok_or_else(|| QuickDataError::not_found(&self.entity().name, id))
    }

    /// First record whose `column` equals `value`.
    pub fn find_by(&mut self, column: &str, value: impl Into<Value>) -> Result<Option<Record>> {
        let mut query = self.ctx.query(&[]);
        query.where_eq(column, value);
        self.ctx.executor().first(self.store, self.ctx.entity, &query)
    }

    pub fn find_by_uuid(&mut self, uuid: &str) -> Result<Option<Record>> {
        self.find_by("uuid", uuid)
    }

    pub fn find_by_slug(&mut self, slug: &str, field: &str) -> Result<Option<Record>> {
        self.find_by(field, slug)
    }

    pub fn create(&mut self, data: &Payload) -> Result<Record> {
        let ctx = self.ctx;
        self.store.transaction(|store| ctx.create(store, data))
    }

    pub fn update(&mut self, record: Record, data: &Payload) -> Result<Record> {
        let ctx = self.ctx;
        self.store.transaction(|store| ctx.update(store, record, data))
    }

    /// Persists the record's current attributes.
    pub fn save(&mut self, record: &mut Record) -> Result<()> {
        let entity = self.entity();
        self.store.transaction(|store| save(store, entity, record))
    }

    /// `None` creates; `Some(id)` loads and updates, failing with `NotFound`
    /// if the id does not exist.
    pub fn find_or_create(&mut self, id: Option<i64>, data: &Payload) -> Result<Record> {
        let ctx = self.ctx;
        self.store
            .transaction(|store| ctx.find_or_create(store, id, data))
    }

    /// Removes the record if present. Deleting an absent id still succeeds.
    pub fn delete(&mut self, id: i64) -> Result<bool> {
        let entity = self.entity();
        self.store.transaction(|store| {
            let removed = store.delete(&entity.table, &[id])?;
            quickdata_trace_op!("delete", entity = entity.name, id = id, removed = removed);
            Ok(true)
        })
    }

    pub fn all(&mut self, relations: &[&str]) -> Result<Vec<Record>> {
        let query = self.ctx.query(relations);
        self.ctx.executor().get(self.store, self.ctx.entity, &query)
    }

    pub fn all_as_list(&mut self) -> Result<Vec<ListItem>> {
        let records = self.all(&[])?;
        Ok(Self::convert_to_list(&records))
    }

    pub fn convert_to_list(records: &[Record]) -> Vec<ListItem> {
        records
            .iter()
            .map(|record| ListItem {
                value: record.get(PRIMARY_KEY).cloned().unwrap_or_default(),
                name: record.get("name").cloned().unwrap_or_default(),
            })
            .collect()
    }

    /// Substring pagination: each `filters` pair is ANDed as `LIKE %v%`, the
    /// `or_filters` pairs form one OR group. Always newest first.
    pub fn paginate(
        &mut self,
        per_page: u32,
        page: u32,
        relations: &[&str],
        filters: &[(&str, &str)],
        or_filters: &[(&str, &str)],
    ) -> Result<Page<Record>> {
        let mut query = self.ctx.query(relations);
        for (column, needle) in filters {
            query.and_where(Predicate::contains(*column, needle));
        }
        query.or_group(
            or_filters
                .iter()
                .map(|(column, needle)| Predicate::contains(*column, needle)),
        );
        query.order_by(PRIMARY_KEY, Direction::Desc);
        self.ctx
            .executor()
            .paginate(self.store, self.ctx.entity, query, per_page, page)
    }

    /// Runs a [`SearchFilter`] with the hooks' search scope. Non-empty
    /// `relations` replace the filter's eager loads.
    pub fn search(&mut self, relations: &[&str], filter: Option<SearchFilter>) -> Result<SearchResult> {
        self.search_scoped(relations, filter, None)
    }

    /// Like [`search`](Self::search), with an extra scope (a
    /// [`GeoDistanceFilter`](quickdata_core::GeoDistanceFilter), say) applied
    /// after the hooks' own.
    pub fn search_scoped(
        &mut self,
        relations: &[&str],
        filter: Option<SearchFilter>,
        scope: Option<&dyn QueryScope>,
    ) -> Result<SearchResult> {
        let mut filter = filter.unwrap_or_default();
        if !relations.is_empty() {
            filter = filter.with(relations.iter().copied());
        }
        let hooks = self.ctx.hooks;
        let combined = |query: &mut Query| -> Result<()> {
            hooks.scope_search(query)?;
            match scope {
                Some(scope) => scope.apply(query),
                None => Ok(()),
            }
        };
        let query = self.ctx.query(&[]);
        self.ctx
            .executor()
            .execute(self.store, self.ctx.entity, query, &filter, Some(&combined))
    }

    /// Applies the callbacks of the permissions `actor` holds to `query`.
    /// See [`authorize::authorize_query`].
    pub fn authorize_query(
        &self,
        query: &mut Query,
        actor: Option<&dyn Actor>,
        permissions: &QueryPermissions<'_>,
        reject_if_no_match: bool,
        break_on_first_match: bool,
    ) -> Result<usize> {
        authorize::authorize_query(
            query,
            actor,
            permissions,
            reject_if_no_match,
            break_on_first_match,
        )
    }

    /// Fills a new record (or the record `id`) from input, running the
    /// `fill_custom_fields` and `after_save` hooks around the save.
    pub fn fill_from_input(&mut self, input: &Payload, id: Option<i64>) -> Result<Record> {
        let ctx = self.ctx;
        self.store.transaction(|store| {
            let mut record = match id {
                None => Record::new(),
                Some(id) => ctx
                    .find(store, id, &[])?
                    .ok_or_else(|| QuickDataError::not_found(&ctx.entity().name, id))?,
            };
            fill(ctx.entity(), &mut record, input)?;
            ctx.hooks.fill_custom_fields(store, &mut record, input)?;
            save(store, ctx.entity(), &mut record)?;
            ctx.hooks.after_save(store, &mut record, input)?;
            Ok(record)
        })
    }

    /// `find_or_create` followed by a recursive sync of the nested relation
    /// data in `input`, as one transaction.
    pub fn store_or_update(&mut self, id: Option<i64>, input: &Payload) -> Result<Record> {
        let ctx = self.ctx;
        self.store.transaction(|store| {
            let mut record = ctx.find_or_create(store, id, input)?;
            RelationshipSynchronizer::new(ctx.schema, ctx.settings).sync_relationships(
                store,
                ctx.entity,
                &mut record,
                input,
                true,
            )?;
            Ok(record)
        })
    }
}
