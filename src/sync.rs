//! Reconciles nested relation payloads against the store.
//!
//! Has-many children are owned through a foreign key: the payload list is
//! authoritative, so existing children missing from it are deleted.
//! Many-to-many links live in a pivot table: the payload becomes the new
//! link set, with pivot columns restricted to the relation's whitelist.

use std::collections::BTreeSet;

use quickdata_core::{
    Attributes, EntityId, PRIMARY_KEY, Payload, PivotTable, Query, QueryExecutor, QuickDataError,
    Record, RelationDescriptor, RelationKind, Result, Schema, Settings, Store, Value, payload_id,
    quickdata_trace_op, quickdata_warn,
};
use serde_json::Value as Json;

use crate::repository::{fill, save};

/// Outcome of a many-to-many reconciliation, by related id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncChanges {
    pub attached: Vec<i64>,
    pub detached: Vec<i64>,
    pub updated: Vec<i64>,
}

#[derive(Debug, Clone, Copy)]
pub struct RelationshipSynchronizer<'a> {
    schema: &'a Schema,
    settings: &'a Settings,
}

/// Payload under a relation key: absent leaves the relation alone, `null`
/// clears it, an array replaces it.
fn children<'p>(input: &'p Payload, relation: &str) -> Result<Option<&'p [Json]>> {
    match input.get(relation) {
        None => Ok(None),
        Some(Json::Null) => Ok(Some(&[])),
        Some(Json::Array(items)) => Ok(Some(items.as_slice())),
        Some(_) => Err(QuickDataError::InvalidPayload {
            field: relation.to_string(),
            reason: "expected an array of related items".into(),
        }),
    }
}

fn object<'p>(item: &'p Json, relation: &str) -> Result<&'p Payload> {
    item.as_object().ok_or_else(|| QuickDataError::InvalidPayload {
        field: relation.to_string(),
        reason: "expected an object".into(),
    })
}

impl<'a> RelationshipSynchronizer<'a> {
    pub const fn new(schema: &'a Schema, settings: &'a Settings) -> Self {
        Self { schema, settings }
    }

    /// Syncs every relation `entity` declares as synced, taking data from
    /// the matching keys of `input`. With `recursive`, has-many children are
    /// synced against their own declarations too.
    pub fn sync_relationships<S: Store>(
        &self,
        store: &mut S,
        entity: EntityId,
        parent: &mut Record,
        input: &Payload,
        recursive: bool,
    ) -> Result<()> {
        self.sync_at(store, entity, parent, input, recursive, 0)
    }

    fn sync_at<S: Store>(
        &self,
        store: &mut S,
        entity: EntityId,
        parent: &mut Record,
        input: &Payload,
        recursive: bool,
        depth: usize,
    ) -> Result<()> {
        let schema = self.schema.get(entity);
        let pending = schema
            .sync_many_to_many
            .iter()
            .chain(&schema.sync_has_many)
            .any(|name| input.contains_key(name));
        if !pending {
            return Ok(());
        }
        if depth > self.settings.max_sync_depth {
            return Err(QuickDataError::SyncDepthExceeded(self.settings.max_sync_depth));
        }

        for name in &schema.sync_many_to_many {
            let Some(relation) = self.declared(entity, name, "many-to-many")? else {
                continue;
            };
            if let Some(items) = children(input, name)? {
                self.sync_many_to_many(store, entity, parent, items, relation)?;
            }
        }

        for name in &schema.sync_has_many {
            let Some(relation) = self.declared(entity, name, "has-many")? else {
                continue;
            };
            if let Some(items) = children(input, name)? {
                self.sync_children(store, entity, parent, items, relation, recursive, depth)?;
            }
        }
        Ok(())
    }

    /// The descriptor for a synced relation name. Names without one are
    /// skipped; a descriptor of the other kind is an error.
    fn declared(
        &self,
        entity: EntityId,
        name: &str,
        expected: &'static str,
    ) -> Result<Option<&'a RelationDescriptor>> {
        let schema = self.schema.get(entity);
        let Some(relation) = schema.relation(name) else {
            quickdata_warn!(
                entity = %schema.name,
                relation = name,
                "quickdata.sync: no such relation, skipping"
            );
            return Ok(None);
        };
        if relation.kind.label() != expected {
            return Err(QuickDataError::RelationKindMismatch {
                entity: schema.name.clone(),
                relation: name.to_string(),
                expected,
            });
        }
        Ok(Some(relation))
    }

    /// Creates children without an id, updates known ones, deletes existing
    /// children not in `items`, and sets `parent`'s relation to the result.
    /// Ids that do not resolve to a row are skipped.
    pub fn sync_has_many<S: Store>(
        &self,
        store: &mut S,
        owner: EntityId,
        parent: &mut Record,
        items: &[Json],
        relation: &RelationDescriptor,
        recursive: bool,
    ) -> Result<()> {
        self.sync_children(store, owner, parent, items, relation, recursive, 0)
    }

    #[allow(clippy::too_many_arguments)]
    fn sync_children<S: Store>(
        &self,
        store: &mut S,
        owner: EntityId,
        parent: &mut Record,
        items: &[Json],
        relation: &RelationDescriptor,
        recursive: bool,
        depth: usize,
    ) -> Result<()> {
        let RelationKind::HasMany { foreign_key } = &relation.kind else {
            return Err(self.mismatch(owner, relation, "has-many"));
        };
        let parent_id = self.parent_id(parent)?;
        let related = self.schema.get(relation.related);
        let executor = QueryExecutor::new(self.schema, self.settings);

        let mut current = Query::new(related.table.clone());
        current.where_eq(foreign_key.as_str(), parent_id);
        let existing: BTreeSet<i64> = store
            .select(&current)?
            .iter()
            .filter_map(Record::id)
            .collect();

        let mut kept: Vec<Record> = Vec::new();
        let mut kept_ids = BTreeSet::new();
        for item in items {
            let data = object(item, &relation.name)?;
            // A repeated id merges into the child already kept for it.
            let slot = payload_id(data)
                .and_then(|id| kept.iter().position(|c| c.id() == Some(id)));
            let mut child = match (slot, payload_id(data)) {
                (Some(index), _) => kept[index].clone(),
                (None, None) => Record::new(),
                (None, Some(id)) => {
                    let mut by_id = Query::new(related.table.clone());
                    by_id.where_eq(PRIMARY_KEY, id);
                    match executor.first(store, relation.related, &by_id)? {
                        Some(found) => found,
                        None => {
                            quickdata_warn!(
                                relation = %relation.name,
                                id,
                                "quickdata.sync: unknown child id, skipping"
                            );
                            continue;
                        }
                    }
                }
            };
            if data.is_empty() {
                continue;
            }
            fill(related, &mut child, data)?;
            child.set(foreign_key.as_str(), parent_id);
            save(store, related, &mut child)?;
            if recursive {
                self.sync_at(store, relation.related, &mut child, data, recursive, depth + 1)?;
            }
            if let Some(id) = child.id() {
                kept_ids.insert(id);
            }
            match slot {
                Some(index) => kept[index] = child,
                None => kept.push(child),
            }
        }

        let removed: Vec<i64> = existing.difference(&kept_ids).copied().collect();
        if !removed.is_empty() {
            store.delete(&related.table, &removed)?;
        }
        quickdata_trace_op!(
            "sync_has_many",
            relation = relation.name,
            kept = kept.len(),
            removed = removed.len()
        );
        parent.relations.insert(relation.name.clone(), kept);
        Ok(())
    }

    /// Makes `parent`'s links through `relation` exactly the items given.
    /// Items without an id are created first. Items with an id (or a bare
    /// id) carry the whitelisted pivot columns. Afterwards `parent`'s
    /// relation holds the linked records with their pivots.
    pub fn sync_many_to_many<S: Store>(
        &self,
        store: &mut S,
        owner: EntityId,
        parent: &mut Record,
        items: &[Json],
        relation: &RelationDescriptor,
    ) -> Result<SyncChanges> {
        let RelationKind::ManyToMany {
            pivot,
            fillable_pivot,
        } = &relation.kind
        else {
            return Err(self.mismatch(owner, relation, "many-to-many"));
        };
        let parent_id = self.parent_id(parent)?;
        let related = self.schema.get(relation.related);

        let mut target: Vec<(i64, Attributes)> = Vec::new();
        for item in items {
            let (id, data) = match item {
                Json::Object(data) => match payload_id(data) {
                    Some(id) => (id, data),
                    None => {
                        let mut created = Record::new();
                        fill(related, &mut created, data)?;
                        save(store, related, &mut created)?;
                        let id = created.id().ok_or_else(|| {
                            QuickDataError::Store("insert returned no id".into())
                        })?;
                        (id, data)
                    }
                },
                scalar => {
                    let id = Value::from_json(scalar)
                        .and_then(|v| v.as_i64())
                        .ok_or_else(|| QuickDataError::InvalidPayload {
                            field: relation.name.clone(),
                            reason: "expected an object or an id".into(),
                        })?;
                    if !target.iter().any(|(existing, _)| *existing == id) {
                        target.push((id, Attributes::new()));
                    }
                    continue;
                }
            };
            let columns = pivot_columns(data, fillable_pivot, &relation.name)?;
            match target.iter_mut().find(|(existing, _)| *existing == id) {
                Some((_, attributes)) => *attributes = columns,
                None => target.push((id, columns)),
            }
        }

        let changes = reconcile(store, pivot, parent_id, &target)?;
        quickdata_trace_op!(
            "sync_many_to_many",
            relation = relation.name,
            attached = changes.attached.len(),
            detached = changes.detached.len(),
            updated = changes.updated.len()
        );

        QueryExecutor::new(self.schema, self.settings).load(
            store,
            owner,
            std::slice::from_mut(parent),
            &[relation.name.clone()],
            &[],
        )?;
        Ok(changes)
    }

    fn parent_id(&self, parent: &Record) -> Result<i64> {
        parent.id().ok_or_else(|| {
            QuickDataError::InvalidArgument("parent must be saved before syncing relations".into())
        })
    }

    fn mismatch(
        &self,
        owner: EntityId,
        relation: &RelationDescriptor,
        expected: &'static str,
    ) -> QuickDataError {
        QuickDataError::RelationKindMismatch {
            entity: self.schema.get(owner).name.clone(),
            relation: relation.name.clone(),
            expected,
        }
    }
}

fn pivot_columns(data: &Payload, fillable: &[String], relation: &str) -> Result<Attributes> {
    let mut columns = Attributes::new();
    for (column, json) in data {
        if !fillable.iter().any(|f| f == column) {
            continue;
        }
        let value = Value::from_json(json).ok_or_else(|| QuickDataError::InvalidPayload {
            field: format!("{relation}.{column}"),
            reason: "expected a scalar value".into(),
        })?;
        columns.insert(column.clone(), value);
    }
    Ok(columns)
}

/// Detaches links not in `target`, attaches new ones, and rewrites pivot
/// columns that changed on links kept.
fn reconcile<S: Store>(
    store: &mut S,
    pivot: &PivotTable,
    parent_id: i64,
    target: &[(i64, Attributes)],
) -> Result<SyncChanges> {
    let current = store.pivot_rows(pivot, &[parent_id])?;
    let mut changes = SyncChanges::default();

    for row in &current {
        if !target.iter().any(|(id, _)| *id == row.related_id)
            && !changes.detached.contains(&row.related_id)
        {
            changes.detached.push(row.related_id);
        }
    }
    if !changes.detached.is_empty() {
        store.detach(pivot, parent_id, &changes.detached)?;
    }

    for (id, attributes) in target {
        match current.iter().find(|row| row.related_id == *id) {
            None => {
                store.attach(pivot, parent_id, *id, attributes)?;
                changes.attached.push(*id);
            }
            Some(row) => {
                let changed = attributes
                    .iter()
                    .any(|(column, value)| row.attributes.get(column) != Some(value));
                if changed {
                    store.update_pivot(pivot, parent_id, *id, attributes)?;
                    changes.updated.push(*id);
                }
            }
        }
    }
    Ok(changes)
}
