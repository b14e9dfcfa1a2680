//! Entity and relation metadata.
//!
//! Entities live in an arena ([`Schema`]) and relations point at each other by
//! [`EntityId`], so the relation graph is declared once and walked without
//! reflection or runtime method lookups.

use hashbrown::HashMap;

use crate::error::{QuickDataError, Result};

/// Every entity is keyed by an integer `id` column.
pub const PRIMARY_KEY: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(usize);

/// Junction table of a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotTable {
    pub table: String,
    /// Column holding the parent's key
    pub foreign_key: String,
    /// Column holding the related entity's key
    pub related_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// Children carry `foreign_key = parent.id`
    HasMany { foreign_key: String },
    /// Linked through a pivot table; only `fillable_pivot` columns may be set
    /// from input
    ManyToMany {
        pivot: PivotTable,
        fillable_pivot: Vec<String>,
    },
}

impl RelationKind {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::HasMany { .. } => "has-many",
            Self::ManyToMany { .. } => "many-to-many",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDescriptor {
    pub name: String,
    pub related: EntityId,
    pub kind: RelationKind,
}

/// Field rules checked before a store or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Required,
    Numeric,
    MaxLength(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    pub name: String,
    pub table: String,
    pub fillable: Vec<String>,
    pub searchable: Vec<String>,
    pub relations: Vec<RelationDescriptor>,
    /// Many-to-many relations reconciled on store/update
    pub sync_many_to_many: Vec<String>,
    /// Has-many relations reconciled on store/update
    pub sync_has_many: Vec<String>,
    pub rules: Vec<(String, Vec<Rule>)>,
}

impl EntitySchema {
    /// Entity named after its table.
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            name: table.clone(),
            table,
            fillable: Vec::new(),
            searchable: Vec::new(),
            relations: Vec::new(),
            sync_many_to_many: Vec::new(),
            sync_has_many: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn fillable<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fillable = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn searchable<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Names of many-to-many relations to reconcile from input. Names that do
    /// not resolve to a declared relation are skipped at sync time.
    pub fn syncs_many_to_many<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sync_many_to_many = relations.into_iter().map(Into::into).collect();
        self
    }

    /// Names of has-many relations to reconcile from input.
    pub fn syncs_has_many<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sync_has_many = relations.into_iter().map(Into::into).collect();
        self
    }

    pub fn rule(mut self, field: impl Into<String>, rules: Vec<Rule>) -> Self {
        self.rules.push((field.into(), rules));
        self
    }

    pub fn is_fillable(&self, column: &str) -> bool {
        column != PRIMARY_KEY && self.fillable.iter().any(|c| c == column)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.name == name)
    }
}

/// Arena of entity schemas.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: Vec<EntitySchema>,
    by_name: HashMap<String, EntityId>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity; re-registering a name replaces its schema.
    pub fn entity(&mut self, schema: EntitySchema) -> EntityId {
        if let Some(&id) = self.by_name.get(&schema.name) {
            self.entities[id.0] = schema;
            return id;
        }
        let id = EntityId(self.entities.len());
        self.by_name.insert(schema.name.clone(), id);
        self.entities.push(schema);
        id
    }

    pub fn get(&self, id: EntityId) -> &EntitySchema {
        &self.entities[id.0]
    }

    pub fn id_of(&self, name: &str) -> Result<EntityId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| QuickDataError::UnknownEntity(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn relation(&self, owner: EntityId, name: &str) -> Result<&RelationDescriptor> {
        let entity = self.get(owner);
        entity
            .relation(name)
            .ok_or_else(|| QuickDataError::UnknownRelation {
                entity: entity.name.clone(),
                relation: name.to_string(),
            })
    }

    /// Declares `owner.name` as children of `related` keyed by `foreign_key`.
    pub fn has_many(
        &mut self,
        owner: EntityId,
        name: impl Into<String>,
        related: EntityId,
        foreign_key: impl Into<String>,
    ) -> &mut Self {
        self.push_relation(
            owner,
            RelationDescriptor {
                name: name.into(),
                related,
                kind: RelationKind::HasMany {
                    foreign_key: foreign_key.into(),
                },
            },
        )
    }

    /// Declares `owner.name` as linked to `related` through `pivot`.
    pub fn many_to_many<I, S>(
        &mut self,
        owner: EntityId,
        name: impl Into<String>,
        related: EntityId,
        pivot: PivotTable,
        fillable_pivot: I,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_relation(
            owner,
            RelationDescriptor {
                name: name.into(),
                related,
                kind: RelationKind::ManyToMany {
                    pivot,
                    fillable_pivot: fillable_pivot.into_iter().map(Into::into).collect(),
                },
            },
        )
    }

    fn push_relation(&mut self, owner: EntityId, relation: RelationDescriptor) -> &mut Self {
        let relations = &mut self.entities[owner.0].relations;
        relations.retain(|r| r.name != relation.name);
        relations.push(relation);
        self
    }
}

impl PivotTable {
    pub fn new(
        table: impl Into<String>,
        foreign_key: impl Into<String>,
        related_key: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            foreign_key: foreign_key.into(),
            related_key: related_key.into(),
        }
    }
}

/// Storage class of a declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub indexed: bool,
}

impl ColumnDef {
    /// Nullable, unindexed column.
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
            indexed: false,
        }
    }

    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub const fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

const fn text(name: &'static str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::Text)
}

/// Place columns compatible with the public Graph API location fields.
pub const LOCATION_COLUMNS: &[ColumnDef] = &[
    text("name"),
    text("long_name"),
    text("venue"),
    text("address"),
    text("formatted_address"),
    text("street"),
    text("street_2"),
    text("city"),
    text("state"),
    text("state_iso_code"),
    text("zip"),
    text("country"),
    text("country_iso_code").indexed(),
    ColumnDef::new("latitude", ColumnType::Real).indexed(),
    ColumnDef::new("longitude", ColumnType::Real).indexed(),
    text("phone"),
    text("phone_iso"),
    text("email"),
    text("website"),
    text("location_type"),
];
