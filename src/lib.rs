//! # quickdata
//!
//! Filtered queries, repositories and nested relationship sync over a
//! relational store.
//!
//! ## Quick Start
//!
//! ```rust
//! use quickdata::prelude::*;
//! use serde_json::json;
//!
//! # fn main() -> quickdata::Result<()> {
//! let mut schema = Schema::new();
//! let posts = schema.entity(
//!     EntitySchema::new("posts")
//!         .fillable(["title"])
//!         .searchable(["title"]),
//! );
//!
//! let mut data = QuickData::new(MemoryStore::new(), schema);
//! let mut repo = data.repository("posts")?;
//! let input = json!({ "title": "Rust tips" });
//! repo.create(input.as_object().unwrap())?;
//!
//! let result = repo.search(&[], Some(SearchFilter::new().set_search_query("rust")))?;
//! assert_eq!(result.records().len(), 1);
//! # let _ = posts;
//! # Ok(())
//! # }
//! ```
//!
//! ## Stores
//!
//! | Store         | Backend  | Feature Flag |
//! |---------------|----------|--------------|
//! | `MemoryStore` | in-process tables | always |
//! | `SqliteStore` | rusqlite | `rusqlite`   |

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod authorize;
pub mod crud;
mod repository;
pub mod seed;
pub mod sync;

// =============================================================================
// Root-level exports
// =============================================================================

/// Result type for quickdata operations
pub use quickdata_core::error::Result;

/// Error types
pub mod error {
    pub use quickdata_core::error::QuickDataError;
}

pub use authorize::{Actor, PermissionRule, QueryPermissions, authorize_query};
pub use crud::{FieldData, JsonCrud, ListParams, ValidationFailure, flatten_pivots, into_response};
pub use repository::{ListItem, NoHooks, Repository, RepositoryHooks};
pub use seed::{SeedEntry, seed_without_duplicates};
pub use sync::{RelationshipSynchronizer, SyncChanges};

/// Core types shared by every store.
pub mod core {
    pub use quickdata_core::*;
}

/// SQLite rendering and the rusqlite-backed store.
#[cfg(feature = "rusqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "rusqlite")))]
pub mod sqlite {
    pub use quickdata_sqlite::*;
}

#[cfg(feature = "rusqlite")]
pub use quickdata_sqlite::SqliteStore;

use quickdata_core::{Schema, Settings, Store};

/// A store together with the schema and settings every repository shares.
#[derive(Debug)]
pub struct QuickData<S: Store> {
    store: S,
    schema: Schema,
    settings: Settings,
}

impl<S: Store> QuickData<S> {
    pub fn new(store: S, schema: Schema) -> Self {
        Self {
            store,
            schema,
            settings: Settings::default(),
        }
    }

    /// Replaces the settings after checking them.
    pub fn with_settings(mut self, settings: Settings) -> Result<Self> {
        settings.validate()?;
        self.settings = settings;
        Ok(self)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Repository for the entity registered under `name`.
    pub fn repository(&mut self, name: &str) -> Result<Repository<'_, S>> {
        let entity = self.schema.id_of(name)?;
        Ok(Repository::new(
            &mut self.store,
            &self.schema,
            &self.settings,
            entity,
        ))
    }

    /// CRUD endpoints for the entity registered under `name`.
    pub fn crud(&mut self, name: &str) -> Result<JsonCrud<'_, S>> {
        Ok(JsonCrud::new(self.repository(name)?))
    }

    /// Runs `f` against the store in one transaction.
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut S) -> Result<T>,
    {
        self.store.transaction(f)
    }
}

impl<S: Store> From<(S, Schema)> for QuickData<S> {
    fn from((store, schema): (S, Schema)) -> Self {
        Self::new(store, schema)
    }
}

/// Everything needed to declare a schema, run searches and sync input.
///
/// ```rust
/// use quickdata::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Actor, JsonCrud, ListParams, QueryPermissions, QuickData, Repository, RepositoryHooks,
        SeedEntry, seed_without_duplicates,
    };
    pub use quickdata_core::{
        Direction, DistanceUnit, EntitySchema, GeoDistanceFilter, GeoPoint, MemoryStore, Page,
        PivotTable, Query, QueryScope, QuickDataError, Radius, Record, Rule, Schema, SearchFilter,
        SearchResult, Settings, Store, Value,
    };

    #[cfg(feature = "rusqlite")]
    pub use crate::SqliteStore;
}
