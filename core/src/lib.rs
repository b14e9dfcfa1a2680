//! Core types for quickdata: values and records, the predicate model, entity
//! schemas, the [`Store`] trait with an in-memory implementation, and the
//! [`QueryExecutor`] that turns a [`SearchFilter`] into results.

pub mod config;
pub mod error;
pub mod executor;
pub mod filter;
pub mod geo;
pub mod page;
pub mod predicate;
pub mod query;
pub mod schema;
pub mod store;
pub mod tracing;
pub mod value;

pub use config::{PredicatePolicy, Settings};
pub use error::{QuickDataError, Result};
pub use executor::{QueryExecutor, compile_clause};
pub use filter::{SearchFilter, WhereClause};
pub use geo::{DistanceExpr, DistanceUnit, GeoDistanceFilter, GeoPoint, Radius};
pub use page::{Page, SearchResult};
pub use predicate::{Condition, Direction, Operand, Operator, OrderBy, Predicate};
pub use query::{Query, QueryScope};
pub use schema::{
    ColumnDef, ColumnType, EntityId, EntitySchema, LOCATION_COLUMNS, PRIMARY_KEY, PivotTable, RelationDescriptor,
    RelationKind, Rule, Schema,
};
pub use store::{MemoryStore, PivotRow, Store};
pub use value::{Attributes, Payload, Record, Value, payload_id};
