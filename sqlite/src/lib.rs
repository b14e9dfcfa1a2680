//! SQLite backend for quickdata
//!
//! Renders [`Query`](quickdata_core::Query) descriptions and row writes as
//! SQLite statements, and (with the `rusqlite` feature) runs them through
//! [`SqliteStore`].

pub mod connection;
pub mod ddl;
pub mod render;
pub mod sql;
#[cfg(feature = "rusqlite")]
mod store;

pub use connection::SqliteTransactionType;
pub use sql::{SQL, SQLChunk};
#[cfg(feature = "rusqlite")]
pub use store::SqliteStore;
