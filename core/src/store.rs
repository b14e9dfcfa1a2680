//! The relational store boundary.
//!
//! Everything above this trait (executor, repository, synchronizer) talks to
//! storage only through these primitives, so any driver that implements them is
//! substitutable.

mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::query::Query;
use crate::schema::PivotTable;
use crate::value::{Attributes, Record};

/// One junction-table row.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    pub parent_id: i64,
    pub related_id: i64,
    /// Extra pivot columns, excluding the two keys
    pub attributes: Attributes,
}

pub trait Store {
    /// Rows matching `query`, computed columns included, ordered and windowed.
    fn select(&mut self, query: &Query) -> Result<Vec<Record>>;

    /// Number of rows matching `query`'s condition.
    fn count(&mut self, query: &Query) -> Result<u64>;

    /// Inserts a row and returns its primary key. An `id` in `values` is used
    /// as given.
    fn insert(&mut self, table: &str, values: &Attributes) -> Result<i64>;

    /// Updates columns of one row; returns affected row count.
    fn update(&mut self, table: &str, id: i64, values: &Attributes) -> Result<u64>;

    /// Deletes rows by primary key; returns affected row count.
    fn delete(&mut self, table: &str, ids: &[i64]) -> Result<u64>;

    /// Pivot rows for any of `parent_ids`, ordered by insertion.
    fn pivot_rows(&mut self, pivot: &PivotTable, parent_ids: &[i64]) -> Result<Vec<PivotRow>>;

    fn attach(
        &mut self,
        pivot: &PivotTable,
        parent_id: i64,
        related_id: i64,
        attributes: &Attributes,
    ) -> Result<()>;

    fn detach(&mut self, pivot: &PivotTable, parent_id: i64, related_ids: &[i64]) -> Result<u64>;

    fn update_pivot(
        &mut self,
        pivot: &PivotTable,
        parent_id: i64,
        related_id: i64,
        attributes: &Attributes,
    ) -> Result<()>;

    /// Runs `f` atomically. Nested calls join the outer transaction and roll
    /// back only their own changes on error.
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T>;
}
