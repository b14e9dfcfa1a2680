use std::cmp::Ordering;

use hashbrown::HashMap;

use crate::error::{QuickDataError, Result};
use crate::query::Query;
use crate::schema::PivotTable;
use crate::store::{PivotRow, Store};
use crate::value::{Attributes, Record, Value};
use crate::{quickdata_trace_query, quickdata_trace_tx};

#[derive(Debug, Clone, Default)]
struct Table {
    rows: Vec<Attributes>,
    next_id: i64,
}

#[derive(Debug, Clone, Default)]
struct State {
    tables: HashMap<String, Table>,
    pivots: HashMap<String, Vec<Attributes>>,
}

/// In-process store. Tables spring into existence on first insert; a select on
/// an unknown table returns no rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: State,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows of a table in insertion order.
    pub fn rows(&self, table: &str) -> &[Attributes] {
        self.state
            .tables
            .get(table)
            .map_or(&[], |t| t.rows.as_slice())
    }

    pub fn pivot_table(&self, table: &str) -> &[Attributes] {
        self.state.pivots.get(table).map_or(&[], Vec::as_slice)
    }
}

fn row_id(row: &Attributes) -> Option<i64> {
    row.get("id").and_then(Value::as_i64)
}

fn compare_rows(a: &Attributes, b: &Attributes, query: &Query) -> Ordering {
    for order in &query.orders {
        let left = a.get(&order.column).unwrap_or(&Value::Null);
        let right = b.get(&order.column).unwrap_or(&Value::Null);
        let ord = left.sort_cmp(right);
        let ord = match order.direction {
            crate::predicate::Direction::Asc => ord,
            crate::predicate::Direction::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl MemoryStore {
    fn matching(&self, query: &Query) -> Vec<Attributes> {
        let Some(table) = self.state.tables.get(&query.table) else {
            return Vec::new();
        };
        table
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                for (alias, expr) in &query.computed {
                    row.insert(alias.clone(), expr.evaluate(&row).into());
                }
                row
            })
            .filter(|row| query.condition.matches(row))
            .collect()
    }
}

impl Store for MemoryStore {
    fn select(&mut self, query: &Query) -> Result<Vec<Record>> {
        quickdata_trace_query!(format!("memory select {}", query.table), 0);
        let mut rows = self.matching(query);
        // stable sort keeps insertion order among ties
        rows.sort_by(|a, b| compare_rows(a, b, query));
        let offset = usize::try_from(query.offset.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(Record::from_attributes)
            .collect())
    }

    fn count(&mut self, query: &Query) -> Result<u64> {
        Ok(self.matching(query).len() as u64)
    }

    fn insert(&mut self, table: &str, values: &Attributes) -> Result<i64> {
        let table = self.state.tables.entry(table.to_string()).or_default();
        let id = match row_id(values) {
            Some(id) => {
                if table.rows.iter().any(|r| row_id(r) == Some(id)) {
                    return Err(QuickDataError::Store(format!(
                        "duplicate primary key {id}"
                    )));
                }
                id
            }
            None => table.next_id + 1,
        };
        table.next_id = table.next_id.max(id);
        let mut row = values.clone();
        row.insert("id".to_string(), Value::Integer(id));
        table.rows.push(row);
        Ok(id)
    }

    fn update(&mut self, table: &str, id: i64, values: &Attributes) -> Result<u64> {
        let Some(table) = self.state.tables.get_mut(table) else {
            return Ok(0);
        };
        let Some(row) = table.rows.iter_mut().find(|r| row_id(r) == Some(id)) else {
            return Ok(0);
        };
        for (column, value) in values {
            if column != "id" {
                row.insert(column.clone(), value.clone());
            }
        }
        Ok(1)
    }

    fn delete(&mut self, table: &str, ids: &[i64]) -> Result<u64> {
        let Some(table) = self.state.tables.get_mut(table) else {
            return Ok(0);
        };
        let before = table.rows.len();
        table
            .rows
            .retain(|r| row_id(r).is_none_or(|id| !ids.contains(&id)));
        Ok((before - table.rows.len()) as u64)
    }

    fn pivot_rows(&mut self, pivot: &PivotTable, parent_ids: &[i64]) -> Result<Vec<PivotRow>> {
        let rows = self.pivot_table(&pivot.table);
        Ok(rows
            .iter()
            .filter_map(|row| {
                let parent_id = row.get(&pivot.foreign_key).and_then(Value::as_i64)?;
                let related_id = row.get(&pivot.related_key).and_then(Value::as_i64)?;
                if !parent_ids.contains(&parent_id) {
                    return None;
                }
                let attributes = row
                    .iter()
                    .filter(|(k, _)| **k != pivot.foreign_key && **k != pivot.related_key)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Some(PivotRow {
                    parent_id,
                    related_id,
                    attributes,
                })
            })
            .collect())
    }

    fn attach(
        &mut self,
        pivot: &PivotTable,
        parent_id: i64,
        related_id: i64,
        attributes: &Attributes,
    ) -> Result<()> {
        let mut row = attributes.clone();
        row.insert(pivot.foreign_key.clone(), Value::Integer(parent_id));
        row.insert(pivot.related_key.clone(), Value::Integer(related_id));
        self.state
            .pivots
            .entry(pivot.table.clone())
            .or_default()
            .push(row);
        Ok(())
    }

    fn detach(&mut self, pivot: &PivotTable, parent_id: i64, related_ids: &[i64]) -> Result<u64> {
        let Some(rows) = self.state.pivots.get_mut(&pivot.table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| {
            let parent = row.get(&pivot.foreign_key).and_then(Value::as_i64);
            let related = row.get(&pivot.related_key).and_then(Value::as_i64);
            !(parent == Some(parent_id) && related.is_some_and(|r| related_ids.contains(&r)))
        });
        Ok((before - rows.len()) as u64)
    }

    fn update_pivot(
        &mut self,
        pivot: &PivotTable,
        parent_id: i64,
        related_id: i64,
        attributes: &Attributes,
    ) -> Result<()> {
        if let Some(rows) = self.state.pivots.get_mut(&pivot.table) {
            for row in rows.iter_mut().filter(|row| {
                row.get(&pivot.foreign_key).and_then(Value::as_i64) == Some(parent_id)
                    && row.get(&pivot.related_key).and_then(Value::as_i64) == Some(related_id)
            }) {
                for (column, value) in attributes {
                    row.insert(column.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        quickdata_trace_tx!("begin", "memory");
        let snapshot = self.state.clone();
        match f(self) {
            Ok(value) => {
                quickdata_trace_tx!("commit", "memory");
                Ok(value)
            }
            Err(err) => {
                quickdata_trace_tx!("rollback", "memory");
                self.state = snapshot;
                Err(err)
            }
        }
    }
}
