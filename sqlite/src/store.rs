//! [`Store`] on a rusqlite connection.

use std::path::Path;

use quickdata_core::geo::haversine;
use quickdata_core::{
    Attributes, ColumnDef, GeoPoint, PivotRow, PivotTable, Query, Record, Result, Store, Value,
    quickdata_trace_query, quickdata_trace_tx,
};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqliteValue, ValueRef};
use rusqlite::{Connection, params_from_iter};

use crate::connection::SqliteTransactionType;
use crate::ddl;
use crate::render::{self, DISTANCE_FUNCTION};
use crate::sql::SQL;

pub struct SqliteStore {
    conn: Connection,
    tx_type: SqliteTransactionType,
    depth: usize,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("tx_type", &self.tx_type)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

fn to_sqlite(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Integer(i) => SqliteValue::Integer(*i),
        Value::Real(r) => SqliteValue::Real(*r),
        Value::Text(s) => SqliteValue::Text(s.clone()),
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn id_values(ids: &[i64]) -> Vec<Value> {
    ids.iter().copied().map(Value::Integer).collect()
}

/// Registers the haversine scalar used by distance filters.
fn register_distance(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        DISTANCE_FUNCTION,
        5,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let latitude: Option<f64> = ctx.get(0)?;
            let longitude: Option<f64> = ctx.get(1)?;
            let origin = GeoPoint::new(ctx.get(2)?, ctx.get(3)?);
            let earth_radius: f64 = ctx.get(4)?;
            Ok(latitude
                .zip(longitude)
                .map(|(lat, lng)| haversine(origin, GeoPoint::new(lat, lng), earth_radius)))
        },
    )
}

impl SqliteStore {
    /// Wraps an open connection and registers the distance function on it.
    pub fn new(conn: Connection) -> Result<Self> {
        register_distance(&conn)?;
        Ok(Self {
            conn,
            tx_type: SqliteTransactionType::default(),
            depth: 0,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Lock behaviour of the outermost `BEGIN`.
    pub fn with_transaction_type(mut self, tx_type: SqliteTransactionType) -> Self {
        self.tx_type = tx_type;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        quickdata_trace_query!(sql, 0);
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    pub fn create_table(&self, table: &str, columns: &[ColumnDef]) -> Result<()> {
        ddl::create_table(table, columns)
            .iter()
            .try_for_each(|statement| self.execute_raw(statement))
    }

    pub fn add_location(&self, table: &str) -> Result<()> {
        ddl::add_location(table)
            .iter()
            .try_for_each(|statement| self.execute_raw(statement))
    }

    pub fn drop_location(&self, table: &str) -> Result<()> {
        ddl::drop_location(table)
            .iter()
            .try_for_each(|statement| self.execute_raw(statement))
    }

    fn execute(&self, sql: &SQL<'_>) -> Result<u64> {
        let (text, params) = sql.build();
        quickdata_trace_query!(text, params.len());
        let mut stmt = self.conn.prepare_cached(&text)?;
        let changed = stmt.execute(params_from_iter(params.iter().map(|v| to_sqlite(v))))?;
        Ok(changed as u64)
    }

    fn query_rows(&self, sql: &SQL<'_>) -> Result<Vec<Attributes>> {
        let (text, params) = sql.build();
        quickdata_trace_query!(text, params.len());
        let mut stmt = self.conn.prepare_cached(&text)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(params.iter().map(|v| to_sqlite(v))))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut attributes = Attributes::new();
            for (i, name) in names.iter().enumerate() {
                attributes.insert(name.clone(), from_sqlite(row.get_ref(i)?));
            }
            out.push(attributes);
        }
        Ok(out)
    }
}

impl Store for SqliteStore {
    fn select(&mut self, query: &Query) -> Result<Vec<Record>> {
        Ok(self
            .query_rows(&render::select(query))?
            .into_iter()
            .map(Record::from_attributes)
            .collect())
    }

    fn count(&mut self, query: &Query) -> Result<u64> {
        let sql = render::count(query);
        let (text, params) = sql.build();
        quickdata_trace_query!(text, params.len());
        let count: i64 = self.conn.query_row(
            &text,
            params_from_iter(params.iter().map(|v| to_sqlite(v))),
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn insert(&mut self, table: &str, values: &Attributes) -> Result<i64> {
        self.execute(&render::insert(table, values))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&mut self, table: &str, id: i64, values: &Attributes) -> Result<u64> {
        self.execute(&render::update(table, id, values))
    }

    fn delete(&mut self, table: &str, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = id_values(ids);
        self.execute(&render::delete(table, &ids))
    }

    fn pivot_rows(&mut self, pivot: &PivotTable, parent_ids: &[i64]) -> Result<Vec<PivotRow>> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = id_values(parent_ids);
        let rows = self.query_rows(&render::pivot_rows(pivot, &ids))?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| {
                let parent_id = row.remove(&pivot.foreign_key)?.as_i64()?;
                let related_id = row.remove(&pivot.related_key)?.as_i64()?;
                Some(PivotRow {
                    parent_id,
                    related_id,
                    attributes: row,
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
        self.execute(&render::insert(&pivot.table, &row))?;
        Ok(())
    }

    fn detach(&mut self, pivot: &PivotTable, parent_id: i64, related_ids: &[i64]) -> Result<u64> {
        if related_ids.is_empty() {
            return Ok(0);
        }
        let ids = id_values(related_ids);
        self.execute(&render::detach(pivot, parent_id, &ids))
    }

    fn update_pivot(
        &mut self,
        pivot: &PivotTable,
        parent_id: i64,
        related_id: i64,
        attributes: &Attributes,
    ) -> Result<()> {
        if let Some(sql) = render::update_pivot(pivot, parent_id, related_id, attributes) {
            self.execute(&sql)?;
        }
        Ok(())
    }

    /// The outermost call opens a `BEGIN`; nested calls use savepoints so an
    /// inner failure only unwinds its own writes.
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let depth = self.depth;
        let savepoint = format!("quickdata_sp_{depth}");
        if depth == 0 {
            quickdata_trace_tx!("begin", "sqlite.rusqlite");
            self.execute_raw(self.tx_type.begin_statement())?;
        } else {
            quickdata_trace_tx!("savepoint", "sqlite.rusqlite");
            self.execute_raw(&format!("SAVEPOINT {savepoint}"))?;
        }
        self.depth = depth + 1;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(self)));

        self.depth = depth;
        let rollback = |store: &Self| {
            quickdata_trace_tx!("rollback", "sqlite.rusqlite");
            if depth == 0 {
                let _ = store.execute_raw("ROLLBACK");
            } else {
                let _ = store.execute_raw(&format!("ROLLBACK TO SAVEPOINT {savepoint}"));
                let _ = store.execute_raw(&format!("RELEASE SAVEPOINT {savepoint}"));
            }
        };

        match result {
            Ok(Ok(value)) => {
                quickdata_trace_tx!("commit", "sqlite.rusqlite");
                let finished = if depth == 0 {
                    self.execute_raw("COMMIT")
                } else {
                    self.execute_raw(&format!("RELEASE SAVEPOINT {savepoint}"))
                };
                // A failed COMMIT leaves the transaction open.
                if let Err(err) = finished {
                    rollback(&*self);
                    return Err(err);
                }
                Ok(value)
            }
            Ok(Err(err)) => {
                rollback(&*self);
                Err(err)
            }
            Err(panic_payload) => {
                rollback(&*self);
                std::panic::resume_unwind(panic_payload);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickdata_core::{ColumnType, Direction, QuickDataError};

    fn setup_db() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .create_table(
                "tags",
                &[
                    ColumnDef::new("name", ColumnType::Text),
                    ColumnDef::new("weight", ColumnType::Integer),
                ],
            )
            .unwrap();
        store
    }

    fn tag(name: &str, weight: i64) -> Attributes {
        let mut values = Attributes::new();
        values.insert("name".into(), name.into());
        values.insert("weight".into(), weight.into());
        values
    }

    #[test]
    fn insert_select_count() {
        let mut store = setup_db();
        for (name, weight) in [("a", 3), ("b", 1), ("c", 2)] {
            store.insert("tags", &tag(name, weight)).unwrap();
        }
        let mut q = Query::new("tags");
        q.where_op("weight", quickdata_core::Operator::Gt, 1)
            .unwrap()
            .order_by("weight", Direction::Asc);
        let rows = store.select(&q).unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.get("name").cloned()).collect();
        assert_eq!(names, [Some(Value::from("c")), Some(Value::from("a"))]);
        assert_eq!(store.count(&q).unwrap(), 2);
    }

    #[test]
    fn nested_failure_rolls_back_only_the_savepoint() {
        let mut store = setup_db();
        store
            .transaction(|s| {
                s.insert("tags", &tag("outer", 1))?;
                let inner: Result<()> = s.transaction(|s| {
                    s.insert("tags", &tag("inner", 2))?;
                    Err(QuickDataError::Store("boom".into()))
                });
                assert!(inner.is_err());
                Ok(())
            })
            .unwrap();
        assert_eq!(store.count(&Query::new("tags")).unwrap(), 1);
    }

    #[test]
    fn failed_transaction_leaves_no_rows() {
        let mut store = setup_db();
        let result: Result<()> = store.transaction(|s| {
            s.insert("tags", &tag("gone", 1))?;
            Err(QuickDataError::Store("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.count(&Query::new("tags")).unwrap(), 0);
    }

    #[test]
    fn failed_commit_rolls_back_and_frees_the_connection() {
        let mut store = setup_db();
        store
            .execute_raw(
                "PRAGMA foreign_keys = ON;
                 CREATE TABLE owners (id INTEGER PRIMARY KEY);
                 CREATE TABLE pets (
                     id INTEGER PRIMARY KEY,
                     owner_id INTEGER REFERENCES owners(id) DEFERRABLE INITIALLY DEFERRED
                 );",
            )
            .unwrap();

        let mut orphan = Attributes::new();
        orphan.insert("owner_id".into(), 99.into());
        // the deferred foreign key only fails at COMMIT
        let result = store.transaction(|s| s.insert("pets", &orphan));
        assert!(result.is_err());

        store
            .transaction(|s| s.insert("tags", &tag("after", 1)))
            .unwrap();
        assert_eq!(store.count(&Query::new("pets")).unwrap(), 0);
        assert_eq!(store.count(&Query::new("tags")).unwrap(), 1);
    }

    #[test]
    fn distance_function_returns_null_without_coordinates() {
        let store = SqliteStore::open_in_memory().unwrap();
        let d: Option<f64> = store
            .connection()
            .query_row(
                "SELECT quickdata_distance(NULL, 13.4, 52.5, 13.4, 6371.0)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(d, None);
        let d: f64 = store
            .connection()
            .query_row(
                "SELECT quickdata_distance(52.5, 13.4, 52.5, 13.4, 6371.0)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(d.abs() < 1e-9);
    }
}
