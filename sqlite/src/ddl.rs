//! Table and column statements.

use quickdata_core::{ColumnDef, ColumnType, LOCATION_COLUMNS, PRIMARY_KEY};

use crate::sql::SQL;

const fn type_name(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Integer => "INTEGER",
        ColumnType::Real => "REAL",
        ColumnType::Text => "TEXT",
    }
}

fn column<'a>(def: &ColumnDef) -> SQL<'a> {
    let sql = SQL::ident(def.name).push_raw(type_name(def.ty));
    if def.nullable {
        sql
    } else {
        sql.push_raw("NOT NULL")
    }
}

fn index_name(table: &str, column: &str) -> String {
    format!("{table}_{column}_index")
}

fn create_index(table: &str, column: &str) -> String {
    SQL::raw("CREATE INDEX IF NOT EXISTS")
        .append(SQL::ident(index_name(table, column)))
        .push_raw("ON")
        .append(SQL::ident(table))
        .append(SQL::ident(column).parens())
        .sql()
}

/// `CREATE TABLE` with an integer primary key followed by `columns`, plus
/// one `CREATE INDEX` per indexed column.
pub fn create_table(table: &str, columns: &[ColumnDef]) -> Vec<String> {
    let definitions = std::iter::once(
        SQL::ident(PRIMARY_KEY).push_raw("INTEGER PRIMARY KEY AUTOINCREMENT"),
    )
    .chain(columns.iter().map(column));
    let mut statements = vec![
        SQL::raw("CREATE TABLE IF NOT EXISTS")
            .append(SQL::ident(table))
            .append(SQL::join(definitions, ",").parens())
            .sql(),
    ];
    statements.extend(
        columns
            .iter()
            .filter(|c| c.indexed)
            .map(|c| create_index(table, c.name)),
    );
    statements
}

/// Adds the location column group to an existing table.
pub fn add_location(table: &str) -> Vec<String> {
    let mut statements: Vec<String> = LOCATION_COLUMNS
        .iter()
        .map(|def| {
            SQL::raw("ALTER TABLE")
                .append(SQL::ident(table))
                .push_raw("ADD COLUMN")
                .append(column(def))
                .sql()
        })
        .collect();
    statements.extend(
        LOCATION_COLUMNS
            .iter()
            .filter(|c| c.indexed)
            .map(|c| create_index(table, c.name)),
    );
    statements
}

/// Reverses [`add_location`]. Indexes go first since SQLite refuses to drop
/// an indexed column.
pub fn drop_location(table: &str) -> Vec<String> {
    let mut statements: Vec<String> = LOCATION_COLUMNS
        .iter()
        .filter(|c| c.indexed)
        .map(|c| {
            SQL::raw("DROP INDEX IF EXISTS")
                .append(SQL::ident(index_name(table, c.name)))
                .sql()
        })
        .collect();
    statements.extend(LOCATION_COLUMNS.iter().map(|def| {
        SQL::raw("ALTER TABLE")
            .append(SQL::ident(table))
            .push_raw("DROP COLUMN")
            .append(SQL::ident(def.name))
            .sql()
    }));
    statements
}
