//! Renders [`Query`] descriptions and row writes as SQLite statements.

use quickdata_core::{
    Attributes, Condition, DistanceExpr, Operand, Operator, PRIMARY_KEY, PivotTable, Predicate,
    Query, Value,
};

use crate::sql::SQL;

/// Name of the scalar function [`SqliteStore`](crate::SqliteStore) registers
/// for haversine distances.
pub const DISTANCE_FUNCTION: &str = "quickdata_distance";

/// `quickdata_distance("lat", "lng", ?, ?, ?)`; NULL when either coordinate
/// is NULL.
pub fn distance(expr: &DistanceExpr) -> SQL<'_> {
    SQL::func(
        DISTANCE_FUNCTION,
        SQL::join(
            [
                SQL::ident(expr.latitude_column.as_str()),
                SQL::ident(expr.longitude_column.as_str()),
                SQL::param(expr.origin.latitude),
                SQL::param(expr.origin.longitude),
                SQL::param(expr.earth_radius),
            ],
            ",",
        ),
    )
}

fn predicate(p: &Predicate) -> SQL<'_> {
    let column = SQL::ident(p.field());
    match (p.operand(), p.operator()) {
        (Operand::Scalar(Value::Null), Operator::Eq) => column.push_raw("IS NULL"),
        (Operand::Scalar(Value::Null), Operator::NotEq) => column.push_raw("IS NOT NULL"),
        (Operand::Scalar(value), op) => column
            .push_raw(op.as_sql())
            .append(SQL::param_borrowed(value)),
        (Operand::List(values), Operator::In) if values.is_empty() => SQL::raw("0 = 1"),
        // NULL NOT IN (...) is never true
        (Operand::List(values), _) if values.is_empty() => column.push_raw("IS NOT NULL"),
        (Operand::List(values), op) => column
            .push_raw(op.as_sql())
            .append(SQL::param_list(values)),
    }
}

fn group<'a>(items: &'a [Condition], separator: &'static str) -> SQL<'a> {
    SQL::join(
        items.iter().filter(|c| !c.is_empty()).map(|c| match c {
            Condition::All(_) | Condition::Any(_) => condition(c).parens(),
            _ => condition(c),
        }),
        separator,
    )
}

/// Renders a condition tree. Empty groups render as `1 = 1`.
pub fn condition(condition: &Condition) -> SQL<'_> {
    match condition {
        Condition::All(items) | Condition::Any(items)
            if items.iter().all(Condition::is_empty) =>
        {
            SQL::raw("1 = 1")
        }
        Condition::All(items) => group(items, "AND"),
        Condition::Any(items) => group(items, "OR"),
        Condition::Predicate(p) => predicate(p),
        Condition::Distance { expr, max: Some(max) } => {
            distance(expr).push_raw("<").append(SQL::param(*max))
        }
        Condition::Distance { expr, max: None } => distance(expr).push_raw("IS NOT NULL"),
    }
}

fn where_clause(query: &Query) -> SQL<'_> {
    if query.condition.is_empty() {
        SQL::empty()
    } else {
        SQL::raw("WHERE").append(condition(&query.condition))
    }
}

/// `SELECT *, <computed> FROM "table" WHERE ... ORDER BY ... LIMIT ? OFFSET ?`
pub fn select(query: &Query) -> SQL<'_> {
    let mut columns = vec![SQL::raw("*")];
    columns.extend(
        query
            .computed
            .iter()
            .map(|(alias, expr)| distance(expr).push_raw("AS").append(SQL::ident(alias.as_str()))),
    );

    let mut sql = SQL::raw("SELECT")
        .append(SQL::join(columns, ","))
        .push_raw("FROM")
        .append(SQL::ident(query.table.as_str()))
        .append(where_clause(query));

    if !query.orders.is_empty() {
        sql = sql.push_raw("ORDER BY").append(SQL::join(
            query.orders.iter().map(|order| {
                SQL::ident(order.column.as_str()).push_raw(order.direction.as_sql())
            }),
            ",",
        ));
    }
    match (query.limit, query.offset) {
        (Some(limit), offset) => {
            sql = sql.push_raw("LIMIT").append(SQL::param(to_i64(limit)));
            if let Some(offset) = offset {
                sql = sql.push_raw("OFFSET").append(SQL::param(to_i64(offset)));
            }
        }
        (None, Some(offset)) => {
            sql = sql
                .push_raw("LIMIT -1 OFFSET")
                .append(SQL::param(to_i64(offset)));
        }
        (None, None) => {}
    }
    sql
}

/// `SELECT COUNT(*) FROM "table" WHERE ...`, ignoring order and window.
pub fn count(query: &Query) -> SQL<'_> {
    SQL::raw("SELECT COUNT(*) FROM")
        .append(SQL::ident(query.table.as_str()))
        .append(where_clause(query))
}

/// `INSERT INTO "table" (...) VALUES (...)`, or `DEFAULT VALUES` when empty.
pub fn insert<'a>(table: &'a str, values: &'a Attributes) -> SQL<'a> {
    let sql = SQL::raw("INSERT INTO").append(SQL::ident(table));
    if values.is_empty() {
        return sql.push_raw("DEFAULT VALUES");
    }
    sql.append(SQL::ident_list(values.keys().map(String::as_str)).parens())
        .push_raw("VALUES")
        .append(SQL::param_list(values.values()))
}

/// `UPDATE "table" SET ... WHERE "id" = ?`. The primary key column is never
/// assigned; with nothing to assign the statement still reports whether the
/// row exists.
pub fn update<'a>(table: &'a str, id: i64, values: &'a Attributes) -> SQL<'a> {
    let assignments: Vec<_> = values
        .iter()
        .filter(|(column, _)| column.as_str() != PRIMARY_KEY)
        .map(|(column, value)| (column.as_str(), value))
        .collect();
    let set = if assignments.is_empty() {
        SQL::ident(PRIMARY_KEY)
            .push_raw("=")
            .append(SQL::ident(PRIMARY_KEY))
    } else {
        SQL::assignments(assignments)
    };
    SQL::raw("UPDATE")
        .append(SQL::ident(table))
        .push_raw("SET")
        .append(set)
        .push_raw("WHERE")
        .append(SQL::ident(PRIMARY_KEY))
        .push_raw("=")
        .append(SQL::param(id))
}

/// `DELETE FROM "table" WHERE "id" IN (...)`
pub fn delete<'a>(table: &'a str, ids: &'a [Value]) -> SQL<'a> {
    SQL::raw("DELETE FROM")
        .append(SQL::ident(table))
        .push_raw("WHERE")
        .append(SQL::ident(PRIMARY_KEY))
        .push_raw("IN")
        .append(SQL::param_list(ids))
}

/// Pivot rows for the given parents in insertion order.
pub fn pivot_rows<'a>(pivot: &'a PivotTable, parent_ids: &'a [Value]) -> SQL<'a> {
    SQL::raw("SELECT * FROM")
        .append(SQL::ident(pivot.table.as_str()))
        .push_raw("WHERE")
        .append(SQL::ident(pivot.foreign_key.as_str()))
        .push_raw("IN")
        .append(SQL::param_list(parent_ids))
        .push_raw("ORDER BY rowid")
}

/// `DELETE FROM "pivot" WHERE "fk" = ? AND "rk" IN (...)`
pub fn detach<'a>(pivot: &'a PivotTable, parent_id: i64, related_ids: &'a [Value]) -> SQL<'a> {
    SQL::raw("DELETE FROM")
        .append(SQL::ident(pivot.table.as_str()))
        .push_raw("WHERE")
        .append(SQL::ident(pivot.foreign_key.as_str()))
        .push_raw("=")
        .append(SQL::param(parent_id))
        .push_raw("AND")
        .append(SQL::ident(pivot.related_key.as_str()))
        .push_raw("IN")
        .append(SQL::param_list(related_ids))
}

/// `UPDATE "pivot" SET ... WHERE "fk" = ? AND "rk" = ?`; `None` when there is
/// nothing to set.
pub fn update_pivot<'a>(
    pivot: &'a PivotTable,
    parent_id: i64,
    related_id: i64,
    values: &'a Attributes,
) -> Option<SQL<'a>> {
    if values.is_empty() {
        return None;
    }
    Some(
        SQL::raw("UPDATE")
            .append(SQL::ident(pivot.table.as_str()))
            .push_raw("SET")
            .append(SQL::assignments(
                values.iter().map(|(column, value)| (column.as_str(), value)),
            ))
            .push_raw("WHERE")
            .append(SQL::ident(pivot.foreign_key.as_str()))
            .push_raw("=")
            .append(SQL::param(parent_id))
            .push_raw("AND")
            .append(SQL::ident(pivot.related_key.as_str()))
            .push_raw("=")
            .append(SQL::param(related_id)),
    )
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
