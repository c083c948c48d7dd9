//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE for a declared model.
//!
//! Identifiers come only from model declarations and are always quoted; values are
//! always bind parameters (`$1`, `$2`, ... on both dialects). On PostgreSQL every
//! placeholder is cast to the column type so text-typed binds land in typed columns,
//! and columns the any-driver cannot decode are selected as text.

use crate::model::{Column, ColumnType, Model};
use crate::session::Dialect;
use crate::Record;
use serde_json::Value;
use uuid::Uuid;

/// Quote identifier (safe: only from model declarations).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// PostgreSQL type name for casts and DDL.
pub fn pg_type(ty: &ColumnType) -> String {
    match ty {
        ColumnType::Integer => "INTEGER".into(),
        ColumnType::BigInt => "BIGINT".into(),
        ColumnType::Text => "TEXT".into(),
        ColumnType::Varchar(n) => format!("VARCHAR({})", n),
        ColumnType::Boolean => "BOOLEAN".into(),
        ColumnType::Float => "DOUBLE PRECISION".into(),
        ColumnType::Timestamp => "TIMESTAMPTZ".into(),
        ColumnType::Date => "DATE".into(),
        ColumnType::Uuid => "UUID".into(),
        ColumnType::Json => "JSONB".into(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        Self::default()
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

fn placeholder(dialect: Dialect, n: u32, column: &Column) -> String {
    match dialect {
        Dialect::Postgres => format!("${}::{}", n, pg_type(&column.ty)),
        Dialect::Sqlite => format!("${}", n),
    }
}

/// SELECT list: each column as-is, except types the any-driver cannot decode on PostgreSQL, which are cast to text.
fn select_column_list(dialect: Dialect, model: &Model) -> String {
    model
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            if dialect == Dialect::Postgres && c.ty.selected_as_text() {
                format!("{}::text AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn table(model: &Model) -> String {
    quoted(&model.table)
}

/// WHERE clause over declared columns; unknown names are skipped. NULL compares with IS NULL.
fn where_clause(q: &mut QueryBuf, dialect: Dialect, model: &Model, filters: &[(String, Value)]) -> String {
    let mut parts = Vec::new();
    for (col, val) in filters {
        let Some(c) = model.column_named(col) else { continue };
        if val.is_null() {
            parts.push(format!("{} IS NULL", quoted(col)));
            continue;
        }
        let n = q.push_param(val.clone());
        parts.push(format!("{} = {}", quoted(col), placeholder(dialect, n, c)));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// SELECT with exact-match filters, ORDER BY pk, optional LIMIT/OFFSET.
pub fn select_where(
    dialect: Dialect,
    model: &Model,
    filters: &[(String, Value)],
    limit: Option<u32>,
    offset: Option<u32>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, dialect, model, filters);
    let limit_clause = match (limit, offset, dialect) {
        (Some(n), _, _) => format!(" LIMIT {}", n),
        // SQLite only accepts OFFSET after a LIMIT.
        (None, Some(_), Dialect::Sqlite) => " LIMIT -1".to_string(),
        (None, _, _) => String::new(),
    };
    let offset_clause = offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}{}{}",
        select_column_list(dialect, model),
        table(model),
        where_sql,
        quoted(&model.pk().name),
        limit_clause,
        offset_clause
    );
    q
}

/// SELECT by primary key.
pub fn select_by_pk(dialect: Dialect, model: &Model, pk: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk_col = model.pk();
    let n = q.push_param(pk.clone());
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(dialect, model),
        table(model),
        quoted(&pk_col.name),
        placeholder(dialect, n, pk_col)
    );
    q
}

/// SELECT COUNT(*) AS "count" with exact-match filters.
pub fn count_where(dialect: Dialect, model: &Model, filters: &[(String, Value)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, dialect, model, filters);
    q.sql = format!("SELECT COUNT(*) AS \"count\" FROM {}{}", table(model), where_sql);
    q
}

/// INSERT: every declared column present in `values`; absent columns are bound as NULL
/// unless the database supplies a default. A uuid primary key without a default gets a
/// fresh v4 value. RETURNING the full row.
pub fn insert(dialect: Dialect, model: &Model, values: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &model.columns {
        let val = match values.get(&c.name) {
            Some(v) => v.clone(),
            None if c.has_default() => continue,
            None if c.primary_key && c.ty == ColumnType::Uuid => Value::String(Uuid::new_v4().to_string()),
            None => Value::Null,
        };
        let n = q.push_param(val);
        cols.push(quoted(&c.name));
        placeholders.push(placeholder(dialect, n, c));
    }
    let returning = select_column_list(dialect, model);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table(model), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table(model),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by pk: SET only declared non-pk columns present in `values`, in declaration order.
/// With nothing to set, degrades to a SELECT by pk so callers still get the row back.
pub fn update(dialect: Dialect, model: &Model, pk: &Value, values: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk_col = model.pk();
    let mut sets = Vec::new();
    for c in model.columns.iter().filter(|c| !c.primary_key) {
        let Some(v) = values.get(&c.name) else { continue };
        let n = q.push_param(v.clone());
        sets.push(format!("{} = {}", quoted(&c.name), placeholder(dialect, n, c)));
    }
    if sets.is_empty() {
        return select_by_pk(dialect, model, pk);
    }
    let n = q.push_param(pk.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        table(model),
        sets.join(", "),
        quoted(&pk_col.name),
        placeholder(dialect, n, pk_col),
        select_column_list(dialect, model)
    );
    q
}

/// DELETE by pk; callers read `rows_affected`.
pub fn delete(dialect: Dialect, model: &Model, pk: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk_col = model.pk();
    let n = q.push_param(pk.clone());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        table(model),
        quoted(&pk_col.name),
        placeholder(dialect, n, pk_col)
    );
    q
}
