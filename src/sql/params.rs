//! Bind serde_json values to any-driver queries and decode rows back into records.

use crate::model::{Column, ColumnType, Model};
use crate::Record;
use serde_json::{Number, Value};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Row};

pub type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

/// Bind each value in order. Arrays and objects are bound as JSON text.
pub fn bind_params<'q>(mut query: AnyQuery<'q>, params: &[Value]) -> AnyQuery<'q> {
    for p in params {
        query = match p {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else {
                    query.bind(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => query.bind(s.clone()),
            Value::Array(_) | Value::Object(_) => query.bind(p.to_string()),
        };
    }
    query
}

/// Row to record, decoding each declared column by its declared type.
pub fn row_to_record(row: &AnyRow, model: &Model) -> Record {
    let mut map = Record::new();
    for c in &model.columns {
        map.insert(c.name.clone(), cell_to_value(row, c));
    }
    map
}

/// Value of the `count` column produced by `count_where`.
pub fn row_count(row: &AnyRow) -> i64 {
    if let Ok(n) = row.try_get::<i64, _>("count") {
        return n;
    }
    row.try_get::<i32, _>("count").map(i64::from).unwrap_or_default()
}

fn cell_to_value(row: &AnyRow, column: &Column) -> Value {
    let name = column.name.as_str();
    match column.ty {
        ColumnType::Integer | ColumnType::BigInt => integer(row, name),
        ColumnType::Float => float(row, name),
        ColumnType::Boolean => boolean(row, name),
        ColumnType::Json => match text(row, name) {
            Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
            other => other,
        },
        ColumnType::Text
        | ColumnType::Varchar(_)
        | ColumnType::Timestamp
        | ColumnType::Date
        | ColumnType::Uuid => text(row, name),
    }
}

fn integer(row: &AnyRow, name: &str) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(name) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(name) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(name) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    Value::Null
}

fn float(row: &AnyRow, name: &str) -> Value {
    if let Ok(v) = row.try_get::<Option<f64>, _>(name) {
        return v.and_then(Number::from_f64).map(Value::Number).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(name) {
        return v
            .and_then(|n| Number::from_f64(n as f64))
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    // SQLite hands back integral REALs as integers.
    integer(row, name)
}

fn boolean(row: &AnyRow, name: &str) -> Value {
    if let Ok(v) = row.try_get::<Option<bool>, _>(name) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    match integer(row, name) {
        Value::Number(n) => Value::Bool(n.as_i64().unwrap_or_default() != 0),
        other => other,
    }
}

fn text(row: &AnyRow, name: &str) -> Value {
    match row.try_get::<Option<String>, _>(name) {
        Ok(v) => v.map(Value::String).unwrap_or(Value::Null),
        Err(_) => Value::Null,
    }
}
