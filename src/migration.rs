//! DDL for declared models: CREATE TABLE (columns, primary key, unique, foreign keys) and CREATE INDEX.
//! Tables are emitted in dependency order so referenced tables exist first. Everything is
//! `IF NOT EXISTS`; existing tables are never altered.

use crate::error::ConfigError;
use crate::model::{Column, ColumnType, Model, Registry};
use crate::session::Dialect;
use crate::sql::{pg_type, quoted};

/// Statements creating every registered table and index.
pub fn create_all_statements(registry: &Registry, dialect: Dialect) -> Result<Vec<String>, ConfigError> {
    let mut out = Vec::new();
    for model in registry.creation_order()? {
        out.push(create_table(&model, registry, dialect)?);
        out.extend(create_indexes(&model));
    }
    Ok(out)
}

fn column_type(ty: &ColumnType, dialect: Dialect) -> String {
    match dialect {
        Dialect::Postgres => pg_type(ty),
        Dialect::Sqlite => match ty {
            // The any-driver cannot decode SQLite's BOOLEAN affinity; booleans are stored as 0/1.
            ColumnType::Integer | ColumnType::BigInt | ColumnType::Boolean => "INTEGER".into(),
            ColumnType::Float => "REAL".into(),
            ColumnType::Text
            | ColumnType::Varchar(_)
            | ColumnType::Timestamp
            | ColumnType::Date
            | ColumnType::Uuid
            | ColumnType::Json => "TEXT".into(),
        },
    }
}

fn column_def(c: &Column, dialect: Dialect) -> String {
    if c.is_generated() {
        return match (dialect, &c.ty) {
            (Dialect::Sqlite, _) => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quoted(&c.name)),
            (Dialect::Postgres, ColumnType::BigInt) => format!("{} BIGSERIAL PRIMARY KEY", quoted(&c.name)),
            (Dialect::Postgres, _) => format!("{} SERIAL PRIMARY KEY", quoted(&c.name)),
        };
    }
    let mut def = format!("{} {}", quoted(&c.name), column_type(&c.ty, dialect));
    if c.primary_key {
        def.push_str(" PRIMARY KEY");
    } else if !c.nullable {
        def.push_str(" NOT NULL");
    }
    if c.unique && !c.primary_key {
        def.push_str(" UNIQUE");
    }
    if let Some(ref d) = c.default {
        def.push_str(" DEFAULT ");
        def.push_str(d);
    }
    def
}

/// Foreign keys reference the target model's table, which need not match its name.
pub fn create_table(model: &Model, registry: &Registry, dialect: Dialect) -> Result<String, ConfigError> {
    let mut defs: Vec<String> = model.columns.iter().map(|c| column_def(c, dialect)).collect();
    for r in model.many_to_one() {
        let target = registry.get(&r.target).ok_or_else(|| ConfigError::MissingReference {
            kind: "model",
            id: r.target.clone(),
        })?;
        defs.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            quoted(&r.local_column),
            quoted(&target.table),
            quoted(&r.remote_column)
        ));
    }
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        quoted(&model.table),
        defs.join(",\n  ")
    ))
}

/// `ix_<table>_<column>` for every indexed, non-unique, non-pk column.
pub fn create_indexes(model: &Model) -> Vec<String> {
    model
        .columns
        .iter()
        .filter(|c| c.index && !c.unique && !c.primary_key)
        .map(|c| {
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                quoted(&format!("ix_{}_{}", model.table, c.name)),
                quoted(&model.table),
                quoted(&c.name)
            )
        })
        .collect()
}
