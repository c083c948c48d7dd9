//! Declared models: table, typed columns, relations. The registry owns every model of an application.

mod column;
mod registry;

pub use column::*;
pub use registry::Registry;

use crate::error::ConfigError;
use std::collections::HashSet;

#[derive(Clone, Debug)]
pub struct Model {
    pub name: String,
    pub table: String,
    pub columns: Vec<Column>,
    pub relations: Vec<Relation>,
}

impl Model {
    /// Model named after its table.
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        Model {
            name: table.clone(),
            table,
            columns: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Register under `name` instead of the table name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn column_named(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn relation_named(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// True when `name` is a column or a relation of this model.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.column_named(name).is_some() || self.relation_named(name).is_some()
    }

    /// The primary key column. Only call on models that passed `check`; facades are
    /// built from registered models, so they always have exactly one.
    pub fn pk(&self) -> &Column {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .unwrap_or(&self.columns[0])
    }

    pub fn unique_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.unique && !c.primary_key)
    }

    pub fn many_to_one(&self) -> impl Iterator<Item = &Relation> {
        self.relations
            .iter()
            .filter(|r| r.kind == RelationKind::ManyToOne)
    }

    /// Structural checks that do not need other models.
    pub fn check(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidModel {
            model: self.name.clone(),
            reason,
        };
        if self.columns.is_empty() {
            return Err(invalid("no columns".into()));
        }
        let pk_count = self.columns.iter().filter(|c| c.primary_key).count();
        if pk_count != 1 {
            return Err(invalid(format!("expected one primary key, found {}", pk_count)));
        }
        let mut names = HashSet::new();
        for c in &self.columns {
            if !names.insert(c.name.as_str()) {
                return Err(invalid(format!("duplicate column '{}'", c.name)));
            }
        }
        for r in &self.relations {
            if !names.insert(r.name.as_str()) {
                return Err(invalid(format!("relation '{}' shadows another attribute", r.name)));
            }
            if self.column_named(&r.local_column).is_none() {
                return Err(invalid(format!(
                    "relation '{}' uses unknown column '{}'",
                    r.name, r.local_column
                )));
            }
        }
        Ok(())
    }
}
