//! Application-wide model registry: lookup by name and dependency order for table creation.

use crate::error::ConfigError;
use crate::model::Model;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct Registry {
    models: Vec<Arc<Model>>,
    by_name: HashMap<String, Arc<Model>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model after its structural checks pass. Names must be unique.
    pub fn register(&mut self, model: Model) -> Result<Arc<Model>, ConfigError> {
        model.check()?;
        if self.by_name.contains_key(&model.name) {
            return Err(ConfigError::DuplicateModel(model.name));
        }
        let model = Arc::new(model);
        self.by_name.insert(model.name.clone(), model.clone());
        self.models.push(model.clone());
        Ok(model)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Model>> {
        self.by_name.get(name).cloned()
    }

    pub fn models(&self) -> &[Arc<Model>] {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Every relation must point at a registered model and an existing column on it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for m in &self.models {
            for r in &m.relations {
                let target = self.by_name.get(&r.target).ok_or_else(|| ConfigError::MissingReference {
                    kind: "model",
                    id: r.target.clone(),
                })?;
                if target.column_named(&r.remote_column).is_none() {
                    return Err(ConfigError::MissingReference {
                        kind: "column",
                        id: format!("{}.{}", r.target, r.remote_column),
                    });
                }
            }
        }
        Ok(())
    }

    /// Models ordered so that every many-to-one target precedes the models referencing it.
    pub fn creation_order(&self) -> Result<Vec<Arc<Model>>, ConfigError> {
        self.validate()?;
        let mut ordered = Vec::with_capacity(self.models.len());
        let mut done: HashSet<&str> = HashSet::new();
        let mut visiting: HashSet<&str> = HashSet::new();
        for m in &self.models {
            self.visit(m, &mut done, &mut visiting, &mut ordered)?;
        }
        Ok(ordered)
    }

    fn visit<'a>(
        &'a self,
        model: &'a Arc<Model>,
        done: &mut HashSet<&'a str>,
        visiting: &mut HashSet<&'a str>,
        ordered: &mut Vec<Arc<Model>>,
    ) -> Result<(), ConfigError> {
        if done.contains(model.name.as_str()) {
            return Ok(());
        }
        if !visiting.insert(model.name.as_str()) {
            return Err(ConfigError::InvalidModel {
                model: model.name.clone(),
                reason: "foreign keys form a cycle".into(),
            });
        }
        for r in model.many_to_one() {
            if r.target == model.name {
                continue;
            }
            if let Some(target) = self.by_name.get(&r.target) {
                self.visit(target, done, visiting, ordered)?;
            }
        }
        visiting.remove(model.name.as_str());
        done.insert(model.name.as_str());
        ordered.push(model.clone());
        Ok(())
    }
}
