//! Record access facade: generic CRUD over one declared model.
//!
//! Every public operation opens its own session, runs its statements, and commits on
//! success or rolls back on error before returning plain records.

use crate::error::AppError;
use crate::model::{Model, Registry, RelationKind};
use crate::service::integrity::display;
use crate::session::{Session, SessionManager};
use crate::sql::{self, bind_params, row_count, row_to_record, QueryBuf};
use crate::Record;
use serde_json::Value;
use std::sync::Arc;

/// Default and maximum page size for `filter_page`.
pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

#[derive(Clone)]
pub struct Orm {
    model: Arc<Model>,
    sessions: Arc<SessionManager>,
    registry: Arc<Registry>,
}

impl Orm {
    /// `model` must come from `registry`; registration is what guarantees it has a primary key.
    pub(crate) fn new(model: Arc<Model>, sessions: Arc<SessionManager>, registry: Arc<Registry>) -> Self {
        Orm {
            model,
            sessions,
            registry,
        }
    }

    /// Facade for a registered model by name.
    pub fn for_model(
        name: &str,
        sessions: Arc<SessionManager>,
        registry: Arc<Registry>,
    ) -> Result<Self, AppError> {
        let model = registry
            .get(name)
            .ok_or_else(|| AppError::NotFound(format!("model '{}'", name)))?;
        Ok(Self::new(model, sessions, registry))
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Facade for another registered model sharing this one's session manager.
    pub fn related(&self, name: &str) -> Result<Orm, AppError> {
        Self::for_model(name, self.sessions.clone(), self.registry.clone())
    }

    /// Insert one row and return it as stored.
    pub async fn create(&self, values: Record) -> Result<Record, AppError> {
        let mut session = self.sessions.begin().await?;
        let q = sql::insert(session.dialect(), &self.model, &values);
        let result = fetch_one(&mut session, &self.model, &q)
            .await
            .and_then(|row| row.ok_or(AppError::Db(sqlx::Error::RowNotFound)));
        session
            .finish(result)
            .await
            .map_err(|e| unique_violation(&self.model, &values, e))
    }

    pub async fn get(&self, pk: &Value) -> Result<Option<Record>, AppError> {
        let mut session = self.sessions.begin().await?;
        let q = sql::select_by_pk(session.dialect(), &self.model, pk);
        let result = fetch_one(&mut session, &self.model, &q).await;
        session.finish(result).await
    }

    /// Set the given columns on the row with `pk`. `None` when no such row exists.
    pub async fn update(&self, pk: &Value, values: Record) -> Result<Option<Record>, AppError> {
        self.check_columns(values.keys())?;
        let mut session = self.sessions.begin().await?;
        let q = sql::update(session.dialect(), &self.model, pk, &values);
        let result = fetch_one(&mut session, &self.model, &q).await;
        session
            .finish(result)
            .await
            .map_err(|e| unique_violation(&self.model, &values, e))
    }

    /// `true` when a row was deleted, `false` when `pk` did not exist.
    pub async fn delete(&self, pk: &Value) -> Result<bool, AppError> {
        let mut session = self.sessions.begin().await?;
        let q = sql::delete(session.dialect(), &self.model, pk);
        let result = execute(&mut session, &q).await.map(|affected| affected > 0);
        session.finish(result).await
    }

    /// Merge a full record: update the row with its primary key when it exists, insert otherwise.
    pub async fn save(&self, record: Record) -> Result<Record, AppError> {
        self.check_columns(record.keys())?;
        let pk_name = self.model.pk().name.clone();
        let mut session = self.sessions.begin().await?;
        let dialect = session.dialect();
        let result = async {
            let existing = match record.get(&pk_name).filter(|v| !v.is_null()) {
                Some(pk) => {
                    let q = sql::select_by_pk(dialect, &self.model, pk);
                    fetch_one(&mut session, &self.model, &q)
                        .await?
                        .map(|_| pk.clone())
                }
                None => None,
            };
            let q = match existing {
                Some(pk) => sql::update(dialect, &self.model, &pk, &record),
                None => sql::insert(dialect, &self.model, &record),
            };
            fetch_one(&mut session, &self.model, &q)
                .await?
                .ok_or(AppError::Db(sqlx::Error::RowNotFound))
        }
        .await;
        session
            .finish(result)
            .await
            .map_err(|e| unique_violation(&self.model, &record, e))
    }

    pub async fn all(&self) -> Result<Vec<Record>, AppError> {
        self.query_where(&[], None, None).await
    }

    /// Rows matching every `(column, value)` pair. Unknown columns fail with an attribute error.
    pub async fn filter(&self, filters: &[(String, Value)]) -> Result<Vec<Record>, AppError> {
        self.query_where(filters, None, None).await
    }

    /// `filter` with pagination; `limit` defaults to 100 and is capped at 1000.
    pub async fn filter_page(
        &self,
        filters: &[(String, Value)],
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Record>, AppError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        self.query_where(filters, Some(limit), offset).await
    }

    pub async fn first(&self, filters: &[(String, Value)]) -> Result<Option<Record>, AppError> {
        Ok(self.query_where(filters, Some(1), None).await?.into_iter().next())
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        self.count_where(&[]).await
    }

    pub async fn count_where(&self, filters: &[(String, Value)]) -> Result<i64, AppError> {
        self.check_columns(filters.iter().map(|(k, _)| k))?;
        let mut session = self.sessions.begin().await?;
        let q = sql::count_where(session.dialect(), &self.model, filters);
        let result = fetch_count(&mut session, &q).await;
        session.finish(result).await
    }

    pub async fn exists(&self, filters: &[(String, Value)]) -> Result<bool, AppError> {
        Ok(self.first(filters).await?.is_some())
    }

    /// First row matching `filters` with the named relations loaded: an object (or null)
    /// for many-to-one, an array for one-to-many. Every name must be an attribute of the model.
    pub async fn select_related(
        &self,
        attrs: &[&str],
        filters: &[(String, Value)],
    ) -> Result<Option<Record>, AppError> {
        for attr in attrs {
            if !self.model.has_attribute(attr) {
                return Err(self.attribute_error(attr));
            }
        }
        self.check_columns(filters.iter().map(|(k, _)| k))?;
        let mut session = self.sessions.begin().await?;
        let result = self.select_related_in(&mut session, attrs, filters).await;
        session.finish(result).await
    }

    async fn select_related_in(
        &self,
        session: &mut Session,
        attrs: &[&str],
        filters: &[(String, Value)],
    ) -> Result<Option<Record>, AppError> {
        let dialect = session.dialect();
        let q = sql::select_where(dialect, &self.model, filters, Some(1), None);
        let Some(mut record) = fetch_one(session, &self.model, &q).await? else {
            return Ok(None);
        };
        for attr in attrs {
            // Plain columns are already loaded.
            let Some(rel) = self.model.relation_named(attr) else { continue };
            let target = self.registry.get(&rel.target).ok_or_else(|| {
                AppError::Attribute(format!("relation '{}' targets unknown model '{}'", rel.name, rel.target))
            })?;
            let key = record.get(&rel.local_column).cloned().unwrap_or(Value::Null);
            let loaded = if key.is_null() {
                match rel.kind {
                    RelationKind::ManyToOne => Value::Null,
                    RelationKind::OneToMany => Value::Array(Vec::new()),
                }
            } else {
                let filters = [(rel.remote_column.clone(), key)];
                let limit = match rel.kind {
                    RelationKind::ManyToOne => Some(1),
                    RelationKind::OneToMany => None,
                };
                let q = sql::select_where(dialect, &target, &filters, limit, None);
                let rows = fetch_many(session, &target, &q).await?;
                match rel.kind {
                    RelationKind::ManyToOne => rows.into_iter().next().map(Value::Object).unwrap_or(Value::Null),
                    RelationKind::OneToMany => Value::Array(rows.into_iter().map(Value::Object).collect()),
                }
            };
            record.insert(rel.name.clone(), loaded);
        }
        Ok(Some(record))
    }

    async fn query_where(
        &self,
        filters: &[(String, Value)],
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Record>, AppError> {
        self.check_columns(filters.iter().map(|(k, _)| k))?;
        let mut session = self.sessions.begin().await?;
        let q = sql::select_where(session.dialect(), &self.model, filters, limit, offset);
        let result = fetch_many(&mut session, &self.model, &q).await;
        session.finish(result).await
    }

    fn check_columns<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> Result<(), AppError> {
        for name in names {
            if self.model.column_named(name).is_none() {
                return Err(self.attribute_error(name));
            }
        }
        Ok(())
    }

    pub(crate) fn attribute_error(&self, attr: &str) -> AppError {
        AppError::Attribute(format!(
            "model {} does not have '{}' attribute",
            self.model.name, attr
        ))
    }
}

/// Turn the database's own UNIQUE/primary-key rejection into `UniqueViolation`, naming the
/// column when the driver message or constraint mentions it. Other errors pass through.
fn unique_violation(model: &Model, values: &Record, err: AppError) -> AppError {
    let AppError::Db(sqlx::Error::Database(db)) = &err else {
        return err;
    };
    if !db.is_unique_violation() {
        return err;
    }
    // SQLite: "UNIQUE constraint failed: user.email"; PostgreSQL: constraint "user_email_key".
    let hint = format!("{} {}", db.message(), db.constraint().unwrap_or_default());
    let candidates: Vec<&str> = model
        .columns
        .iter()
        .filter(|c| c.unique || c.primary_key)
        .map(|c| c.name.as_str())
        .collect();
    let column = candidates
        .iter()
        .find(|name| hint.contains(&format!(".{}", name)) || hint.contains(&format!("_{}_", name)))
        .or_else(|| candidates.iter().find(|name| values.contains_key(**name)))
        .map(|name| name.to_string());
    match column {
        Some(column) => AppError::UniqueViolation {
            value: values.get(&column).map(display).unwrap_or_default(),
            column,
        },
        None => err,
    }
}

pub(crate) async fn fetch_one(
    session: &mut Session,
    model: &Model,
    q: &QueryBuf,
) -> Result<Option<Record>, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let row = bind_params(sqlx::query(&q.sql), &q.params)
        .fetch_optional(session.conn())
        .await?;
    Ok(row.map(|r| row_to_record(&r, model)))
}

pub(crate) async fn fetch_many(
    session: &mut Session,
    model: &Model,
    q: &QueryBuf,
) -> Result<Vec<Record>, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let rows = bind_params(sqlx::query(&q.sql), &q.params)
        .fetch_all(session.conn())
        .await?;
    Ok(rows.iter().map(|r| row_to_record(r, model)).collect())
}

pub(crate) async fn fetch_count(session: &mut Session, q: &QueryBuf) -> Result<i64, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let row = bind_params(sqlx::query(&q.sql), &q.params)
        .fetch_one(session.conn())
        .await?;
    Ok(row_count(&row))
}

async fn execute(session: &mut Session, q: &QueryBuf) -> Result<u64, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
    let result = bind_params(sqlx::query(&q.sql), &q.params)
        .execute(session.conn())
        .await?;
    Ok(result.rows_affected())
}
