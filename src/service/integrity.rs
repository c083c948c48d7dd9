//! Pre-write integrity checks: foreign keys resolve, unique columns stay unique, primary keys stay put.

use crate::error::AppError;
use crate::service::crud::{fetch_many, fetch_one, Orm};
use crate::sql;
use crate::Record;
use serde_json::Value;

impl Orm {
    /// Every many-to-one relation whose column appears in `data` must point at an existing row.
    /// In full mode (`partial == false`) a missing non-nullable foreign-key field is an error too.
    pub async fn validate_relations(&self, data: &Record, partial: bool) -> Result<(), AppError> {
        let model = self.model();
        if model.many_to_one().next().is_none() {
            return Ok(());
        }
        let mut session = self.sessions().begin().await?;
        let dialect = session.dialect();
        let result = async {
            for rel in model.many_to_one() {
                let Some(col) = model.column_named(&rel.local_column) else { continue };
                if col.primary_key {
                    continue;
                }
                let value = match data.get(&col.name) {
                    None if partial || col.nullable => continue,
                    None => {
                        return Err(AppError::Relation(format!(
                            "key '{}' not found in provided body",
                            col.name
                        )))
                    }
                    Some(Value::Null) if col.nullable => continue,
                    Some(Value::Null) => {
                        return Err(AppError::Relation(format!("'{}' may not be null", col.name)))
                    }
                    Some(v) => v.clone(),
                };
                let target = self.registry().get(&rel.target).ok_or_else(|| {
                    AppError::Relation(format!("relation '{}' targets unknown model '{}'", rel.name, rel.target))
                })?;
                let filters = [(rel.remote_column.clone(), value.clone())];
                let q = sql::select_where(dialect, &target, &filters, Some(1), None);
                if fetch_one(&mut session, &target, &q).await?.is_none() {
                    return Err(AppError::Relation(format!(
                        "{} with {}: {} not found",
                        target.name,
                        rel.remote_column,
                        display(&value)
                    )));
                }
            }
            Ok::<(), AppError>(())
        }
        .await;
        session.finish(result).await
    }

    /// Reject payloads that set the primary key or repeat a value held by another row in a
    /// unique column. `current_pk` names the row being updated, which may keep its own values.
    pub async fn validate_unique_fields(&self, data: &Record, current_pk: Option<&Value>) -> Result<(), AppError> {
        let model = self.model();
        let pk_name = &model.pk().name;
        if data.contains_key(pk_name) {
            return Err(AppError::Validation(format!(
                "cannot create or change primary key '{}'",
                pk_name
            )));
        }
        let checks: Vec<_> = model
            .unique_columns()
            .filter_map(|c| data.get(&c.name).filter(|v| !v.is_null()).map(|v| (c.name.clone(), v.clone())))
            .collect();
        if checks.is_empty() {
            return Ok(());
        }
        let mut session = self.sessions().begin().await?;
        let dialect = session.dialect();
        let result = async {
            for (column, value) in checks {
                let filters = [(column.clone(), value.clone())];
                let q = sql::select_where(dialect, model, &filters, Some(2), None);
                let rows = fetch_many(&mut session, model, &q).await?;
                let taken = rows
                    .iter()
                    .any(|row| current_pk.map_or(true, |pk| row.get(pk_name) != Some(pk)));
                if taken {
                    return Err(AppError::UniqueViolation {
                        column,
                        value: display(&value),
                    });
                }
            }
            Ok::<(), AppError>(())
        }
        .await;
        session.finish(result).await
    }
}

pub(crate) fn display(v: &Value) -> String {
    v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())
}
