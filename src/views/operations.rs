//! Operation flows of a view bound to its model: guards, validation, hooks, persistence, projection.

use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::model::ColumnType;
use crate::service::Orm;
use crate::views::hooks::spawn_post_hook;
use crate::views::registration::Operation;
use crate::views::view::{CustomKind, MethodCall, View};
use crate::Record;
use serde_json::Value;
use std::collections::HashMap;

/// A view together with the facade of its model. Shared by every route of the view.
pub struct ViewRuntime {
    view: View,
    orm: Orm,
}

impl ViewRuntime {
    pub fn new(view: View, orm: Orm) -> Self {
        ViewRuntime { view, orm }
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn orm(&self) -> &Orm {
        &self.orm
    }

    async fn run_guards(&self, method: &str, ctx: &RequestContext) -> Result<(), AppError> {
        for guard in self.view.guards_for(method) {
            guard.check(ctx).await?;
        }
        Ok(())
    }

    /// Path key converted to the primary key column's type.
    pub fn parse_pk(&self, raw: &str) -> Result<Value, AppError> {
        let pk = self.orm.model().pk();
        match &pk.ty {
            t if t.is_integer() => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| AppError::BadRequest(format!("invalid id '{}'", raw))),
            ColumnType::Uuid => uuid::Uuid::parse_str(raw)
                .map(|u| Value::String(u.to_string()))
                .map_err(|_| AppError::BadRequest(format!("invalid uuid '{}'", raw))),
            _ => Ok(Value::String(raw.to_string())),
        }
    }

    fn project(&self, method: &str, record: Record) -> Result<Value, AppError> {
        let schema = self
            .view
            .output_schema(method)
            .ok_or_else(|| AppError::Schema(format!("{} has no output schema for '{}'", self.view.name, method)))?;
        schema.dump(&record)
    }

    /// Omitted input fields become null, limited to writable columns of the model.
    /// Defaults were already filled by full validation.
    fn clear_unset(&self, method: &str, data: &mut Record) {
        let Some(schema) = self.view.input_schema(method) else { return };
        let model = self.orm.model();
        for f in &schema.fields {
            if model.column_named(&f.name).is_some_and(|c| !c.primary_key) {
                data.entry(f.name.clone()).or_insert(Value::Null);
            }
        }
    }

    fn validate_body(&self, method: &str, body: &Value, partial: bool) -> Result<Record, AppError> {
        match self.view.input_schema(method) {
            Some(schema) if partial => schema.validate_partial(body),
            Some(schema) => schema.validate(body),
            None => body
                .as_object()
                .cloned()
                .ok_or_else(|| AppError::BadRequest("body must be a JSON object".into())),
        }
    }

    pub async fn create(&self, ctx: RequestContext, body: Value) -> Result<Value, AppError> {
        let method = Operation::Create.as_str();
        self.run_guards(method, &ctx).await?;
        let data = self.validate_body(method, &body, false)?;
        self.orm.validate_relations(&data, false).await?;
        self.orm.validate_unique_fields(&data, None).await?;
        let hooks = &self.view.hooks;
        hooks.create_validation(&ctx, &data).await?;
        hooks.pre_create(&ctx, &data).await?;
        let instance = self.orm.create(data).await?;
        let out = self.project(method, instance.clone())?;
        let hooks = hooks.clone();
        spawn_post_hook(&self.view.name, "on_create", async move { hooks.on_create(ctx, instance).await });
        Ok(out)
    }

    pub async fn get(&self, ctx: RequestContext, raw_pk: &str) -> Result<Value, AppError> {
        let method = Operation::Get.as_str();
        self.run_guards(method, &ctx).await?;
        let pk = self.parse_pk(raw_pk)?;
        self.view.hooks.pre_get(&ctx, &pk).await?;
        let instance = self.orm.get(&pk).await?.ok_or_else(|| self.not_found(&pk))?;
        let out = self.project(method, instance.clone())?;
        let hooks = self.view.hooks.clone();
        spawn_post_hook(&self.view.name, "on_get", async move { hooks.on_get(ctx, instance).await });
        Ok(out)
    }

    /// PUT when `partial` is false, PATCH otherwise. PATCH writes only the fields sent;
    /// PUT writes every input field, with omitted ones set to their default or null.
    pub async fn update(&self, ctx: RequestContext, raw_pk: &str, body: Value, partial: bool) -> Result<Value, AppError> {
        let op = if partial { Operation::PartialUpdate } else { Operation::Update };
        let method = op.as_str();
        self.run_guards(method, &ctx).await?;
        let pk = self.parse_pk(raw_pk)?;
        let mut data = self.validate_body(method, &body, partial)?;
        if !partial {
            self.clear_unset(method, &mut data);
        }
        self.orm.validate_relations(&data, partial).await?;
        self.orm.validate_unique_fields(&data, Some(&pk)).await?;
        let hooks = &self.view.hooks;
        hooks.update_validation(&ctx, &pk, &data).await?;
        hooks.pre_update(&ctx, &pk, &data).await?;
        let instance = self.orm.update(&pk, data).await?.ok_or_else(|| self.not_found(&pk))?;
        let out = self.project(method, instance.clone())?;
        let hooks = hooks.clone();
        spawn_post_hook(&self.view.name, "on_update", async move { hooks.on_update(ctx, instance).await });
        Ok(out)
    }

    /// `false` when no row had the key.
    pub async fn delete(&self, ctx: RequestContext, raw_pk: &str) -> Result<bool, AppError> {
        let method = Operation::Delete.as_str();
        self.run_guards(method, &ctx).await?;
        let pk = self.parse_pk(raw_pk)?;
        let hooks = &self.view.hooks;
        hooks.delete_validation(&ctx, &pk).await?;
        hooks.pre_delete(&ctx, &pk).await?;
        let deleted = self.orm.delete(&pk).await?;
        let hooks = hooks.clone();
        spawn_post_hook(&self.view.name, "on_delete", async move { hooks.on_delete(ctx, pk, deleted).await });
        Ok(deleted)
    }

    /// Query parameters naming a column filter by equality; `limit` and `offset` paginate.
    pub async fn list(&self, ctx: RequestContext, params: HashMap<String, String>) -> Result<Vec<Value>, AppError> {
        let method = Operation::List.as_str();
        self.run_guards(method, &ctx).await?;
        let (filters, limit, offset) = self.list_params(params)?;
        let hooks = &self.view.hooks;
        hooks.list_validation(&ctx).await?;
        hooks.pre_list(&ctx).await?;
        let rows = self.orm.filter_page(&filters, limit, offset).await?;
        let out = rows
            .into_iter()
            .map(|r| self.project(method, r))
            .collect::<Result<Vec<_>, _>>()?;
        let hooks = hooks.clone();
        spawn_post_hook(&self.view.name, "on_list", async move { hooks.on_list(ctx).await });
        Ok(out)
    }

    fn list_params(
        &self,
        params: HashMap<String, String>,
    ) -> Result<(Vec<(String, Value)>, Option<u32>, Option<u32>), AppError> {
        let mut limit = None;
        let mut offset = None;
        let mut filters = Vec::new();
        for (k, v) in params {
            match k.as_str() {
                "limit" => limit = Some(parse_u32("limit", &v)?),
                "offset" => offset = Some(parse_u32("offset", &v)?),
                _ => {
                    // Parameters that are not columns belong to someone else.
                    let Some(col) = self.orm.model().column_named(&k) else { continue };
                    let value = query_value(&col.ty, &k, &v)?;
                    filters.push((k, value));
                }
            }
        }
        filters.sort_by(|a, b| a.0.cmp(&b.0));
        Ok((filters, limit, offset))
    }

    /// Guards, body validation by kind, then the user handler. The result goes through the
    /// method's own output schema when one is declared.
    pub async fn custom(
        &self,
        kind: CustomKind,
        name: &str,
        ctx: RequestContext,
        raw_pk: Option<&str>,
        query: HashMap<String, String>,
        body: &[u8],
    ) -> Result<Value, AppError> {
        self.run_guards(name, &ctx).await?;
        let handler = self
            .view
            .handlers
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("method '{}'", name)))?;
        let pk = match raw_pk {
            Some(raw) if kind.takes_pk() => Some(self.parse_pk(raw)?),
            _ => None,
        };
        let data = if kind.takes_body() {
            let body: Value = if body.is_empty() {
                Value::Object(Record::new())
            } else {
                serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))?
            };
            Some(self.validate_body(name, &body, kind == CustomKind::Patch)?)
        } else {
            None
        };
        let result = handler(MethodCall {
            ctx,
            orm: self.orm.clone(),
            pk,
            data,
            query,
        })
        .await?;
        match self.view.schemas_out.get(name) {
            Some(schema) => schema.dump_value(result),
            None => Ok(result),
        }
    }

    fn not_found(&self, pk: &Value) -> AppError {
        AppError::NotFound(format!("{} with id {} not found", self.orm.model().name, pk))
    }
}

fn parse_u32(key: &str, raw: &str) -> Result<u32, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", key)))
}

fn query_value(ty: &ColumnType, key: &str, raw: &str) -> Result<Value, AppError> {
    let bad = || AppError::BadRequest(format!("invalid value for {}: '{}'", key, raw));
    Ok(match ty {
        t if t.is_integer() => Value::from(raw.parse::<i64>().map_err(|_| bad())?),
        ColumnType::Float => Value::from(raw.parse::<f64>().map_err(|_| bad())?),
        ColumnType::Boolean => match raw {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => return Err(bad()),
        },
        ColumnType::Uuid => Value::String(uuid::Uuid::parse_str(raw).map_err(|_| bad())?.to_string()),
        _ => Value::String(raw.to_string()),
    })
}
