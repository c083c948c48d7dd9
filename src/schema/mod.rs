//! Schemas: request/response data shapes.
//!
//! An input schema validates a JSON body into a [`Record`] (fully for create/update,
//! partially for patch, where only the fields sent are checked and returned). An output
//! schema projects a stored record onto the declared fields, so columns the schema
//! does not name never leave the service. Unknown input keys are ignored.

mod rules;

pub use rules::ValidationRule;

use crate::error::AppError;
use crate::Record;
use rules::validate_field;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Integer,
    Float,
    String,
    Boolean,
    /// Any JSON value, including arrays and objects.
    Any,
}

impl FieldType {
    fn accepts(self, v: &Value) -> bool {
        match self {
            FieldType::Integer => v.is_i64() || v.is_u64(),
            FieldType::Float => v.is_number(),
            FieldType::String => v.is_string(),
            FieldType::Boolean => v.is_boolean(),
            FieldType::Any => true,
        }
    }

    fn label(self) -> &'static str {
        match self {
            FieldType::Integer => "an integer",
            FieldType::Float => "a number",
            FieldType::String => "a string",
            FieldType::Boolean => "a boolean",
            FieldType::Any => "any value",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub rules: ValidationRule,
}

fn default_true() -> bool {
    true
}

impl Field {
    /// Required, non-null field.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Field {
            name: name.into(),
            ty,
            required: true,
            nullable: false,
            default: None,
            rules: ValidationRule::default(),
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Any)
    }

    /// May be omitted, and may be null.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self.nullable = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Value used when the field is omitted.
    pub fn default(mut self, value: Value) -> Self {
        self.required = false;
        self.default = Some(value);
        self
    }

    pub fn rules(mut self, rules: ValidationRule) -> Self {
        self.rules = rules;
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.rules.format = Some(format.into());
        self
    }

    pub fn max_length(mut self, n: u32) -> Self {
        self.rules.max_length = Some(n);
        self
    }

    pub fn min_length(mut self, n: u32) -> Self {
        self.rules.min_length = Some(n);
        self
    }

    fn check(&self, v: &Value) -> Result<(), AppError> {
        if v.is_null() {
            if self.nullable {
                return Ok(());
            }
            return Err(AppError::Validation(format!("{} may not be null", self.name)));
        }
        if !self.ty.accepts(v) {
            return Err(AppError::Validation(format!(
                "{} must be {}",
                self.name,
                self.ty.label()
            )));
        }
        validate_field(&self.name, v, &self.rules)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Schema {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field_named(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Full validation: required fields must be present, defaults fill omitted ones.
    pub fn validate(&self, body: &Value) -> Result<Record, AppError> {
        let obj = as_object(body)?;
        let mut out = Record::new();
        for f in &self.fields {
            match obj.get(&f.name) {
                Some(v) => {
                    f.check(v)?;
                    out.insert(f.name.clone(), v.clone());
                }
                None if f.required => {
                    return Err(AppError::Validation(format!("{} is required", f.name)));
                }
                None => {
                    if let Some(d) = &f.default {
                        out.insert(f.name.clone(), d.clone());
                    }
                }
            }
        }
        Ok(out)
    }

    /// Partial validation: only the declared fields present in `body` are checked and returned.
    pub fn validate_partial(&self, body: &Value) -> Result<Record, AppError> {
        let obj = as_object(body)?;
        let mut out = Record::new();
        for f in &self.fields {
            if let Some(v) = obj.get(&f.name) {
                f.check(v)?;
                out.insert(f.name.clone(), v.clone());
            }
        }
        Ok(out)
    }

    /// Project a stored record onto this schema. A required field absent from the record is a server-side error.
    pub fn dump(&self, record: &Record) -> Result<Value, AppError> {
        let mut out = Record::new();
        for f in &self.fields {
            let v = match record.get(&f.name) {
                Some(v) => v.clone(),
                None => match &f.default {
                    Some(d) => d.clone(),
                    None if f.required => {
                        return Err(AppError::Schema(format!(
                            "{}: field '{}' missing from record",
                            self.name, f.name
                        )))
                    }
                    None => Value::Null,
                },
            };
            out.insert(f.name.clone(), v);
        }
        Ok(Value::Object(out))
    }

    /// `dump` for objects and arrays of objects; other values pass through.
    pub fn dump_value(&self, value: Value) -> Result<Value, AppError> {
        match value {
            Value::Object(ref map) => self.dump(map),
            Value::Array(items) => items
                .into_iter()
                .map(|v| self.dump_value(v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other),
        }
    }
}

fn as_object(body: &Value) -> Result<&Record, AppError> {
    body.as_object()
        .ok_or_else(|| AppError::BadRequest("body must be a JSON object".into()))
}
