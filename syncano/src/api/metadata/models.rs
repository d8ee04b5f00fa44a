//! Syncano model metadata
//!
//! A [`ModelMeta`] describes one remote collection: its endpoints (named path
//! templates), its declared fields, and for schema-described collections the
//! parent model holding that schema.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::error::{Error, Result};
use crate::api::manager::Manager;
use crate::api::manager::filters::Lookup;
use crate::api::manager::schema::SchemaField;
use crate::api::transport::Method;

/// Field data types understood by the backend
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Text,
    Integer,
    Float,
    Boolean,
    DateTime,
    Reference,
    File,
    Array,
    Object,
    Schema,
    Links,
    Other(String),
}

impl FieldType {
    /// Map a schema `type` string onto a field type
    pub fn from_schema_type(name: &str) -> Self {
        match name {
            "string" => FieldType::String,
            "text" => FieldType::Text,
            "integer" => FieldType::Integer,
            "float" => FieldType::Float,
            "boolean" => FieldType::Boolean,
            "datetime" => FieldType::DateTime,
            "reference" => FieldType::Reference,
            "file" => FieldType::File,
            "array" => FieldType::Array,
            "object" => FieldType::Object,
            other => FieldType::Other(other.to_string()),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::String | FieldType::Text | FieldType::DateTime => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Reference => value.is_i64() || value.is_u64() || value.is_string(),
            _ => true,
        }
    }
}

/// Declared model field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    pub name: String,
    pub field_type: FieldType,
    /// Server-managed; never sent on save
    pub read_only: bool,
    pub primary_key: bool,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            read_only: false,
            primary_key: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Encode a filter value for `lookup` against this field
    pub fn to_query(&self, value: Value, lookup: Lookup) -> Result<Value> {
        match lookup {
            Lookup::Exists => {
                if !value.is_boolean() {
                    return Err(Error::validation(format!(
                        "Lookup \"exists\" on {} expects a boolean.",
                        self.name
                    )));
                }
                Ok(value)
            }
            Lookup::In => {
                let items = value.as_array().ok_or_else(|| {
                    Error::validation(format!("Lookup \"in\" on {} expects a list.", self.name))
                })?;
                if let Some(bad) = items.iter().find(|v| !self.field_type.accepts(v)) {
                    return Err(Error::validation(format!(
                        "Invalid value {} for field {}.",
                        bad, self.name
                    )));
                }
                Ok(value)
            }
            _ => {
                if !self.field_type.accepts(&value) {
                    return Err(Error::validation(format!(
                        "Invalid value {} for field {}.",
                        value, self.name
                    )));
                }
                Ok(value)
            }
        }
    }
}

/// Named path template, e.g. `detail` → `/v1/instances/{name}/`
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointMeta {
    pub path: String,
    pub methods: Vec<Method>,
    /// Placeholder names in template order
    pub properties: Vec<String>,
}

impl EndpointMeta {
    pub fn new(path: impl Into<String>, methods: &[Method]) -> Self {
        let path = path.into();
        let properties = placeholders(&path);
        Self {
            path,
            methods: methods.to_vec(),
            properties,
        }
    }
}

impl EndpointMeta {
    /// Whether a concrete request path fits this template
    ///
    /// Placeholders match exactly one non-empty path segment.
    pub fn matches(&self, path: &str) -> bool {
        let template: Vec<&str> = segments(&self.path).collect();
        let concrete: Vec<&str> = segments(path).collect();

        template.len() == concrete.len()
            && template
                .iter()
                .zip(&concrete)
                .all(|(t, c)| (t.starts_with('{') && t.ends_with('}')) || t == c)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn placeholders(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                names.push(after[..end].to_string());
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

/// Role-specific manager behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Standard,
    /// Schema-described records; concrete models are synthesized per class
    Object,
    /// Exposes the `run` endpoint
    Webhook,
}

/// Complete model description
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMeta {
    pub name: String,
    pub kind: ModelKind,
    pub endpoints: BTreeMap<String, EndpointMeta>,
    pub fields: Vec<FieldMeta>,
    /// Model holding the schema of a dynamic collection
    pub parent: Option<Arc<ModelMeta>>,
    /// Root model a synthesized model was derived from
    pub base: Option<Arc<ModelMeta>>,
}

impl ModelMeta {
    pub fn new(name: impl Into<String>, kind: ModelKind) -> Self {
        Self {
            name: name.into(),
            kind,
            endpoints: BTreeMap::new(),
            fields: Vec::new(),
            parent: None,
            base: None,
        }
    }

    pub fn endpoint(mut self, name: impl Into<String>, path: &str, methods: &[Method]) -> Self {
        self.endpoints
            .insert(name.into(), EndpointMeta::new(path, methods));
        self
    }

    pub fn field(mut self, field: FieldMeta) -> Self {
        self.fields.push(field);
        self
    }

    pub fn parent(mut self, parent: Arc<ModelMeta>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Default manager bound to this model
    pub fn please(self: &Arc<Self>) -> Manager {
        Manager::new(self.clone())
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_key(&self) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.primary_key)
    }

    /// Path parameters of `endpoint`, empty for unknown endpoints
    pub fn endpoint_properties(&self, endpoint: &str) -> &[String] {
        self.endpoints
            .get(endpoint)
            .map(|e| e.properties.as_slice())
            .unwrap_or(&[])
    }

    /// Fill the `endpoint` template from `properties`
    pub fn resolve_endpoint(&self, endpoint: &str, properties: &Map<String, Value>) -> Result<String> {
        let meta = self.endpoints.get(endpoint).ok_or_else(|| {
            Error::validation(format!(
                "Invalid endpoint name: {} for model {}.",
                endpoint, self.name
            ))
        })?;

        let mut path = meta.path.clone();
        for name in &meta.properties {
            let value = match properties.get(name) {
                Some(Value::String(s)) if !s.is_empty() => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Bool(b)) => b.to_string(),
                _ => {
                    return Err(Error::validation(format!(
                        "Request property \"{}\" is required.",
                        name
                    )));
                }
            };
            path = path.replace(&format!("{{{}}}", name), &urlencoding::encode(&value));
        }

        Ok(path)
    }

    /// Copy of the root model carrying the fields of a backend schema
    ///
    /// Called on an already synthesized model, the copy is still taken from
    /// its root so schema fields never leak between classes.
    pub fn create_subclass(self: &Arc<Self>, name: impl Into<String>, schema: &[SchemaField]) -> ModelMeta {
        let base = self.base.clone().unwrap_or_else(|| self.clone());
        let mut model = ModelMeta::clone(&base);
        model.name = name.into();
        model.base = Some(base);
        for field in schema {
            if model.get_field(&field.name).is_none() {
                model
                    .fields
                    .push(FieldMeta::new(&field.name, FieldType::from_schema_type(&field.field_type)));
            }
        }
        model
    }
}
