//! Data-driven model instances

use log::debug;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::connection::{Connection, RequestOptions};
use super::error::{Error, Result};
use super::manager::Manager;
use super::metadata::{FieldType, ModelMeta, registry};
use super::transport::Method;

/// One remote object together with the model describing it
#[derive(Debug, Clone)]
pub struct Record {
    meta: Arc<ModelMeta>,
    fields: Map<String, Value>,
    persisted: bool,
}

impl Record {
    /// Unsaved record
    pub fn new(meta: Arc<ModelMeta>, fields: Map<String, Value>) -> Self {
        Self {
            meta,
            fields,
            persisted: false,
        }
    }

    /// Record decoded from a backend response
    pub fn from_response(meta: Arc<ModelMeta>, fields: Map<String, Value>) -> Self {
        Self {
            meta,
            fields,
            persisted: true,
        }
    }

    pub fn meta(&self) -> &Arc<ModelMeta> {
        &self.meta
    }

    pub fn model_name(&self) -> &str {
        &self.meta.name
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    pub fn pk(&self) -> Option<&Value> {
        self.meta
            .primary_key()
            .and_then(|field| self.fields.get(&field.name))
    }

    pub fn is_new(&self) -> bool {
        !self.persisted
    }

    /// Declared, writable fields sent on save
    pub fn payload(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter(|(name, _)| {
                self.meta
                    .get_field(name)
                    .is_some_and(|field| !field.read_only)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Create (POST to `list`) or update (PUT to `detail`) this record
    pub async fn save(&mut self, connection: &Connection) -> Result<()> {
        let (endpoint, method) = if self.persisted {
            ("detail", Method::Put)
        } else {
            ("list", Method::Post)
        };

        let path = self.meta.resolve_endpoint(endpoint, &self.fields)?;
        debug!("Saving {} via {} {}", self.meta.name, method, path);

        let options = RequestOptions::new().data(Value::Object(self.payload()));
        let response = connection
            .request(method, &path, options)
            .await
            .map_err(|e| self.translate(e))?;

        if let Value::Object(saved) = response {
            self.fields.extend(saved);
        }
        self.persisted = true;
        Ok(())
    }

    /// Remove this record from the backend
    pub async fn delete(&mut self, connection: &Connection) -> Result<()> {
        let path = self.meta.resolve_endpoint("detail", &self.fields)?;
        connection
            .request(Method::Delete, &path, RequestOptions::new())
            .await
            .map_err(|e| self.translate(e))?;
        self.persisted = false;
        Ok(())
    }

    /// Manager over the collection this record links to as `name`
    ///
    /// The link path picks the target model from the registry, and this
    /// record's `detail` properties become the positional arguments of
    /// `endpoint` on that model.
    pub fn related(&self, name: &str, endpoint: &str) -> Result<Manager> {
        let links = self
            .meta
            .fields
            .iter()
            .find(|field| field.field_type == FieldType::Links)
            .map_or("links", |field| field.name.as_str());

        let path = self
            .fields
            .get(links)
            .and_then(|links| links.get(name))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::validation(format!("{} has no link named \"{}\".", self.meta.name, name))
            })?;

        let model = registry()
            .get_model_by_path(path)
            .ok_or_else(|| Error::validation(format!("No model registered for path {}.", path)))?;
        debug!("Following link {} of {} to {}", name, self.meta.name, model.name);

        let args: Vec<Value> = self
            .meta
            .endpoint_properties("detail")
            .iter()
            .map(|property| self.fields.get(property).cloned().unwrap_or(Value::Null))
            .collect();

        Ok(model.please().for_endpoint(endpoint, args))
    }

    fn translate(&self, err: Error) -> Error {
        match err {
            Error::Request { status: 404, .. } if self.persisted => Error::DoesNotExist {
                model: self.meta.name.clone(),
            },
            other => other,
        }
    }
}
