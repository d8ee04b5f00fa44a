//! Built-in Syncano models

use once_cell::sync::Lazy;
use std::sync::Arc;

use super::models::{FieldMeta, FieldType, ModelKind, ModelMeta};
use super::registry::Registry;
use crate::api::transport::Method::{Delete, Get, Patch, Post, Put};

static INSTANCE: Lazy<Arc<ModelMeta>> = Lazy::new(|| {
    Arc::new(
        ModelMeta::new("Instance", ModelKind::Standard)
            .endpoint("list", "/v1/instances/", &[Get, Post])
            .endpoint("detail", "/v1/instances/{name}/", &[Get, Put, Patch, Delete])
            .field(FieldMeta::new("name", FieldType::String).primary_key())
            .field(FieldMeta::new("description", FieldType::Text))
            .field(FieldMeta::new("role", FieldType::String).read_only())
            .field(FieldMeta::new("owner", FieldType::Object).read_only())
            .field(FieldMeta::new("metadata", FieldType::Object))
            .field(FieldMeta::new("links", FieldType::Links).read_only())
            .field(FieldMeta::new("created_at", FieldType::DateTime).read_only())
            .field(FieldMeta::new("updated_at", FieldType::DateTime).read_only()),
    )
});

static CLASS: Lazy<Arc<ModelMeta>> = Lazy::new(|| {
    Arc::new(
        ModelMeta::new("Class", ModelKind::Standard)
            .endpoint("list", "/v1/instances/{instance_name}/classes/", &[Get, Post])
            .endpoint(
                "detail",
                "/v1/instances/{instance_name}/classes/{name}/",
                &[Get, Put, Patch, Delete],
            )
            .field(FieldMeta::new("name", FieldType::String).primary_key())
            .field(FieldMeta::new("description", FieldType::Text))
            .field(FieldMeta::new("schema", FieldType::Schema))
            .field(FieldMeta::new("objects_count", FieldType::Integer).read_only())
            .field(FieldMeta::new("status", FieldType::String).read_only())
            .field(FieldMeta::new("metadata", FieldType::Object))
            .field(FieldMeta::new("revision", FieldType::Integer).read_only())
            .field(FieldMeta::new("links", FieldType::Links).read_only())
            .field(FieldMeta::new("created_at", FieldType::DateTime).read_only())
            .field(FieldMeta::new("updated_at", FieldType::DateTime).read_only()),
    )
});

static OBJECT: Lazy<Arc<ModelMeta>> = Lazy::new(|| {
    Arc::new(
        ModelMeta::new("Object", ModelKind::Object)
            .endpoint(
                "list",
                "/v1/instances/{instance_name}/classes/{class_name}/objects/",
                &[Get, Post],
            )
            .endpoint(
                "detail",
                "/v1/instances/{instance_name}/classes/{class_name}/objects/{id}/",
                &[Get, Put, Patch, Delete],
            )
            .field(FieldMeta::new("id", FieldType::Integer).primary_key().read_only())
            .field(FieldMeta::new("revision", FieldType::Integer).read_only())
            .field(FieldMeta::new("owner", FieldType::Integer))
            .field(FieldMeta::new("owner_permissions", FieldType::String))
            .field(FieldMeta::new("group", FieldType::Integer))
            .field(FieldMeta::new("group_permissions", FieldType::String))
            .field(FieldMeta::new("other_permissions", FieldType::String))
            .field(FieldMeta::new("channel", FieldType::String))
            .field(FieldMeta::new("channel_room", FieldType::String))
            .field(FieldMeta::new("links", FieldType::Links).read_only())
            .field(FieldMeta::new("created_at", FieldType::DateTime).read_only())
            .field(FieldMeta::new("updated_at", FieldType::DateTime).read_only())
            .parent(class()),
    )
});

static WEBHOOK: Lazy<Arc<ModelMeta>> = Lazy::new(|| {
    Arc::new(
        ModelMeta::new("Webhook", ModelKind::Webhook)
            .endpoint("list", "/v1/instances/{instance_name}/webhooks/", &[Get, Post])
            .endpoint(
                "detail",
                "/v1/instances/{instance_name}/webhooks/{name}/",
                &[Get, Put, Patch, Delete],
            )
            .endpoint("run", "/v1/instances/{instance_name}/webhooks/{name}/run/", &[Get, Post])
            .field(FieldMeta::new("name", FieldType::String).primary_key())
            .field(FieldMeta::new("codebox", FieldType::Integer))
            .field(FieldMeta::new("public", FieldType::Boolean))
            .field(FieldMeta::new("public_link", FieldType::String).read_only())
            .field(FieldMeta::new("links", FieldType::Links).read_only()),
    )
});

pub fn instance() -> Arc<ModelMeta> {
    INSTANCE.clone()
}

pub fn class() -> Arc<ModelMeta> {
    CLASS.clone()
}

/// Base model for schema-described class records
pub fn object() -> Arc<ModelMeta> {
    OBJECT.clone()
}

pub fn webhook() -> Arc<ModelMeta> {
    WEBHOOK.clone()
}

pub(crate) fn register(registry: &Registry) {
    for model in [instance(), class(), object(), webhook()] {
        registry.add(model.name.clone(), model);
    }
}
