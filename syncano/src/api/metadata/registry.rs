//! Process-wide model registry
//!
//! Maps model names to their metadata. Synthesized models are added on first
//! access and never removed, so a backend schema change after synthesis is
//! not observed until [`Registry::clear`] or [`Registry::remove`] is called.
//! Models can also be found by a concrete request path, which is how record
//! links are followed.

use log::debug;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use super::builtin;
use super::models::ModelMeta;
use crate::api::error::Result;

#[derive(Debug, Default)]
pub struct Registry {
    models: RwLock<HashMap<String, Arc<ModelMeta>>>,
    // Serializes synthesis so each name is built at most once
    synthesis: tokio::sync::Mutex<()>,
}

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::default();
    builtin::register(&registry);
    registry
});

/// Access the process-wide registry
pub fn registry() -> &'static Registry {
    &REGISTRY
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_model_by_name(&self, name: &str) -> Option<Arc<ModelMeta>> {
        self.models
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Register `model` under `name`; the first registration wins
    pub fn add(&self, name: impl Into<String>, model: Arc<ModelMeta>) -> Arc<ModelMeta> {
        let name = name.into();
        let mut models = self.models.write().unwrap_or_else(|e| e.into_inner());
        models
            .entry(name)
            .or_insert_with_key(|name| {
                debug!("Registering model: {}", name);
                model
            })
            .clone()
    }

    /// Look up `name`, building and registering it on a miss
    ///
    /// `build` runs at most once per name even when called concurrently.
    pub async fn get_or_try_insert_with<F, Fut>(&self, name: &str, build: F) -> Result<Arc<ModelMeta>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ModelMeta>>,
    {
        if let Some(model) = self.get_model_by_name(name) {
            return Ok(model);
        }

        let _guard = self.synthesis.lock().await;

        if let Some(model) = self.get_model_by_name(name) {
            return Ok(model);
        }

        debug!("Synthesizing model: {}", name);
        let model = build().await?;
        Ok(self.add(name, Arc::new(model)))
    }

    /// Model with an endpoint template matching `path`
    ///
    /// `path` may be absolute and carry a query string. Root models win over
    /// synthesized ones sharing the same templates; ties go to the lowest name.
    pub fn get_model_by_path(&self, path: &str) -> Option<Arc<ModelMeta>> {
        let path = request_path(path);
        let models = self.models.read().unwrap_or_else(|e| e.into_inner());

        let mut candidates: Vec<&Arc<ModelMeta>> = models
            .values()
            .filter(|model| model.endpoints.values().any(|e| e.matches(path)))
            .collect();
        candidates.sort_by(|a, b| {
            a.base
                .is_some()
                .cmp(&b.base.is_some())
                .then_with(|| a.name.cmp(&b.name))
        });

        candidates.first().map(|model| (*model).clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .models
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn remove(&self, name: &str) -> Option<Arc<ModelMeta>> {
        self.models
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
    }

    /// Drop every synthesized model; built-in and explicitly added root
    /// models stay registered
    pub fn clear(&self) {
        self.models
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|_, model| model.base.is_none());
    }
}

fn request_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match path.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |start| &rest[start..]),
        None => path,
    }
}
