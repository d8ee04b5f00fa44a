//! In-memory editing of a class schema
//!
//! Changes made through [`SchemaManager`] stay local until the owning class
//! record is saved.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::error::{Error, Result};

/// One schema entry, e.g. `{"name": "title", "type": "string", "order_index": true}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_index: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_index: Option<bool>,
    /// Type-specific keys such as `target` for references
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            order_index: None,
            filter_index: None,
            extra: Map::new(),
        }
    }

    pub fn has_order_index(&self) -> bool {
        self.order_index.unwrap_or(false)
    }

    pub fn has_filter_index(&self) -> bool {
        self.filter_index.unwrap_or(false)
    }
}

/// Ordered list of schema fields keyed by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaManager {
    schema: Vec<SchemaField>,
}

impl SchemaManager {
    pub fn new(schema: Vec<SchemaField>) -> Self {
        Self { schema }
    }

    /// Parse a schema as returned by the backend
    ///
    /// Accepts a JSON list or a string containing one; `null` is an empty schema.
    pub fn from_value(value: &Value) -> Result<Self> {
        let schema = match value {
            Value::Null => Vec::new(),
            Value::String(raw) if raw.is_empty() => Vec::new(),
            Value::String(raw) => serde_json::from_str(raw)
                .map_err(|e| Error::validation(format!("Invalid schema: {}", e)))?,
            other => serde_json::from_value(other.clone())
                .map_err(|e| Error::validation(format!("Invalid schema: {}", e)))?,
        };
        Ok(Self { schema })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.schema).unwrap_or(Value::Array(Vec::new()))
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.schema.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schema.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SchemaField> {
        self.schema.iter()
    }

    pub fn get(&self, name: &str) -> Option<&SchemaField> {
        self.schema.iter().find(|f| f.name == name)
    }

    pub fn get_index(&self, index: usize) -> Option<&SchemaField> {
        self.schema.get(index)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut SchemaField> {
        self.schema
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::validation(format!("Unknown schema field: {}.", name)))
    }

    /// Replace the field called `name` (moving it to the end)
    pub fn insert(&mut self, name: &str, mut field: SchemaField) {
        field.name = name.to_string();
        self.remove(&[name]);
        self.add([field]);
    }

    pub fn contains(&self, field: &SchemaField) -> bool {
        self.schema.contains(field)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn set(&mut self, schema: Vec<SchemaField>) {
        self.schema = schema;
    }

    pub fn add(&mut self, fields: impl IntoIterator<Item = SchemaField>) {
        self.schema.extend(fields);
    }

    pub fn remove(&mut self, names: &[&str]) {
        self.schema.retain(|f| !names.contains(&f.name.as_str()));
    }

    pub fn clear(&mut self) {
        self.schema.clear();
    }

    /// Set order and/or filter index on `field`
    pub fn set_index(&mut self, field: &str, order: bool, filter: bool) -> Result<()> {
        if !order && !filter {
            return Err(Error::validation("Choose at least one index."));
        }

        let entry = self.get_mut(field)?;
        if order {
            entry.order_index = Some(true);
        }
        if filter {
            entry.filter_index = Some(true);
        }
        Ok(())
    }

    pub fn set_order_index(&mut self, field: &str) -> Result<()> {
        self.set_index(field, true, false)
    }

    pub fn set_filter_index(&mut self, field: &str) -> Result<()> {
        self.set_index(field, false, true)
    }

    /// Remove order and/or filter index from `field`
    pub fn remove_index(&mut self, field: &str, order: bool, filter: bool) -> Result<()> {
        if !order && !filter {
            return Err(Error::validation("Choose at least one index."));
        }

        let entry = self.get_mut(field)?;
        if order {
            entry.order_index = None;
        }
        if filter {
            entry.filter_index = None;
        }
        Ok(())
    }

    pub fn remove_order_index(&mut self, field: &str) -> Result<()> {
        self.remove_index(field, true, false)
    }

    pub fn remove_filter_index(&mut self, field: &str) -> Result<()> {
        self.remove_index(field, false, true)
    }
}

impl std::fmt::Display for SchemaManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl<'a> IntoIterator for &'a SchemaManager {
    type Item = &'a SchemaField;
    type IntoIter = std::slice::Iter<'a, SchemaField>;

    fn into_iter(self) -> Self::IntoIter {
        self.schema.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> SchemaManager {
        SchemaManager::new(vec![
            SchemaField::new("title", "string"),
            SchemaField::new("pages", "integer"),
        ])
    }

    #[test]
    fn test_from_value() {
        let value = json!([
            {"name": "title", "type": "string", "order_index": true},
            {"name": "author", "type": "reference", "target": "authors"}
        ]);
        let schema = SchemaManager::from_value(&value).unwrap();

        assert_eq!(schema.len(), 2);
        assert!(schema.get("title").unwrap().has_order_index());
        assert_eq!(schema.get("author").unwrap().extra["target"], json!("authors"));
        assert_eq!(schema.to_value(), value);

        let as_string = Value::String(value.to_string());
        assert_eq!(SchemaManager::from_value(&as_string).unwrap(), schema);
        assert!(SchemaManager::from_value(&Value::Null).unwrap().is_empty());
        assert!(SchemaManager::from_value(&json!({"bad": 1})).is_err());
    }

    #[test]
    fn test_insert_replaces_by_name() {
        let mut schema = schema();
        schema.insert("title", SchemaField::new("ignored", "text"));

        assert_eq!(schema.len(), 2);
        assert_eq!(schema.get_index(1).unwrap().name, "title");
        assert_eq!(schema.get("title").unwrap().field_type, "text");
        assert!(!schema.contains_name("ignored"));
    }

    #[test]
    fn test_add_remove_clear() {
        let mut schema = schema();
        schema.add([SchemaField::new("isbn", "string"), SchemaField::new("price", "float")]);
        assert_eq!(schema.len(), 4);
        assert!(schema.contains(&SchemaField::new("isbn", "string")));

        schema.remove(&["isbn", "price"]);
        let names: Vec<&str> = schema.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["title", "pages"]);

        schema.clear();
        assert!(schema.is_empty());
    }

    #[test]
    fn test_set_and_remove_index() {
        let mut schema = schema();

        schema.set_index("pages", true, true).unwrap();
        let pages = schema.get("pages").unwrap();
        assert!(pages.has_order_index() && pages.has_filter_index());

        schema.remove_order_index("pages").unwrap();
        assert!(!schema.get("pages").unwrap().has_order_index());
        assert!(schema.get("pages").unwrap().has_filter_index());

        schema.set_filter_index("title").unwrap();
        assert_eq!(
            schema.to_value(),
            json!([
                {"name": "title", "type": "string", "filter_index": true},
                {"name": "pages", "type": "integer", "filter_index": true}
            ])
        );
    }

    #[test]
    fn test_index_requires_choice() {
        let mut schema = schema();
        let err = schema.set_index("title", false, false).unwrap_err();
        assert_eq!(err.to_string(), "Choose at least one index.");
        assert!(schema.remove_index("title", false, false).is_err());
        assert!(schema.set_order_index("missing").is_err());
    }
}
