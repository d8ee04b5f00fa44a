//! Lookup-based filter translation
//!
//! Filter keys take the form `<field>__<lookup>`; a key without a lookup uses
//! `eq`. `age__gt = 18` becomes `{"age": {"_gt": 18}}`.

use serde_json::{Map, Value};
use std::str::FromStr;

use crate::api::error::{Error, Result};
use crate::api::metadata::ModelMeta;

pub const LOOKUP_SEPARATOR: &str = "__";

/// Comparison operators accepted by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
    Exists,
    In,
}

impl Lookup {
    pub const ALLOWED: [Lookup; 8] = [
        Lookup::Gt,
        Lookup::Gte,
        Lookup::Lt,
        Lookup::Lte,
        Lookup::Eq,
        Lookup::Neq,
        Lookup::Exists,
        Lookup::In,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lookup::Gt => "gt",
            Lookup::Gte => "gte",
            Lookup::Lt => "lt",
            Lookup::Lte => "lte",
            Lookup::Eq => "eq",
            Lookup::Neq => "neq",
            Lookup::Exists => "exists",
            Lookup::In => "in",
        }
    }

    /// Key used in the query document, e.g. `_gte`
    pub fn query_key(&self) -> String {
        format!("_{}", self.as_str())
    }
}

impl FromStr for Lookup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Lookup::ALLOWED
            .iter()
            .find(|l| l.as_str() == s)
            .copied()
            .ok_or_else(|| {
                let allowed: Vec<&str> = Lookup::ALLOWED.iter().map(Lookup::as_str).collect();
                Error::validation(format!(
                    "Invalid lookup type {} allowed are {}.",
                    s,
                    allowed.join(", ")
                ))
            })
    }
}

impl std::fmt::Display for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split `age__gt` into (`age`, `gt`)
pub fn split_key(key: &str) -> (&str, &str) {
    match key.split_once(LOOKUP_SEPARATOR) {
        Some((field, lookup)) if !lookup.is_empty() => (field, lookup),
        Some((field, _)) => (field, "eq"),
        None => (key, "eq"),
    }
}

/// Translate lookups into a query document, validating against `model`
pub fn build_query<I>(model: &ModelMeta, lookups: I) -> Result<Map<String, Value>>
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut query = Map::new();

    for (key, value) in lookups {
        let (field_name, lookup) = split_key(&key);

        let field = model.get_field(field_name).ok_or_else(|| {
            Error::validation(format!(
                "Invalid field name {} allowed are {}.",
                field_name,
                model.field_names().join(", ")
            ))
        })?;
        let lookup: Lookup = lookup.parse()?;

        let encoded = field.to_query(value, lookup)?;
        let entry = query
            .entry(field_name.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(conditions) = entry {
            conditions.insert(lookup.query_key(), encoded);
        }
    }

    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::metadata::{FieldMeta, FieldType, ModelKind};
    use serde_json::json;

    fn person() -> ModelMeta {
        ModelMeta::new("Person", ModelKind::Object)
            .field(FieldMeta::new("age", FieldType::Integer))
            .field(FieldMeta::new("name", FieldType::String))
    }

    fn lookups(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("age__gt"), ("age", "gt"));
        assert_eq!(split_key("age"), ("age", "eq"));
        assert_eq!(split_key("age__"), ("age", "eq"));
    }

    #[test]
    fn test_build_query() {
        let query = build_query(
            &person(),
            lookups(&[("age__gt", json!(18)), ("age__lte", json!(65)), ("name", json!("Ann"))]),
        )
        .unwrap();

        assert_eq!(
            Value::Object(query),
            json!({"age": {"_gt": 18, "_lte": 65}, "name": {"_eq": "Ann"}})
        );
    }

    #[test]
    fn test_unknown_field() {
        let err = build_query(&person(), lookups(&[("bogus__gt", json!(1))])).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.to_string(), "Invalid field name bogus allowed are age, name.");
    }

    #[test]
    fn test_unknown_lookup() {
        let err = build_query(&person(), lookups(&[("age__unknown", json!(1))])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid lookup type unknown allowed are gt, gte, lt, lte, eq, neq, exists, in."
        );
    }
}
