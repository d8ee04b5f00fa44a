//! Canonical names for synthesized models

/// Build a model name from its parts
///
/// Each part is split on non-alphanumeric characters and every chunk is
/// capitalised: `["my_instance", "books", "object"]` → `MyInstanceBooksObject`.
pub fn class_name(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| part.split(|c: char| !c.is_alphanumeric()))
        .filter(|chunk| !chunk.is_empty())
        .map(capitalize)
        .collect()
}

fn capitalize(chunk: &str) -> String {
    let mut chars = chunk.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
