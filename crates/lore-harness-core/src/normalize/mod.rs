//! Entity normalizers.
//!
//! Each domain module turns one parsed raw document into canonical
//! entities. The shape of the document is classified first
//! ([`crate::shape::classify`]); records are then extracted per shape and
//! normalized one at a time. Unrecognized shapes yield no entities.
//!
//! Normalization is pure: no I/O, no clock, no randomness. The same
//! document with the same [`Synonyms`] always produces the same output.

pub mod character;
pub mod creature;
pub mod magic;
pub mod plot;
pub mod realm;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::category::Category;
use crate::entity::{Entity, Source};
use crate::shape::RawRecord;
use crate::synonyms::Synonyms;
use crate::text::{clean, clean_str};

/// Per-call inputs shared by every normalizer.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub synonyms: &'a Synonyms,
    /// Recorded as `source.file` on every entity.
    pub file: &'a str,
}

impl<'a> NormalizeContext<'a> {
    pub fn new(synonyms: &'a Synonyms, file: &'a str) -> Self {
        Self { synonyms, file }
    }

    pub(crate) fn source(&self, category: Category, group: Option<&str>) -> Source {
        Source {
            file: self.file.to_string(),
            category,
            group: group.and_then(clean_str),
        }
    }
}

/// Normalize one raw document of the given category.
pub fn normalize_document(category: Category, doc: &Value, ctx: &NormalizeContext) -> Vec<Entity> {
    match category {
        Category::Characters => character::normalize(doc, ctx)
            .into_iter()
            .map(Entity::Character)
            .collect(),
        Category::Creatures => creature::normalize(doc, ctx)
            .into_iter()
            .map(Entity::Creature)
            .collect(),
        Category::Realms => realm::normalize(doc, ctx)
            .into_iter()
            .map(Entity::Realm)
            .collect(),
        Category::Plots => plot::normalize(doc, ctx)
            .into_iter()
            .map(Entity::Plot)
            .collect(),
        Category::Magic => magic::normalize(doc, ctx)
            .into_iter()
            .map(Entity::Magic)
            .collect(),
    }
}

/// Unrecognized fields of a raw body.
///
/// Scalars become `"key: value"` notes; arrays and objects are kept
/// verbatim under `attributes`.
#[derive(Debug, Default)]
pub(crate) struct Overflow {
    pub notes: Vec<String>,
    pub attributes: IndexMap<String, Value>,
}

impl Overflow {
    pub fn collect(body: &Map<String, Value>, recognized: impl Fn(&str, &Value) -> bool) -> Self {
        let mut overflow = Self::default();
        for (key, value) in body {
            if !recognized(key, value) {
                overflow.push(key, value);
            }
        }
        overflow
    }

    pub fn push(&mut self, key: &str, value: &Value) {
        match value {
            Value::Array(_) | Value::Object(_) => {
                self.attributes.insert(key.to_string(), value.clone());
            }
            scalar => {
                if let Some(text) = clean(scalar) {
                    self.notes.push(format!("{}: {}", key, text));
                }
            }
        }
    }

    pub fn into_parts(self) -> (Option<Vec<String>>, Option<IndexMap<String, Value>>) {
        (
            non_empty(self.notes),
            (!self.attributes.is_empty()).then_some(self.attributes),
        )
    }
}

pub(crate) fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

/// Keys consulted for a free-text summary, in order.
pub(crate) const SUMMARY_KEYS: &[&str] = &["summary", "description", "overview"];

/// The first usable summary and the key it came from.
///
/// Checks [`SUMMARY_KEYS`] in order. A string value is cleaned; an object
/// value is searched one level deeper for `description`.
pub(crate) fn extract_summary(body: &Map<String, Value>) -> Option<(&'static str, String)> {
    SUMMARY_KEYS.iter().find_map(|key| {
        let text = match body.get(*key)? {
            Value::Object(nested) => nested.get("description").and_then(clean),
            Value::String(s) => clean_str(s),
            _ => None,
        };
        text.map(|text| (*key, text))
    })
}

/// The first of `fields` that survives cleaning, else the record key, else
/// `"Unknown"`.
pub(crate) fn record_name(record: &RawRecord, fields: &[&str]) -> String {
    fields
        .iter()
        .find_map(|field| clean(record.get(field)))
        .or_else(|| record.key.and_then(clean_str))
        .unwrap_or_else(|| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overflow_splits_scalars_and_nested() {
        let body = json!({
            "name": "Lyra",
            "mood": "  wistful ",
            "empty": "",
            "tags": ["a", "b"],
            "meta": { "k": 1 }
        });
        let overflow = Overflow::collect(body.as_object().unwrap(), |k, _| k == "name");
        let (notes, attributes) = overflow.into_parts();
        assert_eq!(notes.unwrap(), vec!["mood: wistful"]);
        let attributes = attributes.unwrap();
        assert_eq!(attributes.get("tags"), Some(&json!(["a", "b"])));
        assert_eq!(attributes.get("meta"), Some(&json!({ "k": 1 })));
        assert!(!attributes.contains_key("empty"));
    }

    #[test]
    fn test_extract_summary_order_and_nesting() {
        let body = json!({ "overview": "late", "description": { "description": " nested " } });
        assert_eq!(
            extract_summary(body.as_object().unwrap()),
            Some(("description", "nested".to_string()))
        );

        let body = json!({ "summary": 3, "overview": "fallback" });
        assert_eq!(
            extract_summary(body.as_object().unwrap()),
            Some(("overview", "fallback".to_string()))
        );
    }

    #[test]
    fn test_record_name_fallbacks() {
        let body = json!({ "name": "  ", "plot_name": "The Sundering" });
        let body = body.as_object().unwrap();
        let keyed = RawRecord { key: Some("From Key"), group: None, body };
        assert_eq!(record_name(&keyed, &["plot_name", "name"]), "The Sundering");
        assert_eq!(record_name(&keyed, &["name"]), "From Key");
        assert_eq!(record_name(&RawRecord::single(body), &["name"]), "Unknown");
    }

    #[test]
    fn test_normalize_document_dispatch() {
        let synonyms = Synonyms::defaults_for(Category::Realms);
        let ctx = NormalizeContext::new(&synonyms, "realms.json");
        let doc = json!({ "realms": [ { "name": "the abyss" } ] });
        let entities = normalize_document(Category::Realms, &doc, &ctx);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name(), "Abyss");
        assert_eq!(entities[0].category(), Category::Realms);
        assert_eq!(entities[0].source().file, "realms.json");
    }
}
