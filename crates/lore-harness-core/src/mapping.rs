//! Field mapping between canonical entities and remote page properties.
//!
//! A [`FieldMapping`] is a per-category JSON object:
//!
//! ```json
//! {
//!   "Name":    { "json": "name",          "type": "title" },
//!   "Species": { "json": "species",       "type": "select" },
//!   "Domains": { "json": "domains",       "type": "multi_select" },
//!   "File":    { "json": "source.file",   "type": "rich_text" }
//! }
//! ```
//!
//! `json` is a dotted path into the entity document. The same table drives
//! both directions: [`FieldMapping::to_properties`] for push and
//! [`FieldMapping::from_properties`] for pull.

use anyhow::{bail, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::shape::is_truthy;
use crate::text::value_to_text;

/// Remote property types understood by the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Title,
    RichText,
    Select,
    MultiSelect,
    Number,
    Checkbox,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Title => "title",
            PropertyType::RichText => "rich_text",
            PropertyType::Select => "select",
            PropertyType::MultiSelect => "multi_select",
            PropertyType::Number => "number",
            PropertyType::Checkbox => "checkbox",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "title" => Some(PropertyType::Title),
            "rich_text" => Some(PropertyType::RichText),
            "select" => Some(PropertyType::Select),
            "multi_select" => Some(PropertyType::MultiSelect),
            "number" => Some(PropertyType::Number),
            "checkbox" => Some(PropertyType::Checkbox),
            _ => None,
        }
    }

    /// Empty property definition used when adding the property to a remote
    /// schema. Option lists start empty and fill on first use.
    pub fn schema_stub(&self) -> Value {
        match self {
            PropertyType::Select => json!({ "select": { "options": [] } }),
            PropertyType::MultiSelect => json!({ "multi_select": { "options": [] } }),
            other => json!({ other.as_str(): {} }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub json: String,
    #[serde(rename = "type")]
    pub kind: PropertyType,
}

/// `remote property name → field spec`, in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping {
    pub properties: IndexMap<String, FieldSpec>,
}

impl FieldMapping {
    /// Parse and validate a mapping document. Every entry needs a non-empty
    /// `json` path and a known `type`.
    pub fn from_value(doc: &Value) -> Result<Self> {
        let Some(entries) = doc.as_object() else {
            bail!("mapping must be a JSON object of property → {{json, type}}");
        };
        let mut properties = IndexMap::new();
        for (property, spec) in entries {
            let path = spec.get("json").and_then(Value::as_str).unwrap_or_default();
            if path.is_empty() {
                bail!("mapping for property '{}' has no 'json' path", property);
            }
            let type_name = spec.get("type").and_then(Value::as_str).unwrap_or_default();
            let Some(kind) = PropertyType::parse(type_name) else {
                bail!(
                    "mapping for property '{}' has unsupported type '{}'",
                    property,
                    type_name
                );
            };
            properties.insert(
                property.clone(),
                FieldSpec {
                    json: path.to_string(),
                    kind,
                },
            );
        }
        Ok(Self { properties })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.properties.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Name of the first title-typed property.
    pub fn title_property(&self) -> Option<&str> {
        self.iter()
            .find(|(_, spec)| spec.kind == PropertyType::Title)
            .map(|(name, _)| name)
    }

    /// Remote property payload for an entity. Null and missing paths are
    /// omitted, so a push never clears a remote-only value.
    pub fn to_properties(&self, entity: &Value) -> Map<String, Value> {
        self.iter()
            .filter_map(|(name, spec)| {
                let value = get_by_path(entity, &spec.json)?;
                to_remote(spec.kind, value).map(|payload| (name.to_string(), payload))
            })
            .collect()
    }

    /// Dotted-path document built from a remote page's properties. Mapped
    /// properties absent from the page are skipped.
    pub fn from_properties(&self, properties: &Value) -> Value {
        let mut out = Value::Object(Map::new());
        for (name, spec) in self.iter() {
            if let Some(prop) = properties.get(name) {
                set_by_path(&mut out, &spec.json, from_remote(spec.kind, prop));
            }
        }
        out
    }

    /// Copy every mapped, non-null path of `pulled` into `target`. Unmapped
    /// fields of `target` are untouched. Returns the number of paths set.
    pub fn merge_into(&self, target: &mut Value, pulled: &Value) -> usize {
        let mut merged = 0;
        for (_, spec) in self.iter() {
            if let Some(value) = get_by_path(pulled, &spec.json).filter(|v| !v.is_null()) {
                set_by_path(target, &spec.json, value.clone());
                merged += 1;
            }
        }
        merged
    }
}

/// Value at a dotted path. `None` if any step is missing or not an object.
pub fn get_by_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |cur, part| cur.as_object()?.get(part))
}

/// Set a dotted path, replacing non-object intermediates with objects.
pub fn set_by_path(target: &mut Value, path: &str, value: Value) {
    let parts: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = parts.split_last() else {
        return;
    };
    let mut cur = target;
    for part in parents {
        cur = ensure_object(cur)
            .entry(part.to_string())
            .or_insert(Value::Null);
    }
    ensure_object(cur).insert(last.to_string(), value);
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// Text form of a value; lists are joined with `", "`.
fn display_text(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(value_to_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => value_to_text(other).unwrap_or_default(),
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Remote property payload for one value, or `None` to omit it.
pub fn to_remote(kind: PropertyType, value: &Value) -> Option<Value> {
    if value.is_null() {
        return None;
    }
    let payload = match kind {
        PropertyType::Title | PropertyType::RichText => {
            json!({ kind.as_str(): [ { "text": { "content": display_text(value) } } ] })
        }
        PropertyType::Select => json!({ "select": { "name": display_text(value) } }),
        PropertyType::MultiSelect => {
            let names: Vec<Value> = match value {
                Value::Array(items) => items
                    .iter()
                    .filter_map(value_to_text)
                    .map(|name| json!({ "name": name }))
                    .collect(),
                scalar => vec![json!({ "name": display_text(scalar) })],
            };
            json!({ "multi_select": names })
        }
        PropertyType::Number => {
            let number = coerce_number(value)
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null);
            json!({ "number": number })
        }
        PropertyType::Checkbox => json!({ "checkbox": is_truthy(value) }),
    };
    Some(payload)
}

/// Concatenated text of a rich-text run list. Runs carry `plain_text` in
/// responses and `text.content` in requests; either is accepted.
fn run_text(runs: &[Value]) -> String {
    runs.iter()
        .filter_map(|run| {
            run.get("plain_text")
                .and_then(Value::as_str)
                .or_else(|| run.pointer("/text/content").and_then(Value::as_str))
        })
        .collect()
}

/// Local value for one remote property.
pub fn from_remote(kind: PropertyType, prop: &Value) -> Value {
    match kind {
        PropertyType::Title | PropertyType::RichText => match prop.get(kind.as_str()) {
            Some(Value::Array(runs)) if !runs.is_empty() => Value::String(run_text(runs)),
            _ => Value::Null,
        },
        PropertyType::Select => prop
            .pointer("/select/name")
            .cloned()
            .unwrap_or(Value::Null),
        PropertyType::MultiSelect => Value::Array(
            prop.get("multi_select")
                .and_then(Value::as_array)
                .map(|options| {
                    options
                        .iter()
                        .filter_map(|o| o.get("name").cloned())
                        .collect()
                })
                .unwrap_or_default(),
        ),
        PropertyType::Number => prop.get("number").cloned().unwrap_or(Value::Null),
        PropertyType::Checkbox => prop.get("checkbox").cloned().unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> FieldMapping {
        FieldMapping::from_value(&json!({
            "Name": { "json": "name", "type": "title" },
            "Species": { "json": "species", "type": "select" },
            "Domains": { "json": "domains", "type": "multi_select" },
            "Age": { "json": "age", "type": "number" },
            "Canon": { "json": "flags.canon", "type": "checkbox" },
            "File": { "json": "source.file", "type": "rich_text" }
        }))
        .unwrap()
    }

    #[test]
    fn test_from_value_rejects_bad_entries() {
        assert!(FieldMapping::from_value(&json!([])).is_err());
        assert!(FieldMapping::from_value(&json!({ "X": { "type": "title" } })).is_err());
        let err = FieldMapping::from_value(&json!({ "X": { "json": "x", "type": "people" } })).unwrap_err();
        assert!(err.to_string().contains("people"));
    }

    #[test]
    fn test_title_property() {
        assert_eq!(mapping().title_property(), Some("Name"));
        assert_eq!(FieldMapping::default().title_property(), None);
    }

    #[test]
    fn test_to_properties_omits_null() {
        let entity = json!({
            "name": "Lyra",
            "species": null,
            "domains": "light",
            "age": "312",
            "flags": { "canon": 1 },
            "source": { "file": "lore/characters/formatted/Lyra.json" }
        });
        let props = mapping().to_properties(&entity);
        assert!(!props.contains_key("Species"));
        assert_eq!(props["Name"], json!({ "title": [ { "text": { "content": "Lyra" } } ] }));
        assert_eq!(props["Domains"], json!({ "multi_select": [ { "name": "light" } ] }));
        assert_eq!(props["Age"], json!({ "number": 312.0 }));
        assert_eq!(props["Canon"], json!({ "checkbox": true }));
    }

    #[test]
    fn test_to_remote_number_failure_is_null_number() {
        assert_eq!(
            to_remote(PropertyType::Number, &json!("ancient")),
            Some(json!({ "number": null }))
        );
    }

    #[test]
    fn test_to_remote_multi_select_skips_nulls() {
        assert_eq!(
            to_remote(PropertyType::MultiSelect, &json!(["a", null, "b"])),
            Some(json!({ "multi_select": [ { "name": "a" }, { "name": "b" } ] }))
        );
    }

    #[test]
    fn test_from_remote_extracts_values() {
        let title = json!({ "title": [ { "plain_text": "Ly" }, { "plain_text": "ra" } ] });
        assert_eq!(from_remote(PropertyType::Title, &title), json!("Lyra"));
        assert_eq!(from_remote(PropertyType::RichText, &json!({ "rich_text": [] })), Value::Null);
        assert_eq!(from_remote(PropertyType::Select, &json!({ "select": null })), Value::Null);
        assert_eq!(
            from_remote(PropertyType::MultiSelect, &json!({ "multi_select": [] })),
            json!([])
        );
        assert_eq!(from_remote(PropertyType::Number, &json!({ "number": 3 })), json!(3));
    }

    #[test]
    fn test_from_properties_builds_nested_document() {
        let props = json!({
            "Name": { "title": [ { "plain_text": "Lyra" } ] },
            "File": { "rich_text": [ { "text": { "content": "a.json" } } ] },
            "Unmapped": { "rich_text": [] }
        });
        let doc = mapping().from_properties(&props);
        assert_eq!(doc, json!({ "name": "Lyra", "source": { "file": "a.json" } }));
    }

    #[test]
    fn test_merge_into_preserves_unmapped() {
        let mut local = json!({ "name": "Lyra", "species": "Fae", "notes": ["keep"], "source": "flat" });
        let pulled = json!({ "name": "Lyra", "species": null, "source": { "file": "b.json" } });
        let merged = mapping().merge_into(&mut local, &pulled);
        assert_eq!(merged, 2);
        assert_eq!(local["species"], "Fae");
        assert_eq!(local["notes"], json!(["keep"]));
        assert_eq!(local["source"], json!({ "file": "b.json" }));
    }

    #[test]
    fn test_path_helpers() {
        let mut doc = json!({});
        set_by_path(&mut doc, "a.b.c", json!(1));
        assert_eq!(get_by_path(&doc, "a.b.c"), Some(&json!(1)));
        assert_eq!(get_by_path(&doc, "a.x"), None);
        assert_eq!(get_by_path(&doc, "a.b.c.d"), None);
    }

    #[test]
    fn test_schema_stub() {
        assert_eq!(PropertyType::Select.schema_stub(), json!({ "select": { "options": [] } }));
        assert_eq!(PropertyType::Number.schema_stub(), json!({ "number": {} }));
    }
}
