//! Raw document shape classification.
//!
//! Lore files come in several layouts for the same domain:
//!
//! ```text
//! { "characters": { "Northern Court": [ {..}, {..} ] } }   collection → groups
//! { "characters": [ {..}, {..} ] }                          collection → list
//! { "plots": { "The Sundering": {..} } }                    collection → keyed
//! [ {..}, {..} ]                                            bare list
//! { "name": "Lyra", .. }                                    bare object
//! ```
//!
//! [`classify`] sorts a parsed document into one [`RawShape`] variant up
//! front. Normalizers then match on the variant and use the record
//! extractors below, so each layout can be tested on its own.

use serde_json::{Map, Value};

/// Top-level key written into a raw file replaced by legacy migration.
pub const MIGRATION_STUB_KEY: &str = "_migrated";

static NULL: Value = Value::Null;

/// The recognized top-level layouts of a raw document.
#[derive(Debug, Clone, Copy)]
pub enum RawShape<'a> {
    /// `{ "<collection>": [ ... ] }`
    CollectionList { key: &'a str, items: &'a [Value] },
    /// `{ "<collection>": { ... } }`. Whether the inner object holds groups
    /// or named entries is decided by the domain normalizer.
    CollectionMap {
        key: &'a str,
        entries: &'a Map<String, Value>,
    },
    /// `[ ... ]`
    BareList(&'a [Value]),
    /// An object with none of the domain's collection keys.
    BareObject(&'a Map<String, Value>),
    /// Scalars, or a collection key holding a scalar.
    Unrecognized,
}

/// Classify a document against a domain's collection keys, checked in order.
pub fn classify<'a>(doc: &'a Value, collection_keys: &[&str]) -> RawShape<'a> {
    match doc {
        Value::Object(map) => {
            for key in collection_keys {
                if let Some((key, value)) = map.get_key_value(*key) {
                    return match value {
                        Value::Array(items) => RawShape::CollectionList {
                            key: key.as_str(),
                            items: items.as_slice(),
                        },
                        Value::Object(entries) => RawShape::CollectionMap {
                            key: key.as_str(),
                            entries,
                        },
                        _ => RawShape::Unrecognized,
                    };
                }
            }
            RawShape::BareObject(map)
        }
        Value::Array(items) => RawShape::BareList(items.as_slice()),
        _ => RawShape::Unrecognized,
    }
}

/// One raw entity body plus where it was found.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    /// Object key naming the entity, for keyed layouts.
    pub key: Option<&'a str>,
    /// Enclosing group label, for grouped layouts.
    pub group: Option<&'a str>,
    pub body: &'a Map<String, Value>,
}

impl<'a> RawRecord<'a> {
    pub fn single(body: &'a Map<String, Value>) -> Self {
        Self {
            key: None,
            group: None,
            body,
        }
    }

    /// Field value, or `null` when absent.
    pub fn get(&self, field: &str) -> &'a Value {
        self.body.get(field).unwrap_or(&NULL)
    }
}

/// Object items of a list. Non-object items are skipped.
pub fn list_records<'a>(items: &'a [Value], group: Option<&'a str>) -> Vec<RawRecord<'a>> {
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|body| RawRecord {
            key: None,
            group,
            body,
        })
        .collect()
}

/// `name → body` entries of an object. Non-object bodies are skipped.
pub fn keyed_records<'a>(
    entries: &'a Map<String, Value>,
    group: Option<&'a str>,
) -> Vec<RawRecord<'a>> {
    entries
        .iter()
        .filter_map(|(key, body)| {
            body.as_object().map(|body| RawRecord {
                key: Some(key.as_str()),
                group,
                body,
            })
        })
        .collect()
}

/// `group → block` entries where each block is a list of bodies, a keyed
/// object of bodies, or a single body carrying its own `name`.
pub fn grouped_records(groups: &Map<String, Value>) -> Vec<RawRecord<'_>> {
    let mut records = Vec::new();
    for (group, block) in groups {
        let group = Some(group.as_str());
        match block {
            Value::Array(items) => records.extend(list_records(items, group)),
            Value::Object(body) if body.contains_key("name") => records.push(RawRecord {
                key: None,
                group,
                body,
            }),
            Value::Object(entries) => records.extend(keyed_records(entries, group)),
            _ => {}
        }
    }
    records
}

/// Truthiness of a raw value: `null`, `false`, `0`, and empty
/// strings/lists/objects are all "absent".
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// The first truthy value among `keys`, in order.
pub fn first_present<'a>(body: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| body.get(*key))
        .find(|value| is_truthy(value))
}

/// Keys that hold a usable value but lose to an earlier key of the same
/// group under [`first_present`].
pub fn shadowed_alternates<'a>(body: &Map<String, Value>, groups: &[&[&'a str]]) -> Vec<&'a str> {
    let mut shadowed = Vec::new();
    for keys in groups {
        let mut present = keys
            .iter()
            .filter(|key| body.get(**key).is_some_and(is_truthy));
        present.next();
        shadowed.extend(present.copied());
    }
    shadowed
}

/// Whether a raw document is a stub left behind by legacy migration.
pub fn is_migration_stub(doc: &Value) -> bool {
    doc.as_object()
        .is_some_and(|map| map.contains_key(MIGRATION_STUB_KEY))
}
