//! Magic ability normalization.
//!
//! Accepts the legacy mastery document (`abilities_list` under
//! [`LEGACY_ROOT`]), a `magic`/`abilities` collection, or a bare list.
//! List items may be plain strings naming an ability. Items without a
//! usable name are dropped.

use serde_json::{Map, Value};

use super::{extract_summary, NormalizeContext, Overflow};
use crate::category::Category;
use crate::entity::MagicAbility;
use crate::shape::{classify, RawRecord, RawShape};
use crate::text::{clean, clean_list, clean_str, derive_id};

pub const LEGACY_ROOT: &str = "magic_Levels_of_mastery_and_abilities";

const COLLECTION_KEYS: &[&str] = &[LEGACY_ROOT, "magic", "abilities"];

const RECOGNIZED: &[&str] = &["name", "type", "school", "domains"];

pub fn normalize(doc: &Value, ctx: &NormalizeContext) -> Vec<MagicAbility> {
    match classify(doc, COLLECTION_KEYS) {
        RawShape::CollectionMap { key, entries } if key == LEGACY_ROOT => match entries.get("abilities_list") {
            Some(Value::Array(items)) => from_items(items, ctx),
            _ => Vec::new(),
        },
        RawShape::CollectionMap { entries, .. } => entries
            .iter()
            .filter_map(|(key, body)| match body {
                Value::Object(body) => from_record(
                    &RawRecord {
                        key: Some(key.as_str()),
                        group: None,
                        body,
                    },
                    ctx,
                ),
                text => clean_str(key).map(|name| {
                    let mut ability = named(name, ctx);
                    ability.description = clean(text);
                    ability
                }),
            })
            .collect(),
        RawShape::CollectionList { items, .. } | RawShape::BareList(items) => from_items(items, ctx),
        RawShape::BareObject(body) => from_record(&RawRecord::single(body), ctx).into_iter().collect(),
        RawShape::Unrecognized => Vec::new(),
    }
}

fn from_items(items: &[Value], ctx: &NormalizeContext) -> Vec<MagicAbility> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(body) => from_record(&RawRecord::single(body), ctx),
            scalar => clean(scalar).map(|name| named(name, ctx)),
        })
        .collect()
}

/// `None` when neither the `name` field nor the record key yields a name.
pub fn from_record(record: &RawRecord, ctx: &NormalizeContext) -> Option<MagicAbility> {
    let body: &Map<String, Value> = record.body;
    let name = clean(record.get("name")).or_else(|| record.key.and_then(clean_str))?;
    let description = extract_summary(body);
    let description_key = description.as_ref().map(|(key, _)| *key);

    let (notes, attributes) = Overflow::collect(body, |key, _| {
        RECOGNIZED.contains(&key) || Some(key) == description_key
    })
    .into_parts();

    Some(MagicAbility {
        id: derive_id(&name),
        kind: clean(record.get("type")),
        school: clean(record.get("school")),
        description: description.map(|(_, text)| text),
        domains: clean_list(record.get("domains")).unwrap_or_default(),
        notes,
        attributes,
        source: ctx.source(Category::Magic, None),
        name,
    })
}

fn named(name: String, ctx: &NormalizeContext) -> MagicAbility {
    MagicAbility {
        id: derive_id(&name),
        name,
        kind: None,
        school: None,
        description: None,
        domains: Vec::new(),
        notes: None,
        attributes: None,
        source: ctx.source(Category::Magic, None),
    }
}
