//! Creature normalization.
//!
//! `region` and `realm` are derived from free text by substring containment
//! against the `region` and `realm` synonym axes, where table order decides
//! which needle wins.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::{record_name, NormalizeContext};
use crate::category::Category;
use crate::entity::Creature;
use crate::shape::{
    classify, first_present, keyed_records, list_records, shadowed_alternates, RawRecord, RawShape,
};
use crate::synonyms::{match_containing, Synonyms};
use crate::text::{clean, clean_list, clean_str, derive_id, title_case};

const COLLECTION_KEYS: &[&str] = &["creatures"];

const RECOGNIZED: &[&str] = &[
    "name",
    "type",
    "kind",
    "species",
    "location",
    "habitat",
    "region",
    "realm",
    "description",
    "abilities",
    "powers",
    "danger_level",
    "threat",
    "danger",
];

const KIND_KEYS: &[&str] = &["type", "kind", "species"];
const LOCATION_KEYS: &[&str] = &["location", "habitat"];
const ABILITY_KEYS: &[&str] = &["abilities", "powers"];
const DANGER_KEYS: &[&str] = &["danger_level", "threat", "danger"];

pub fn normalize(doc: &Value, ctx: &NormalizeContext) -> Vec<Creature> {
    let records = match classify(doc, COLLECTION_KEYS) {
        RawShape::CollectionList { items, .. } | RawShape::BareList(items) => {
            list_records(items, None)
        }
        RawShape::CollectionMap { entries, .. } => group_records(entries),
        RawShape::BareObject(body) if body.contains_key("name") => vec![RawRecord::single(body)],
        RawShape::BareObject(body) => keyed_records(body, None),
        RawShape::Unrecognized => Vec::new(),
    };
    records.iter().map(|r| normalize_record(r, ctx)).collect()
}

/// `{group: {name: body}}` blocks. A block whose values are not objects is
/// itself one ungrouped creature named by its key.
fn group_records(entries: &Map<String, Value>) -> Vec<RawRecord<'_>> {
    let mut records = Vec::new();
    for (key, block) in entries {
        match block {
            Value::Object(inner) if inner.values().any(Value::is_object) => {
                records.extend(keyed_records(inner, Some(key.as_str())));
            }
            Value::Object(body) => records.push(RawRecord {
                key: Some(key.as_str()),
                group: None,
                body,
            }),
            Value::Array(items) => records.extend(list_records(items, Some(key.as_str()))),
            _ => {}
        }
    }
    records
}

pub fn normalize_record(record: &RawRecord, ctx: &NormalizeContext) -> Creature {
    let body = record.body;
    let name = record_name(record, &["name"]);
    let synonyms = ctx.synonyms;

    let kind = first_present(body, KIND_KEYS)
        .and_then(clean)
        .map(|k| synonyms.canonicalize("type", &k, false));
    let location = first_present(body, LOCATION_KEYS)
        .and_then(clean)
        .map(|l| synonyms.canonicalize("location", &l, true));
    let region = derive_region(
        clean(record.get("region")),
        location.as_deref(),
        record.group,
        synonyms,
    );
    let realm = derive_realm(
        clean(record.get("realm")),
        location.as_deref(),
        region.as_deref(),
        synonyms,
    );

    Creature {
        id: derive_id(&name),
        kind,
        location,
        region,
        realm,
        description: clean(record.get("description")),
        abilities: first_present(body, ABILITY_KEYS)
            .and_then(clean_list)
            .unwrap_or_default(),
        danger_level: first_present(body, DANGER_KEYS).and_then(clean),
        attributes: attributes(body),
        source: ctx.source(Category::Creatures, record.group),
        name,
    }
}

/// Explicit region, else the first region needle found in the location,
/// else the raw group label.
fn derive_region(
    explicit: Option<String>,
    location: Option<&str>,
    group: Option<&str>,
    synonyms: &Synonyms,
) -> Option<String> {
    let table = synonyms.table("region");
    if let Some(explicit) = explicit {
        return Some(
            match_containing(&explicit, table)
                .map(str::to_string)
                .unwrap_or(explicit),
        );
    }
    location
        .and_then(|l| match_containing(l, table))
        .map(str::to_string)
        .or_else(|| group.and_then(clean_str))
}

/// The first realm needle found in the explicit realm, the location, or
/// the region, in that order. An explicit realm with no needle is
/// title-cased.
fn derive_realm(
    explicit: Option<String>,
    location: Option<&str>,
    region: Option<&str>,
    synonyms: &Synonyms,
) -> Option<String> {
    let table = synonyms.table("realm");
    [explicit.as_deref(), location, region]
        .into_iter()
        .flatten()
        .find_map(|text| match_containing(text, table))
        .map(str::to_string)
        .or_else(|| explicit.as_deref().map(title_case))
}

/// Everything not consumed by a dedicated field, including alternates that
/// lost to an earlier key. Nested values are kept verbatim, scalars as
/// cleaned text.
fn attributes(body: &Map<String, Value>) -> Option<IndexMap<String, Value>> {
    let shadowed = shadowed_alternates(body, &[KIND_KEYS, LOCATION_KEYS, ABILITY_KEYS, DANGER_KEYS]);
    let mut out = IndexMap::new();
    for (key, value) in body {
        let key_str = key.as_str();
        if RECOGNIZED.contains(&key_str) && !shadowed.contains(&key_str) {
            continue;
        }
        match value {
            Value::Array(_) | Value::Object(_) => {
                out.insert(key.clone(), value.clone());
            }
            scalar => {
                if let Some(text) = clean(scalar) {
                    out.insert(key.clone(), Value::String(text));
                }
            }
        }
    }
    (!out.is_empty()).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(doc: Value) -> Vec<Creature> {
        let synonyms = Synonyms::defaults_for(Category::Creatures);
        let ctx = NormalizeContext::new(&synonyms, "lore/creatures/creatures.json");
        normalize(&doc, &ctx)
    }

    #[test]
    fn test_grouped_keyed_creatures() {
        let out = run(json!({
            "creatures": {
                "Wraithwood Beasts": {
                    "Shade Hound": { "type": "predatory beasts", "habitat": "wraithwood" },
                    "Gloom Moth": { "type": "moth" }
                }
            }
        }));
        assert_eq!(out.len(), 2);
        let hound = &out[0];
        assert_eq!(hound.id, "shade_hound");
        assert_eq!(hound.kind.as_deref(), Some("Beast"));
        assert_eq!(hound.location.as_deref(), Some("Wraithwood Forest"));
        assert_eq!(hound.region.as_deref(), Some("Wraithwood"));
        assert_eq!(hound.realm.as_deref(), Some("Elarion"));
        assert_eq!(hound.source.group.as_deref(), Some("Wraithwood Beasts"));

        let moth = &out[1];
        assert_eq!(moth.kind.as_deref(), Some("moth"));
        assert_eq!(moth.region.as_deref(), Some("Wraithwood Beasts"));
        assert_eq!(moth.realm.as_deref(), Some("Elarion"));
    }

    #[test]
    fn test_flat_keyed_and_list_shapes() {
        let out = run(json!({ "Ember Drake": { "location": "ignisyr peaks" } }));
        assert_eq!(out[0].name, "Ember Drake");
        assert_eq!(out[0].region.as_deref(), Some("Ignisyr"));
        assert_eq!(out[0].realm.as_deref(), Some("Ignisyr"));
        assert!(out[0].source.group.is_none());

        let out = run(json!([ { "name": "Void Eel", "location": "The Abyss" }, 7 ]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].location.as_deref(), Some("Abyss"));
        assert_eq!(out[0].realm.as_deref(), Some("Abyss"));
    }

    #[test]
    fn test_ungrouped_collection_entry() {
        let out = run(json!({ "creatures": { "Lone Wisp": { "type": "ethereal beings" } } }));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Lone Wisp");
        assert_eq!(out[0].kind.as_deref(), Some("Ethereal"));
        assert!(out[0].source.group.is_none());
        assert!(out[0].region.is_none());
    }

    #[test]
    fn test_region_first_needle_wins() {
        let mut synonyms = Synonyms::new();
        synonyms.insert("region", "court", "Courts");
        synonyms.insert("region", "northern court", "Northern Courts");
        let ctx = NormalizeContext::new(&synonyms, "x.json");
        let out = normalize(&json!([{ "name": "Frost Sprite", "location": "edge of the northern court" }]), &ctx);
        assert_eq!(out[0].region.as_deref(), Some("Courts"));
    }

    #[test]
    fn test_realm_precedence() {
        let out = run(json!([
            { "name": "A", "realm": "dreamweave", "location": "abyss rim" },
            { "name": "B", "realm": "far shore", "location": "abyss rim" },
            { "name": "C", "realm": "far shore" },
            { "name": "D" }
        ]));
        let realms: Vec<_> = out.iter().map(|c| c.realm.as_deref()).collect();
        assert_eq!(
            realms,
            vec![Some("Dreaming Realm"), Some("Abyss"), Some("Far Shore"), None]
        );
    }

    #[test]
    fn test_attributes_and_danger() {
        let out = run(json!([{
            "name": "Shade Hound",
            "threat": "  Deadly at night ",
            "powers": "shadow meld",
            "diet": "fear",
            "weaknesses": ["sunlight"],
            "notes": ""
        }]));
        let hound = &out[0];
        assert_eq!(hound.danger_level.as_deref(), Some("Deadly at night"));
        assert_eq!(hound.abilities, vec!["shadow meld"]);
        let attrs = hound.attributes.as_ref().unwrap();
        assert_eq!(attrs["diet"], json!("fear"));
        assert_eq!(attrs["weaknesses"], json!(["sunlight"]));
        assert!(!attrs.contains_key("notes"));
        assert!(!attrs.contains_key("name"));
    }

    #[test]
    fn test_losing_alternates_land_in_attributes() {
        let out = run(json!([{
            "name": "Shade Hound",
            "type": "predatory beasts",
            "species": "Umbral Hound",
            "location": "wraithwood",
            "habitat": "deep thickets",
            "danger_level": "high",
            "threat": "pack hunter"
        }]));
        let hound = &out[0];
        assert_eq!(hound.kind.as_deref(), Some("Beast"));
        assert_eq!(hound.danger_level.as_deref(), Some("high"));
        let attrs = hound.attributes.as_ref().unwrap();
        assert_eq!(attrs["species"], json!("Umbral Hound"));
        assert_eq!(attrs["habitat"], json!("deep thickets"));
        assert_eq!(attrs["threat"], json!("pack hunter"));
        assert!(!attrs.contains_key("type"));
    }
}
