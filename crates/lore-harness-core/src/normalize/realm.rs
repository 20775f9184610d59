//! Realm normalization.

use serde_json::Value;

use super::{record_name, NormalizeContext, Overflow};
use crate::category::Category;
use crate::entity::Realm;
use crate::shape::{
    classify, first_present, is_truthy, keyed_records, list_records, shadowed_alternates, RawRecord,
    RawShape,
};
use crate::text::{clean, clean_list, derive_id};

const COLLECTION_KEYS: &[&str] = &["realms", "Realms"];

const RECOGNIZED: &[&str] = &[
    "name",
    "description",
    "domains",
    "ruler",
    "sovereign",
    "god_king",
    "capital",
    "factions",
    "courts",
    "notable_locations",
    "landmarks",
];

const RULER_KEYS: &[&str] = &["ruler", "sovereign", "god_king"];
const FACTION_KEYS: &[&str] = &["factions", "courts"];
const LOCATION_KEYS: &[&str] = &["notable_locations", "landmarks"];

pub fn normalize(doc: &Value, ctx: &NormalizeContext) -> Vec<Realm> {
    let records = match classify(doc, COLLECTION_KEYS) {
        RawShape::CollectionList { items, .. } | RawShape::BareList(items) => {
            list_records(items, None)
        }
        RawShape::CollectionMap { entries, .. } => keyed_records(entries, None),
        RawShape::BareObject(body) if body.get("name").is_some_and(is_truthy) => {
            vec![RawRecord::single(body)]
        }
        _ => Vec::new(),
    };
    records.iter().map(|r| normalize_record(r, ctx)).collect()
}

/// The name is canonicalized before the id is derived, so `"the abyss"`
/// and `"Abyss"` both land on id `abyss`.
pub fn normalize_record(record: &RawRecord, ctx: &NormalizeContext) -> Realm {
    let body = record.body;
    let name = ctx
        .synonyms
        .canonicalize("name", &record_name(record, &["name"]), true);

    let list = |keys: &[&str]| first_present(body, keys).and_then(clean_list);
    let shadowed = shadowed_alternates(body, &[RULER_KEYS, FACTION_KEYS, LOCATION_KEYS]);
    let (notes, attributes) = Overflow::collect(body, |key, _| {
        RECOGNIZED.contains(&key) && !shadowed.contains(&key)
    })
    .into_parts();

    Realm {
        id: derive_id(&name),
        description: clean(record.get("description")),
        domains: clean_list(record.get("domains")).unwrap_or_default(),
        ruler: first_present(body, RULER_KEYS).and_then(clean),
        capital: clean(record.get("capital")),
        factions: list(FACTION_KEYS),
        notable_locations: list(LOCATION_KEYS),
        notes,
        attributes,
        source: ctx.source(Category::Realms, None),
        name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synonyms::Synonyms;
    use serde_json::json;

    fn run(doc: Value) -> Vec<Realm> {
        let synonyms = Synonyms::defaults_for(Category::Realms);
        let ctx = NormalizeContext::new(&synonyms, "lore/realms/realms.json");
        normalize(&doc, &ctx)
    }

    #[test]
    fn test_canonical_name_drives_id() {
        let out = run(json!({ "Realms": [ { "name": "THE ABYSS" }, { "name": "silver marches" } ] }));
        assert_eq!(out[0].name, "Abyss");
        assert_eq!(out[0].id, "abyss");
        assert_eq!(out[1].name, "Silver Marches");
        assert_eq!(out[1].id, "silver_marches");
    }

    #[test]
    fn test_first_present_alternatives() {
        let out = run(json!({
            "name": "Ignisyr",
            "sovereign": "The Ember King",
            "god_king": "Vaelor the Undying",
            "courts": ["Ash Court"],
            "landmarks": "Cinder Spire"
        }));
        let realm = &out[0];
        assert_eq!(realm.ruler.as_deref(), Some("The Ember King"));
        assert_eq!(realm.factions.as_deref(), Some(&["Ash Court".to_string()][..]));
        assert_eq!(
            realm.notable_locations.as_deref(),
            Some(&["Cinder Spire".to_string()][..])
        );
        assert!(realm.source.group.is_none());
        assert_eq!(
            realm.notes.as_deref(),
            Some(&["god_king: Vaelor the Undying".to_string()][..])
        );
    }

    #[test]
    fn test_losing_alternates_are_kept() {
        let out = run(json!({
            "name": "Ignisyr",
            "ruler": "The Ember King",
            "god_king": "Vaelor the Undying",
            "factions": ["Ash Court"],
            "courts": ["Cinder Court"]
        }));
        let realm = &out[0];
        assert_eq!(realm.ruler.as_deref(), Some("The Ember King"));
        assert_eq!(
            realm.notes.as_deref(),
            Some(&["god_king: Vaelor the Undying".to_string()][..])
        );
        assert_eq!(
            realm.attributes.as_ref().unwrap()["courts"],
            json!(["Cinder Court"])
        );
    }

    #[test]
    fn test_overflow_notes_and_attributes() {
        let out = run(json!([{
            "name": "Elarion",
            "climate": "temperate",
            "seasons": { "winter": "long" },
            "factions": []
        }]));
        let realm = &out[0];
        assert_eq!(realm.notes.as_deref(), Some(&["climate: temperate".to_string()][..]));
        assert_eq!(realm.attributes.as_ref().unwrap()["seasons"], json!({ "winter": "long" }));
        assert!(realm.factions.is_none());
    }

    #[test]
    fn test_keyed_collection_and_unnamed_object() {
        let out = run(json!({ "realms": { "elysion": { "capital": "Lumen" } } }));
        assert_eq!(out[0].name, "Elysion");
        assert_eq!(out[0].capital.as_deref(), Some("Lumen"));

        assert!(run(json!({ "capital": "Lumen" })).is_empty());
    }
}
