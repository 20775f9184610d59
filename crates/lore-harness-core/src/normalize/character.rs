//! Character normalization.
//!
//! Besides flat fields, a character carries four nested substructures
//! (appearance, personality, lineage, prophecy), each with a fixed key
//! vocabulary. Substructure keys are matched after [`canonicalize_key`]
//! folding; anything outside the vocabulary goes to that substructure's own
//! `notes`.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::{non_empty, record_name, NormalizeContext, Overflow};
use crate::category::Category;
use crate::entity::{Ability, Appearance, Character, Lineage, Personality, Prophecy, TextOrList};
use crate::shape::{
    classify, first_present, grouped_records, is_truthy, list_records, shadowed_alternates, RawRecord,
    RawShape,
};
use crate::text::{as_list, canonicalize_key, clean, clean_list, clean_str, derive_id};

const COLLECTION_KEYS: &[&str] = &["characters"];

const RELATIONSHIP_PREFIX: &str = "relationship_";

/// Top-level keys consumed by dedicated fields.
const FLAT_KEYS: &[&str] = &[
    "name",
    "title",
    "titles",
    "species",
    "gender",
    "age",
    "realm",
    "court",
    "affiliations",
    "domain",
    "domains",
    "role_in_cosmic_order",
    "role",
    "abilities",
];

const TITLE_KEYS: &[&str] = &["title", "titles"];
const DOMAIN_KEYS: &[&str] = &["domain", "domains"];
const ROLE_KEYS: &[&str] = &["role_in_cosmic_order", "role"];

/// Top-level keys holding substructures. Consumed only when they hold an
/// object (or nothing); other values fall through to overflow.
const NESTED_KEYS: &[&str] = &["appearance", "personality", "lineage", "prophecy", "relationships"];

const APPEARANCE_KEYS: &[&str] = &[
    "height",
    "build",
    "skin",
    "hair",
    "eyes",
    "wings",
    "attire",
    "distinctive_features",
    "marks",
];

const LINEAGE_KEYS: &[&str] = &[
    "father", "mother", "siblings", "consorts", "essence", "type", "origin", "status", "role",
];

pub fn normalize(doc: &Value, ctx: &NormalizeContext) -> Vec<Character> {
    let records = match classify(doc, COLLECTION_KEYS) {
        RawShape::CollectionList { items, .. } | RawShape::BareList(items) => {
            list_records(items, None)
        }
        RawShape::CollectionMap { entries, .. } => grouped_records(entries),
        RawShape::BareObject(body) if body.get("name").is_some_and(is_truthy) => {
            vec![RawRecord::single(body)]
        }
        _ => Vec::new(),
    };
    records.iter().map(|r| normalize_record(r, ctx)).collect()
}

pub fn normalize_record(record: &RawRecord, ctx: &NormalizeContext) -> Character {
    let body = record.body;
    let name = record_name(record, &["name"]);
    let synonyms = ctx.synonyms;

    let titles = first_present(body, TITLE_KEYS)
        .and_then(clean_list)
        .unwrap_or_default();
    let domains = first_present(body, DOMAIN_KEYS)
        .and_then(clean_list)
        .unwrap_or_default();
    let role = first_present(body, ROLE_KEYS).and_then(clean);

    let species = clean(record.get("species")).map(|s| synonyms.canonicalize("species", &s, false));
    let realm = clean(record.get("realm")).map(|s| synonyms.canonicalize("realm", &s, true));
    let court = clean(record.get("court")).map(|s| synonyms.canonicalize("court", &s, true));

    let shadowed = shadowed_alternates(body, &[TITLE_KEYS, DOMAIN_KEYS, ROLE_KEYS]);
    let overflow = Overflow::collect(body, |key, value| {
        (FLAT_KEYS.contains(&key) && !shadowed.contains(&key))
            || is_relationship_key(key)
            || (NESTED_KEYS.contains(&key) && (value.is_object() || value.is_null()))
    });
    let (notes, attributes) = overflow.into_parts();

    Character {
        id: derive_id(&name),
        titles,
        species,
        gender: clean(record.get("gender")),
        age: clean(record.get("age")),
        realm,
        court,
        affiliations: clean_list(record.get("affiliations")),
        domains,
        role,
        appearance: record.get("appearance").as_object().map(appearance).unwrap_or_default(),
        personality: record.get("personality").as_object().map(personality).unwrap_or_default(),
        lineage: record.get("lineage").as_object().map(lineage).unwrap_or_default(),
        prophecy: record.get("prophecy").as_object().map(prophecy).unwrap_or_default(),
        abilities: abilities(record.get("abilities")),
        relationships: relationships(body),
        notes,
        attributes,
        source: ctx.source(Category::Characters, record.group),
        name,
    }
}

fn is_relationship_key(key: &str) -> bool {
    key.get(..RELATIONSHIP_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(RELATIONSHIP_PREFIX))
}

/// `"label: value"` for a substructure note, if both sides survive cleaning.
fn labeled(key: &str, value: &Value) -> Option<String> {
    Some(format!("{}: {}", clean_str(key)?, clean(value)?))
}

fn appearance(raw: &Map<String, Value>) -> Appearance {
    let mut out = Appearance::default();
    let mut notes = Vec::new();
    for (key, value) in raw {
        let folded = canonicalize_key(key);
        if APPEARANCE_KEYS.contains(&folded.as_str()) {
            if let Some(text) = clean(value) {
                out.fields.insert(folded, text);
            }
        } else {
            notes.extend(labeled(key, value));
        }
    }
    out.notes = non_empty(notes);
    out
}

fn personality(raw: &Map<String, Value>) -> Personality {
    let mut traits = Vec::new();
    let mut flaws = Vec::new();
    let mut virtues = Vec::new();
    let mut extra = Vec::new();
    let mut temperament = None;

    for (key, value) in raw {
        let cleaned = || clean_list(value).unwrap_or_default();
        match canonicalize_key(key).as_str() {
            "traits" => traits.extend(cleaned()),
            "flaws" | "weaknesses" => flaws.extend(cleaned()),
            "virtues" | "strengths" => virtues.extend(cleaned()),
            "temperament" => temperament = clean(value),
            _ => {
                if let (Some(label), Some(text)) = (clean_str(key), clean(value)) {
                    extra.push(format!("{}: {}", label.replace('_', " "), text));
                }
            }
        }
    }
    traits.extend(extra);

    Personality {
        traits: non_empty(traits),
        temperament,
        flaws: non_empty(flaws),
        virtues: non_empty(virtues),
    }
}

fn lineage(raw: &Map<String, Value>) -> Lineage {
    let mut out = Lineage::default();
    let mut notes = Vec::new();
    for (key, value) in raw {
        let folded = canonicalize_key(key);
        if LINEAGE_KEYS.contains(&folded.as_str()) {
            let entry = match value {
                Value::Array(_) => clean_list(value).map(TextOrList::List),
                other => clean(other).map(TextOrList::Text),
            };
            if let Some(entry) = entry {
                out.fields.insert(folded, entry);
            }
        } else if let ("primordial", Value::Object(nested)) = (folded.as_str(), value) {
            out.primordial = Some(
                nested
                    .iter()
                    .map(|(k, v)| (k.clone(), clean(v)))
                    .collect(),
            );
        } else {
            notes.extend(labeled(key, value));
        }
    }
    out.notes = non_empty(notes);
    out
}

fn prophecy(raw: &Map<String, Value>) -> Prophecy {
    let mut out = Prophecy::default();
    let mut notes = Vec::new();
    for (key, value) in raw {
        match canonicalize_key(key).as_str() {
            "name" => out.name = clean(value),
            "description" => out.description = clean(value),
            "lore_fragment" => out.lore_fragment = clean(value),
            "powers_foretold" => out.powers_foretold = clean_list(value),
            _ => notes.extend(labeled(key, value)),
        }
    }
    out.notes = non_empty(notes);
    out
}

/// Abilities as `name → {description, application}`, `name → text`, a
/// list of objects or names, or a single name.
fn abilities(raw: &Value) -> Vec<Ability> {
    match raw {
        Value::Object(entries) => entries
            .iter()
            .map(|(name, body)| match body {
                Value::Object(detail) => Ability {
                    name: clean_str(name),
                    description: detail.get("description").and_then(clean),
                    application: detail.get("application").and_then(clean),
                },
                text => Ability {
                    name: clean_str(name),
                    description: clean(text),
                    application: None,
                },
            })
            .collect(),
        Value::Null => Vec::new(),
        other => as_list(other)
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(detail) if detail.contains_key("name") => Some(Ability {
                    name: detail.get("name").and_then(clean),
                    description: detail.get("description").and_then(clean),
                    application: detail.get("application").and_then(clean),
                }),
                other => clean(other).map(|name| Ability {
                    name: Some(name),
                    description: None,
                    application: None,
                }),
            })
            .collect(),
    }
}

/// Explicit `relationships` entries first, then `relationship_<who>` keys.
/// On a label collision the later entry wins.
fn relationships(body: &Map<String, Value>) -> IndexMap<String, Option<String>> {
    let mut out = IndexMap::new();
    if let Some(Value::Object(explicit)) = body.get("relationships") {
        for (key, value) in explicit {
            if let Some(label) = clean_str(key) {
                out.insert(label, clean(value));
            }
        }
    }
    for (key, value) in body {
        if !is_relationship_key(key) {
            continue;
        }
        let suffix = &key[RELATIONSHIP_PREFIX.len()..];
        if let Some(label) = clean_str(&suffix.replace('_', " ")) {
            out.insert(label, clean(value));
        }
    }
    out
}
