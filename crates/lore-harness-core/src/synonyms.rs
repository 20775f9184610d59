//! Synonym tables and canonicalization.
//!
//! A [`Synonyms`] value holds one flat `raw label → canonical label` table
//! per vocabulary axis (`species`, `realm`, `court`, `type`, `location`,
//! `region`, `name`). Each category starts from built-in defaults
//! ([`Synonyms::defaults_for`]) which an external override document can
//! extend ([`Synonyms::merge_overrides`]).
//!
//! Keys are stored lowercased; lookups lowercase and trim the probe, so
//! matching is case-insensitive while the canonical label keeps its case.
//!
//! The table is passed explicitly to normalizers through
//! [`NormalizeContext`](crate::normalize::NormalizeContext); nothing here is
//! global.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;

use crate::category::Category;
use crate::text::{title_case, value_to_text};

/// One vocabulary axis. Iteration order is insertion order, which matters
/// for substring containment matching ([`match_containing`]).
pub type SynonymTable = IndexMap<String, String>;

static EMPTY: LazyLock<SynonymTable> = LazyLock::new(SynonymTable::new);

const CHARACTER_SPECIES: &[(&str, &str)] = &[
    ("high fae", "Fae"),
    ("fae", "Fae"),
    ("faerie", "Fae"),
    ("dryads", "Dryad"),
    ("dryad", "Dryad"),
    ("dragon", "Dragon"),
    ("dragons", "Dragon"),
    ("dragonkin", "Dragon"),
    ("human", "Human"),
    ("mortal", "Human"),
    ("mortals", "Human"),
];

const CHARACTER_REALM: &[(&str, &str)] = &[
    ("elarion", "Elarion"),
    ("the abyss", "Abyss"),
    ("abyss", "Abyss"),
    ("dreaming realm", "Dreaming Realm"),
    ("dreamweave", "Dreaming Realm"),
    ("dream", "Dreaming Realm"),
];

const CHARACTER_COURT: &[(&str, &str)] = &[
    ("northern fae courts", "Northern Court"),
    ("northern court", "Northern Court"),
    ("southern court", "Southern Court"),
    ("shadow court", "Shadow Court"),
];

const CREATURE_TYPE: &[(&str, &str)] = &[
    ("ethereal beings", "Ethereal"),
    ("undead warriors", "Undead"),
    ("serpentine creatures", "Drake"),
    ("predatory beasts", "Beast"),
    ("tree-like guardians", "Treant"),
];

const CREATURE_LOCATION: &[(&str, &str)] = &[
    ("northern courts", "Northern Courts"),
    ("wraithwood", "Wraithwood Forest"),
    ("the abyss", "Abyss"),
    ("abyss", "Abyss"),
];

// Needles are matched by containment, most specific first.
const CREATURE_REGION: &[(&str, &str)] = &[
    ("northern court", "Northern Courts"),
    ("southern court", "Southern Courts"),
    ("shadow court", "Shadow Court"),
    ("wraithwood", "Wraithwood"),
    ("abyss", "Abyss"),
    ("dreamweave", "Dreaming Realm"),
    ("dreaming", "Dreaming Realm"),
    ("ignisyr", "Ignisyr"),
    ("elysion", "Elysion"),
    ("elarion", "Elarion"),
];

const CREATURE_REALM: &[(&str, &str)] = &[
    ("abyss", "Abyss"),
    ("dream", "Dreaming Realm"),
    ("ignisyr", "Ignisyr"),
    ("elysion", "Elysion"),
    ("elarion", "Elarion"),
    ("northern court", "Elarion"),
    ("southern court", "Elarion"),
    ("wraithwood", "Elarion"),
];

const REALM_NAME: &[(&str, &str)] = &[
    ("elarion", "Elarion"),
    ("the abyss", "Abyss"),
    ("abyss", "Abyss"),
    ("ignisyr", "Ignisyr"),
    ("elysion", "Elysion"),
];

/// Per-axis synonym tables for one normalization run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Synonyms {
    axes: IndexMap<String, SynonymTable>,
}

impl Synonyms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in tables for a category.
    pub fn defaults_for(category: Category) -> Self {
        let axes: &[(&str, &[(&str, &str)])] = match category {
            Category::Characters => &[
                ("species", CHARACTER_SPECIES),
                ("realm", CHARACTER_REALM),
                ("court", CHARACTER_COURT),
            ],
            Category::Creatures => &[
                ("type", CREATURE_TYPE),
                ("location", CREATURE_LOCATION),
                ("region", CREATURE_REGION),
                ("realm", CREATURE_REALM),
            ],
            Category::Realms => &[("name", REALM_NAME)],
            Category::Plots | Category::Magic => &[],
        };

        let mut synonyms = Self::new();
        for (axis, entries) in axes {
            for (raw, canonical) in *entries {
                synonyms.insert(axis, raw, canonical);
            }
        }
        synonyms
    }

    /// Add or replace one entry. The raw key is stored lowercased.
    pub fn insert(&mut self, axis: &str, raw: &str, canonical: &str) {
        self.axes
            .entry(axis.to_lowercase())
            .or_default()
            .insert(raw.to_lowercase(), canonical.to_string());
    }

    /// The table for an axis, or an empty table if the axis is unknown.
    pub fn table(&self, axis: &str) -> &SynonymTable {
        self.axes.get(axis).unwrap_or(&EMPTY)
    }

    pub fn axes(&self) -> impl Iterator<Item = &str> {
        self.axes.keys().map(String::as_str)
    }

    /// Merge an override document of the form
    /// `{ "<axis>": { "<raw>": "<canonical>", ... }, ... }`.
    ///
    /// Axis names and raw keys are folded to lowercase. Entries override or
    /// extend the existing tables; nothing is ever removed. Sections that are
    /// not objects are ignored. Returns the number of entries merged.
    pub fn merge_overrides(&mut self, overrides: &Value) -> usize {
        let Some(sections) = overrides.as_object() else {
            return 0;
        };
        let mut merged = 0;
        for (axis, table) in sections {
            let Some(table) = table.as_object() else {
                continue;
            };
            for (raw, canonical) in table {
                if let Some(canonical) = value_to_text(canonical) {
                    self.insert(axis, raw, &canonical);
                    merged += 1;
                }
            }
        }
        merged
    }

    /// Canonicalize `value` against the named axis. See [`canonicalize`].
    pub fn canonicalize(&self, axis: &str, value: &str, title_case: bool) -> String {
        canonicalize(value, self.table(axis), title_case)
    }
}

/// Map a raw label to its canonical form.
///
/// The probe is trimmed and lowercased before an exact lookup. On a miss
/// the value is returned unchanged, or title-cased when `title_case` is set.
///
/// ```
/// use lore_harness_core::synonyms::{canonicalize, SynonymTable};
///
/// let mut table = SynonymTable::new();
/// table.insert("high fae".into(), "Fae".into());
/// assert_eq!(canonicalize("HIGH FAE", &table, false), "Fae");
/// assert_eq!(canonicalize("unknown thing", &table, true), "Unknown Thing");
/// ```
pub fn canonicalize(value: &str, table: &SynonymTable, title_case_fallback: bool) -> String {
    let key = value.trim().to_lowercase();
    match table.get(&key) {
        Some(canonical) => canonical.clone(),
        None if title_case_fallback => title_case(value),
        None => value.to_string(),
    }
}

/// Find the first table entry whose key occurs inside `text`
/// (case-insensitive) and return its canonical label.
///
/// Table order decides ties: the first matching needle wins.
pub fn match_containing<'a>(text: &str, table: &'a SynonymTable) -> Option<&'a str> {
    let haystack = text.to_lowercase();
    table
        .iter()
        .find(|(needle, _)| !needle.is_empty() && haystack.contains(needle.as_str()))
        .map(|(_, canonical)| canonical.as_str())
}
