//! Index projection, crosslinks, and creature region bundles.
//!
//! An [`IndexEntry`] is a compact projection of one entity: identity plus a
//! small per-category set of fields ([`projection`]). Entries are built
//! either from canonical entities or from persisted documents of any shape
//! ([`entries_from_document`]).
//!
//! Crosslinks record names that recur across the combined entries of all
//! categories. Same-category repeats count too, so a name duplicated inside
//! one category is also crosslinked.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::category::Category;
use crate::entity::Entity;
use crate::text::value_to_text;

/// One row of a category index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub category: Category,
    pub file: String,
    #[serde(flatten)]
    pub fields: IndexMap<String, Value>,
}

/// Projected fields per category. List fields default to `[]`, scalars to
/// `null`. `group` is read from `source.group`.
pub fn projection(category: Category) -> &'static [&'static str] {
    match category {
        Category::Characters => &["titles", "realm", "court", "domains"],
        Category::Creatures => &["kind", "location", "region", "realm", "danger_level", "group"],
        Category::Realms => &["domains", "ruler", "capital"],
        Category::Plots => &["summary", "status"],
        Category::Magic => &["type", "school"],
    }
}

const LIST_FIELDS: &[&str] = &["titles", "domains"];

impl IndexEntry {
    /// Project a document. `name` is taken from the document, else
    /// `fallback_name`.
    pub fn project(category: Category, doc: &Map<String, Value>, file: &str, fallback_name: &str) -> Self {
        let name = doc
            .get("name")
            .and_then(value_to_text)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| fallback_name.to_string());

        let mut fields = IndexMap::new();
        for field in projection(category) {
            let value = match *field {
                "group" => doc
                    .get("source")
                    .and_then(|source| source.get("group"))
                    .cloned(),
                other => doc.get(other).cloned(),
            };
            let value = match value {
                Some(Value::Null) | None if LIST_FIELDS.contains(field) => Value::Array(Vec::new()),
                Some(value) => value,
                None => Value::Null,
            };
            fields.insert(field.to_string(), value);
        }

        Self {
            id: doc.get("id").and_then(Value::as_str).map(str::to_string),
            name,
            category,
            file: file.to_string(),
            fields,
        }
    }

    pub fn from_entity(entity: &Entity, file: &str) -> serde_json::Result<Self> {
        let value = entity.to_value()?;
        let doc = value.as_object().cloned().unwrap_or_default();
        Ok(Self::project(entity.category(), &doc, file, entity.name()))
    }

    /// A projected field as text, if it is a string.
    pub fn field_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

/// Index entries for one persisted document.
///
/// A document holding a list under the category's own key yields one entry
/// per named item. Anything else is one entity, named by its `name` field or
/// by `stem`.
pub fn entries_from_document(category: Category, doc: &Value, file: &str, stem: &str) -> Vec<IndexEntry> {
    static EMPTY: std::sync::LazyLock<Map<String, Value>> = std::sync::LazyLock::new(Map::new);

    if let Some(Value::Array(items)) = doc.get(category.as_str()) {
        return items
            .iter()
            .filter_map(Value::as_object)
            .filter(|item| item.get("name").and_then(value_to_text).is_some_and(|n| !n.is_empty()))
            .map(|item| IndexEntry::project(category, item, file, stem))
            .collect();
    }
    let body = doc.as_object().unwrap_or(&EMPTY);
    vec![IndexEntry::project(category, body, file, stem)]
}

/// One occurrence of a crosslinked name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrosslinkRef {
    pub category: Category,
    pub file: String,
}

/// `name → occurrences`, only for names seen at least twice.
pub type Crosslinks = IndexMap<String, Vec<CrosslinkRef>>;

/// Group entries by exact name and keep names with two or more
/// occurrences. Occurrence order follows input order.
pub fn crosslinks<'a>(entries: impl IntoIterator<Item = &'a IndexEntry>) -> Crosslinks {
    let mut seen: Crosslinks = IndexMap::new();
    for entry in entries {
        seen.entry(entry.name.clone()).or_default().push(CrosslinkRef {
            category: entry.category,
            file: entry.file.clone(),
        });
    }
    seen.retain(|_, refs| refs.len() >= 2);
    seen
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub index_file: String,
    pub entry_count: usize,
}

/// The persisted `masterindex.json`: one summary per category plus the
/// crosslink table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterIndex {
    #[serde(flatten)]
    pub categories: IndexMap<Category, CategorySummary>,
    #[serde(default)]
    pub crosslinks: Crosslinks,
}

/// Coarse threat classification of free-text danger descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DangerBucket {
    Extreme,
    High,
    Moderate,
    Low,
    Unknown,
}

const DANGER_KEYWORDS: &[(DangerBucket, &[&str])] = &[
    (
        DangerBucket::Extreme,
        &["extreme", "catastrophic", "mythic", "apocalyptic", "godlike"],
    ),
    (
        DangerBucket::High,
        &["high", "deadly", "lethal", "dangerous", "severe"],
    ),
    (DangerBucket::Moderate, &["moderate", "medium", "unpredictable"]),
    (DangerBucket::Low, &["low", "harmless", "minimal", "benign", "docile"]),
];

/// Classify by case-insensitive substring match, buckets checked from
/// Extreme down to Low. This is a substring test, so `"extremely"` counts
/// as Extreme.
pub fn danger_bucket(text: Option<&str>) -> DangerBucket {
    let Some(text) = text else {
        return DangerBucket::Unknown;
    };
    let text = text.to_lowercase();
    DANGER_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(bucket, _)| *bucket)
        .unwrap_or(DangerBucket::Unknown)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionBundle {
    pub creatures: Vec<String>,
    pub danger: IndexMap<DangerBucket, usize>,
}

/// Group creature entries by region (`"Unknown"` when absent), counting
/// danger buckets per region.
pub fn region_bundles<'a>(entries: impl IntoIterator<Item = &'a IndexEntry>) -> IndexMap<String, RegionBundle> {
    let mut bundles: IndexMap<String, RegionBundle> = IndexMap::new();
    for entry in entries {
        let region = entry.field_str("region").unwrap_or("Unknown").to_string();
        let bundle = bundles.entry(region).or_default();
        bundle.creatures.push(entry.name.clone());
        *bundle
            .danger
            .entry(danger_bucket(entry.field_str("danger_level")))
            .or_default() += 1;
    }
    bundles
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: &str, category: Category, file: &str) -> IndexEntry {
        IndexEntry {
            id: None,
            name: name.to_string(),
            category,
            file: file.to_string(),
            fields: IndexMap::new(),
        }
    }

    #[test]
    fn test_project_character_defaults() {
        let doc = json!({ "id": "lyra", "name": "Lyra", "realm": "Elarion", "extra": 1 });
        let e = IndexEntry::project(Category::Characters, doc.as_object().unwrap(), "Lyra.json", "x");
        assert_eq!(e.id.as_deref(), Some("lyra"));
        assert_eq!(e.fields["titles"], json!([]));
        assert_eq!(e.fields["court"], Value::Null);
        assert_eq!(e.fields["realm"], json!("Elarion"));
        assert!(!e.fields.contains_key("extra"));
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            json!({
                "id": "lyra", "name": "Lyra", "category": "characters", "file": "Lyra.json",
                "titles": [], "realm": "Elarion", "court": null, "domains": []
            })
        );
    }

    #[test]
    fn test_project_creature_group_from_source() {
        let doc = json!({ "name": "Shade Hound", "source": { "group": "Wraithwood" } });
        let e = IndexEntry::project(Category::Creatures, doc.as_object().unwrap(), "f.json", "x");
        assert_eq!(e.field_str("group"), Some("Wraithwood"));
    }

    #[test]
    fn test_entries_from_collection_skip_unnamed() {
        let doc = json!({ "plots": [ { "name": "A" }, { "summary": "no name" }, { "name": "B" } ] });
        let entries = entries_from_document(Category::Plots, &doc, "plots.json", "plots");
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_entries_from_single_document_uses_stem() {
        let doc = json!({ "summary": "no name here" });
        let entries = entries_from_document(Category::Plots, &doc, "lore/plots/ashfall.json", "ashfall");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "ashfall");
        assert_eq!(entries[0].field_str("summary"), Some("no name here"));
    }

    #[test]
    fn test_crosslinks_across_categories_in_order() {
        let entries = vec![
            entry("Lyra", Category::Characters, "c/Lyra.json"),
            entry("Kael", Category::Characters, "c/Kael.json"),
            entry("Lyra", Category::Plots, "p/Lyra.json"),
        ];
        let links = crosslinks(&entries);
        assert_eq!(links.len(), 1);
        assert_eq!(
            links["Lyra"],
            vec![
                CrosslinkRef { category: Category::Characters, file: "c/Lyra.json".into() },
                CrosslinkRef { category: Category::Plots, file: "p/Lyra.json".into() },
            ]
        );
    }

    #[test]
    fn test_crosslinks_count_same_category_duplicates() {
        // Two entries of one category sharing a name are crosslinked to each
        // other. Kept as-is; callers that want cross-category links only can
        // filter on category.
        let entries = vec![
            entry("Ember", Category::Magic, "m/a.json"),
            entry("Ember", Category::Magic, "m/b.json"),
        ];
        let links = crosslinks(&entries);
        assert_eq!(links["Ember"].len(), 2);
    }

    #[test]
    fn test_danger_bucket_precedence() {
        assert_eq!(danger_bucket(Some("extremely high threat")), DangerBucket::Extreme);
        assert_eq!(danger_bucket(Some("Deadly at night")), DangerBucket::High);
        assert_eq!(danger_bucket(Some("unpredictable")), DangerBucket::Moderate);
        assert_eq!(danger_bucket(Some("mostly docile")), DangerBucket::Low);
        assert_eq!(danger_bucket(Some("varies")), DangerBucket::Unknown);
        assert_eq!(danger_bucket(None), DangerBucket::Unknown);
    }

    #[test]
    fn test_region_bundles() {
        let mut hound = entry("Shade Hound", Category::Creatures, "a.json");
        hound.fields.insert("region".into(), json!("Wraithwood"));
        hound.fields.insert("danger_level".into(), json!("deadly"));
        let mut moth = entry("Gloom Moth", Category::Creatures, "b.json");
        moth.fields.insert("region".into(), json!("Wraithwood"));
        moth.fields.insert("danger_level".into(), json!("harmless"));
        let wisp = entry("Wisp", Category::Creatures, "c.json");

        let bundles = region_bundles(&[hound, moth, wisp]);
        let wraithwood = &bundles["Wraithwood"];
        assert_eq!(wraithwood.creatures, vec!["Shade Hound", "Gloom Moth"]);
        assert_eq!(wraithwood.danger[&DangerBucket::High], 1);
        assert_eq!(wraithwood.danger[&DangerBucket::Low], 1);
        assert_eq!(bundles["Unknown"].danger[&DangerBucket::Unknown], 1);
    }

    #[test]
    fn test_master_index_round_trip_shape() {
        let mut master = MasterIndex::default();
        master.categories.insert(
            Category::Characters,
            CategorySummary { index_file: "characters_index.json".into(), entry_count: 2 },
        );
        let value = serde_json::to_value(&master).unwrap();
        assert_eq!(
            value,
            json!({
                "characters": { "index_file": "characters_index.json", "entry_count": 2 },
                "crosslinks": {}
            })
        );
        let back: MasterIndex = serde_json::from_value(value).unwrap();
        assert_eq!(back, master);
    }
}
