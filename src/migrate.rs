//! Legacy layout migration.
//!
//! Older lore trees kept every entity of a category inside a few large raw
//! documents. Migration splits each such document into formatted entity
//! files, keeps the original under `<category>/archive/`, and replaces the
//! raw file with a stub:
//!
//! ```json
//! { "_migrated": { "archived_to": "...", "formatted_dir": "...", "entity_count": 3 } }
//! ```
//!
//! Stubs are recognized on later runs and by the normalization driver, so
//! migrating twice is a no-op. Migration only ever runs when asked for.

use anyhow::{Context, Result};
use lore_harness_core::shape::MIGRATION_STUB_KEY;
use lore_harness_core::synonyms::Synonyms;
use lore_harness_core::Category;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::indexing::write_formatted_index;
use crate::pipeline::{normalize_file, write_entities, FileOutcome, Skipped, WriteTally, MIGRATED_STUB};
use crate::storage::LoreStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigratedFile {
    pub file: String,
    pub archived_to: String,
    pub entity_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    pub category: Category,
    pub dry_run: bool,
    pub migrated: Vec<MigratedFile>,
    pub already_migrated: usize,
    pub skipped: Vec<Skipped>,
    #[serde(flatten)]
    pub writes: WriteTally,
}

pub fn migrate_legacy_layout(
    store: &LoreStore,
    category: Category,
    synonyms: &Synonyms,
    dry_run: bool,
) -> Result<MigrationReport> {
    let mut report = MigrationReport {
        category,
        dry_run,
        migrated: Vec::new(),
        already_migrated: 0,
        skipped: Vec::new(),
        writes: WriteTally::default(),
    };

    for path in store.raw_files(category)? {
        let label = store.relative(&path);
        let entities = match normalize_file(category, &path, &label, synonyms) {
            FileOutcome::Normalized(entities) => entities,
            FileOutcome::Skipped(skip) if skip.reason == MIGRATED_STUB => {
                report.already_migrated += 1;
                continue;
            }
            FileOutcome::Skipped(skip) => {
                warn!(file = skip.file.as_str(), reason = skip.reason.as_str(), "not migrating");
                report.skipped.push(skip);
                continue;
            }
        };

        let file_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        let archive_path = store.archive_dir(category).join(file_name);
        let archived_to = store.relative(&archive_path);

        if !dry_run {
            let tally = write_entities(store, category, &entities)?;
            report.writes.created += tally.created;
            report.writes.updated += tally.updated;
            report.writes.unchanged += tally.unchanged;

            std::fs::create_dir_all(store.archive_dir(category))
                .with_context(|| format!("Failed to create archive dir for {}", category))?;
            std::fs::copy(&path, &archive_path)
                .with_context(|| format!("Failed to archive {}", label))?;

            let stub = json!({
                MIGRATION_STUB_KEY: {
                    "archived_to": archived_to,
                    "formatted_dir": store.relative(&store.formatted_dir(category)),
                    "entity_count": entities.len(),
                }
            });
            store.write_json(&path, &stub)?;
            info!(file = label.as_str(), entities = entities.len(), "migrated legacy document");
        }

        report.migrated.push(MigratedFile {
            file: label,
            archived_to,
            entity_count: entities.len(),
        });
    }

    if !dry_run && !report.migrated.is_empty() {
        write_formatted_index(store, category)?;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::TempDir;

    fn legacy_store() -> (TempDir, LoreStore) {
        let tmp = TempDir::new().unwrap();
        let store = LoreStore::new(tmp.path());
        let raw = store.category_dir(Category::Creatures).join("bestiary.json");
        std::fs::create_dir_all(raw.parent().unwrap()).unwrap();
        std::fs::write(
            &raw,
            r#"{ "creatures": { "Wraithwood": [ { "name": "Shade Hound" }, { "name": "Mire Wisp" } ] } }"#,
        )
        .unwrap();
        (tmp, store)
    }

    #[test]
    fn test_migration_splits_archives_and_stubs() {
        let (_tmp, store) = legacy_store();
        let synonyms = Synonyms::defaults_for(Category::Creatures);
        let report = migrate_legacy_layout(&store, Category::Creatures, &synonyms, false).unwrap();

        assert_eq!(report.migrated.len(), 1);
        assert_eq!(report.migrated[0].entity_count, 2);
        assert_eq!(report.migrated[0].archived_to, "creatures/archive/bestiary.json");
        assert_eq!(report.writes.created, 2);
        assert!(store.entity_path(Category::Creatures, "Shade Hound").exists());
        assert!(store.archive_dir(Category::Creatures).join("bestiary.json").exists());

        let stub: Value = store
            .read_json(&store.category_dir(Category::Creatures).join("bestiary.json"))
            .unwrap();
        assert_eq!(stub["_migrated"]["entity_count"], 2);
        assert_eq!(stub["_migrated"]["formatted_dir"], "creatures/formatted");

        let again = migrate_legacy_layout(&store, Category::Creatures, &synonyms, false).unwrap();
        assert!(again.migrated.is_empty());
        assert_eq!(again.already_migrated, 1);
    }

    #[test]
    fn test_dry_run_leaves_tree_alone() {
        let (_tmp, store) = legacy_store();
        let report = migrate_legacy_layout(&store, Category::Creatures, &Synonyms::new(), true).unwrap();
        assert_eq!(report.migrated[0].entity_count, 2);
        assert!(!store.archive_dir(Category::Creatures).exists());
        assert!(!store.formatted_dir(Category::Creatures).exists());
        let raw = store
            .read_json(&store.category_dir(Category::Creatures).join("bestiary.json"))
            .unwrap();
        assert!(raw.get("_migrated").is_none());
    }
}
