//! Index generation over the store.
//!
//! [`build_category_index`] reads a category's formatted entity files when
//! there are any, otherwise its raw documents. [`generate_master_index`]
//! persists every category index, the master index with crosslinks, and
//! the creature region bundles.

use anyhow::Result;
use lore_harness_core::index::{
    crosslinks, entries_from_document, region_bundles, CategorySummary, IndexEntry, MasterIndex,
};
use lore_harness_core::shape::is_migration_stub;
use lore_harness_core::Category;
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

use crate::storage::LoreStore;

pub fn build_category_index(store: &LoreStore, category: Category) -> Result<Vec<IndexEntry>> {
    let formatted = store.formatted_files(category)?;
    let files = if formatted.is_empty() {
        store.raw_files(category)?
    } else {
        formatted
    };

    let mut entries = Vec::new();
    for path in &files {
        if let Some(doc) = read_document(store, path) {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            entries.extend(entries_from_document(category, &doc, &store.relative(path), &stem));
        }
    }
    Ok(entries)
}

/// Rewrite `formatted/_index.json` from the formatted files on disk.
pub fn write_formatted_index(store: &LoreStore, category: Category) -> Result<usize> {
    let mut entries = Vec::new();
    for path in store.formatted_files(category)? {
        if let Some(doc) = read_document(store, &path) {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            entries.extend(entries_from_document(category, &doc, &store.relative(&path), &stem));
        }
    }
    store.write_json(&store.formatted_index_path(category), &entries)?;
    Ok(entries.len())
}

/// Documents that fail to parse, and migration stubs, are left out.
fn read_document(store: &LoreStore, path: &Path) -> Option<Value> {
    match store.read_json(path) {
        Ok(doc) if is_migration_stub(&doc) => None,
        Ok(doc) => Some(doc),
        Err(e) => {
            warn!(file = %store.relative(path), error = %format!("{:#}", e), "skipping document in index");
            None
        }
    }
}

pub fn generate_master_index(store: &LoreStore) -> Result<MasterIndex> {
    let mut master = MasterIndex::default();
    let mut all_entries = Vec::new();

    for category in Category::ALL {
        let entries = build_category_index(store, category)?;
        let path = store.category_index_path(category);
        store.write_json(&path, &entries)?;
        master.categories.insert(
            category,
            CategorySummary {
                index_file: store.relative(&path),
                entry_count: entries.len(),
            },
        );
        all_entries.extend(entries);
    }

    master.crosslinks = crosslinks(&all_entries);
    store.write_json(&store.master_index_path(), &master)?;

    let regions = region_bundles(all_entries.iter().filter(|e| e.category == Category::Creatures));
    store.write_json(&store.regions_path(), &regions)?;

    info!(
        entries = all_entries.len(),
        crosslinks = master.crosslinks.len(),
        regions = regions.len(),
        "generated master index"
    );
    Ok(master)
}
