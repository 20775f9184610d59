//! Fuzzy search and crosslink lookup over the persisted indexes.

use anyhow::{bail, Result};
use indexmap::IndexMap;
use lore_harness_core::fuzzy::{resolve_related, search, Related};
use lore_harness_core::index::{Crosslinks, IndexEntry, MasterIndex};
use lore_harness_core::Category;

use crate::storage::LoreStore;

/// Every `<category>_index.json`; a missing file is an empty index.
pub fn load_indexes(store: &LoreStore) -> Result<IndexMap<Category, Vec<IndexEntry>>> {
    let mut indexes = IndexMap::new();
    for category in Category::ALL {
        let path = store.category_index_path(category);
        let entries = if path.exists() {
            serde_json::from_value(store.read_json(&path)?)?
        } else {
            Vec::new()
        };
        indexes.insert(category, entries);
    }
    Ok(indexes)
}

/// Crosslinks from `masterindex.json`, empty when it does not exist yet.
pub fn load_crosslinks(store: &LoreStore) -> Result<Crosslinks> {
    let path = store.master_index_path();
    if !path.exists() {
        return Ok(Crosslinks::new());
    }
    let master: MasterIndex = serde_json::from_value(store.read_json(&path)?)?;
    Ok(master.crosslinks)
}

pub fn run_search(store: &LoreStore, term: &str) -> Result<Vec<IndexEntry>> {
    let term = term.trim();
    if term.is_empty() {
        bail!("search term must not be empty");
    }
    Ok(search(term, &load_indexes(store)?))
}

pub fn run_related(store: &LoreStore, name: &str) -> Result<Related> {
    let name = name.trim();
    if name.is_empty() {
        bail!("name must not be empty");
    }
    Ok(resolve_related(name, &load_crosslinks(store)?))
}
