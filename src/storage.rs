//! Filesystem layout for lore documents.
//!
//! | Path | Content |
//! |------|---------|
//! | `<root>/<category>/*.json` | raw documents |
//! | `<root>/<category>/formatted/*.json` | canonical entity files |
//! | `<root>/<category>/formatted/_index.json` | per-category index |
//! | `<root>/<category>/archive/*.json` | originals kept by legacy migration |
//! | `<root>/<category>_index.json` | index written by master generation |
//! | `<root>/masterindex.json` | master index and crosslinks |
//! | `<root>/creature_regions.json` | creature region bundles |
//!
//! JSON is written pretty-printed with non-ASCII text kept as-is. A write
//! whose bytes match the file on disk (by SHA-256) leaves the file alone.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use lore_harness_core::text::safe_filename;
use lore_harness_core::Category;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;

/// Outcome of [`LoreStore::write_json`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct LoreStore {
    root: PathBuf,
}

impl LoreStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.lore.root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(category.as_str())
    }

    pub fn formatted_dir(&self, category: Category) -> PathBuf {
        self.category_dir(category).join("formatted")
    }

    pub fn archive_dir(&self, category: Category) -> PathBuf {
        self.category_dir(category).join("archive")
    }

    /// `<category>/formatted/_index.json`
    pub fn formatted_index_path(&self, category: Category) -> PathBuf {
        self.formatted_dir(category).join("_index.json")
    }

    /// `<root>/<category>_index.json`
    pub fn category_index_path(&self, category: Category) -> PathBuf {
        self.root.join(format!("{}_index.json", category))
    }

    pub fn master_index_path(&self) -> PathBuf {
        self.root.join("masterindex.json")
    }

    pub fn regions_path(&self) -> PathBuf {
        self.root.join("creature_regions.json")
    }

    /// File an entity named `name` is written to.
    pub fn entity_path(&self, category: Category, name: &str) -> PathBuf {
        self.formatted_dir(category)
            .join(format!("{}.json", safe_filename(name)))
    }

    pub fn raw_files(&self, category: Category) -> Result<Vec<PathBuf>> {
        list_documents(&self.category_dir(category))
    }

    pub fn formatted_files(&self, category: Category) -> Result<Vec<PathBuf>> {
        list_documents(&self.formatted_dir(category))
    }

    /// `path` relative to the store root, with `/` separators.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Resolve a root-relative path recorded in a document. Absolute paths
    /// and paths escaping the root resolve to `None`.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let rel = Path::new(relative);
        let inside = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        (inside && !relative.is_empty()).then(|| self.root.join(rel))
    }

    pub fn read_json(&self, path: &Path) -> Result<Value> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
    }

    /// Write `value` as pretty JSON, creating parent directories.
    pub fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<WriteStatus> {
        let mut bytes = serde_json::to_vec_pretty(value)
            .with_context(|| format!("Failed to serialize {}", path.display()))?;
        bytes.push(b'\n');

        let status = match std::fs::read(path) {
            Ok(existing) if digest(&existing) == digest(&bytes) => return Ok(WriteStatus::Unchanged),
            Ok(_) => WriteStatus::Updated,
            Err(_) => WriteStatus::Created,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(status)
    }

    /// First formatted file whose `name` equals `name` exactly.
    pub fn find_by_name(&self, category: Category, name: &str) -> Result<Option<PathBuf>> {
        self.find_formatted(category, |doc| {
            doc.get("name").and_then(Value::as_str) == Some(name)
        })
        .map(|hit| hit.map(|(path, _)| path))
    }

    /// Formatted entity whose `id` equals `id`.
    pub fn read_entity(&self, category: Category, id: &str) -> Result<Option<(PathBuf, Value)>> {
        self.find_formatted(category, |doc| doc.get("id").and_then(Value::as_str) == Some(id))
    }

    fn find_formatted(
        &self,
        category: Category,
        matches: impl Fn(&Value) -> bool,
    ) -> Result<Option<(PathBuf, Value)>> {
        for path in self.formatted_files(category)? {
            match self.read_json(&path) {
                Ok(doc) if matches(&doc) => return Ok(Some((path, doc))),
                Ok(_) => {}
                Err(e) => tracing::debug!(file = %path.display(), error = %e, "skipping unreadable entity"),
            }
        }
        Ok(None)
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Sorted `*.json` files directly inside `dir`, without index files.
/// A missing directory lists as empty.
fn list_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let include = build_globset(&["*.json"])?;
    let exclude = build_globset(&["_*", "*_index.json"])?;

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if include.is_match(name.as_ref()) && !exclude.is_match(name.as_ref()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, LoreStore) {
        let tmp = TempDir::new().unwrap();
        let store = LoreStore::new(tmp.path());
        (tmp, store)
    }

    #[test]
    fn test_write_json_statuses() {
        let (_tmp, store) = store();
        let path = store.entity_path(Category::Characters, "Lyra");
        let doc = json!({ "id": "lyra", "name": "Lyra" });
        assert_eq!(store.write_json(&path, &doc).unwrap(), WriteStatus::Created);
        assert_eq!(store.write_json(&path, &doc).unwrap(), WriteStatus::Unchanged);
        let changed = json!({ "id": "lyra", "name": "Lyra", "role": "Seer" });
        assert_eq!(store.write_json(&path, &changed).unwrap(), WriteStatus::Updated);
    }

    #[test]
    fn test_write_json_keeps_non_ascii() {
        let (_tmp, store) = store();
        let path = store.root().join("x.json");
        store.write_json(&path, &json!({ "name": "Éowyn" })).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Éowyn"));
        assert!(text.contains("\n  \"name\""));
    }

    #[test]
    fn test_listing_skips_index_files() {
        let (_tmp, store) = store();
        let dir = store.formatted_dir(Category::Plots);
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["b.json", "a.json", "_index.json", "plots_index.json", "notes.txt"] {
            std::fs::write(dir.join(name), "{}").unwrap();
        }
        let files: Vec<String> = store
            .formatted_files(Category::Plots)
            .unwrap()
            .iter()
            .map(|p| store.relative(p))
            .collect();
        assert_eq!(files, vec!["plots/formatted/a.json", "plots/formatted/b.json"]);
        assert!(store.raw_files(Category::Magic).unwrap().is_empty());
    }

    #[test]
    fn test_find_by_name_and_id() {
        let (_tmp, store) = store();
        let path = store.entity_path(Category::Realms, "The Abyss");
        store
            .write_json(&path, &json!({ "id": "abyss", "name": "Abyss" }))
            .unwrap();
        assert_eq!(store.find_by_name(Category::Realms, "Abyss").unwrap(), Some(path.clone()));
        assert!(store.find_by_name(Category::Realms, "abyss").unwrap().is_none());
        let (found, doc) = store.read_entity(Category::Realms, "abyss").unwrap().unwrap();
        assert_eq!(found, path);
        assert_eq!(doc["name"], "Abyss");
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let (_tmp, store) = store();
        assert!(store.resolve("characters/formatted/Lyra.json").is_some());
        assert!(store.resolve("../etc/passwd").is_none());
        assert!(store.resolve("/etc/passwd").is_none());
        assert!(store.resolve("").is_none());
    }
}
