//! Batch normalization driver.
//!
//! Reads raw documents of one category, normalizes each into canonical
//! entities, and writes one file per entity plus the category's
//! `formatted/_index.json`. A file that cannot be read or parsed, or that
//! is a migration stub, is reported as [`Skipped`] and the batch goes on.
//! Write failures abort the batch.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use lore_harness_core::normalize::{normalize_document, NormalizeContext};
use lore_harness_core::shape::is_migration_stub;
use lore_harness_core::synonyms::Synonyms;
use lore_harness_core::{Category, Entity};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::indexing::write_formatted_index;
use crate::storage::{LoreStore, WriteStatus};

#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// Explicit raw files. Empty means every raw file of the category.
    pub inputs: Vec<PathBuf>,
    /// Also write `{"<category>": [entities...]}` to this file.
    pub output: Option<PathBuf>,
    pub dry_run: bool,
}

/// A raw file left out of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skipped {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteTally {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl WriteTally {
    pub fn record(&mut self, status: WriteStatus) {
        match status {
            WriteStatus::Created => self.created += 1,
            WriteStatus::Updated => self.updated += 1,
            WriteStatus::Unchanged => self.unchanged += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizeReport {
    pub category: Category,
    pub dry_run: bool,
    pub files_read: usize,
    pub entities: usize,
    #[serde(flatten)]
    pub writes: WriteTally,
    pub skipped: Vec<Skipped>,
}

/// Skip reason for raw files already replaced by a migration stub.
pub const MIGRATED_STUB: &str = "migrated stub";

/// Result of normalizing one raw file.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Normalized(Vec<Entity>),
    Skipped(Skipped),
}

/// Built-in synonym tables for a category merged with the configured
/// override files. Missing override files are ignored with a warning.
pub fn load_synonyms(config: &Config, category: Category) -> Result<Synonyms> {
    let mut synonyms = Synonyms::defaults_for(category);
    for path in config.synonym_files(category) {
        if !path.exists() {
            warn!(file = %path.display(), "synonym override file not found");
            continue;
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read synonyms: {}", path.display()))?;
        let overrides: Value = serde_json::from_str(&content)
            .with_context(|| format!("Invalid synonyms JSON: {}", path.display()))?;
        let merged = synonyms.merge_overrides(&overrides);
        info!(file = %path.display(), %category, merged, "merged synonym overrides");
    }
    Ok(synonyms)
}

/// Normalize one raw file. `label` is recorded as `source.file`.
pub fn normalize_file(category: Category, path: &Path, label: &str, synonyms: &Synonyms) -> FileOutcome {
    let skip = |reason: String| {
        FileOutcome::Skipped(Skipped {
            file: label.to_string(),
            reason,
        })
    };

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => return skip(format!("unreadable: {}", e)),
    };
    let doc: Value = match serde_json::from_str(&content) {
        Ok(doc) => doc,
        Err(e) => return skip(format!("invalid JSON: {}", e)),
    };
    if is_migration_stub(&doc) {
        return skip(MIGRATED_STUB.to_string());
    }

    let ctx = NormalizeContext::new(synonyms, label);
    let entities = normalize_document(category, &doc, &ctx);
    if entities.is_empty() {
        return skip("no entities recognized".to_string());
    }
    FileOutcome::Normalized(entities)
}

/// Write entities one per file. When two entities share a file name the
/// later one wins.
pub fn write_entities(store: &LoreStore, category: Category, entities: &[Entity]) -> Result<WriteTally> {
    let mut by_path: IndexMap<PathBuf, &Entity> = IndexMap::new();
    for entity in entities {
        let path = store.entity_path(category, entity.name());
        if let Some(previous) = by_path.insert(path.clone(), entity) {
            warn!(
                file = %store.relative(&path),
                first = previous.source().file.as_str(),
                second = entity.source().file.as_str(),
                "entity file name collision, keeping the later entity"
            );
        }
    }

    let mut tally = WriteTally::default();
    for (path, entity) in by_path {
        tally.record(store.write_json(&path, entity)?);
    }
    Ok(tally)
}

pub fn normalize_category(
    store: &LoreStore,
    category: Category,
    synonyms: &Synonyms,
    options: &NormalizeOptions,
) -> Result<NormalizeReport> {
    let files = if options.inputs.is_empty() {
        store.raw_files(category)?
    } else {
        options.inputs.clone()
    };

    let mut entities = Vec::new();
    let mut skipped = Vec::new();
    for path in &files {
        let label = store.relative(path);
        match normalize_file(category, path, &label, synonyms) {
            FileOutcome::Normalized(found) => entities.extend(found),
            FileOutcome::Skipped(skip) => {
                warn!(file = skip.file.as_str(), reason = skip.reason.as_str(), "skipping raw file");
                skipped.push(skip);
            }
        }
    }

    let mut writes = WriteTally::default();
    if !options.dry_run {
        writes = write_entities(store, category, &entities)?;
        write_formatted_index(store, category)?;
        if let Some(output) = &options.output {
            write_combined(store, category, &entities, output)?;
        }
    }

    let report = NormalizeReport {
        category,
        dry_run: options.dry_run,
        files_read: files.len(),
        entities: entities.len(),
        writes,
        skipped,
    };
    info!(
        %category,
        files = report.files_read,
        entities = report.entities,
        created = report.writes.created,
        updated = report.writes.updated,
        skipped = report.skipped.len(),
        "normalized category"
    );
    Ok(report)
}

fn write_combined(store: &LoreStore, category: Category, entities: &[Entity], output: &Path) -> Result<()> {
    let list = entities
        .iter()
        .map(Entity::to_value)
        .collect::<serde_json::Result<Vec<_>>>()?;
    let mut doc = Map::new();
    doc.insert(category.to_string(), Value::Array(list));
    store.write_json(output, &doc)?;
    Ok(())
}
