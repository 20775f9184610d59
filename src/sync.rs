//! Two-way sync between canonical entity files and a remote page store.
//!
//! Every operation works against a [`SyncTarget`]: the category's remote
//! database id and its field mapping. Preconditions (token, database id,
//! mapping file) fail the whole operation with a [`SyncError`]; a failure
//! on a single entity or page is recorded as an [`ItemFailure`] and the
//! batch continues. Local write failures abort the operation.
//!
//! Push and pull hold the category's lock in [`SyncLocks`] for their whole
//! run, so a scheduled pull and an on-demand push never write the same
//! category's files at the same time.

use anyhow::anyhow;
use lore_harness_core::mapping::{from_remote, get_by_path, set_by_path, FieldMapping, PropertyType};
use lore_harness_core::remote::{plan_schema, validate_schema as compare_schema, RemoteStore, SchemaReport};
use lore_harness_core::text::derive_id;
use lore_harness_core::Category;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::config::Config;
use crate::pipeline::WriteTally;
use crate::storage::LoreStore;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("missing API token: set the {0} environment variable")]
    MissingCredential(String),
    #[error("no remote database for {category}: set remote.databases.{category} or {env_var}")]
    MissingDatabaseId {
        category: Category,
        env_var: &'static str,
    },
    #[error("field mapping not found: {}", .0.display())]
    MissingMapping(PathBuf),
    #[error("invalid field mapping {}: {}", .path.display(), .message)]
    InvalidMapping { path: PathBuf, message: String },
    #[error("remote error: {0:#}")]
    Remote(anyhow::Error),
    #[error("local storage error: {0:#}")]
    Local(anyhow::Error),
}

impl SyncError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::MissingCredential(_) => "missing_credential",
            SyncError::MissingDatabaseId { .. } => "missing_database_id",
            SyncError::MissingMapping(_) => "missing_mapping",
            SyncError::InvalidMapping { .. } => "invalid_mapping",
            SyncError::Remote(_) => "remote_error",
            SyncError::Local(_) => "local_error",
        }
    }

    /// Whether the error is a configuration problem rather than a runtime
    /// failure.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, SyncError::Remote(_) | SyncError::Local(_))
    }
}

/// Per-category write locks shared by the scheduler and the HTTP server.
#[derive(Clone, Default)]
pub struct SyncLocks {
    locks: Arc<[Mutex<()>; 5]>,
}

impl SyncLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, category: Category) -> MutexGuard<'_, ()> {
        let slot = Category::ALL
            .iter()
            .position(|c| *c == category)
            .unwrap_or_default();
        self.locks[slot].lock().await
    }
}

/// Where and how one category syncs.
#[derive(Debug, Clone)]
pub struct SyncTarget {
    pub category: Category,
    pub database_id: String,
    pub mapping: FieldMapping,
    /// Remote title property used to match entities by name.
    pub title_property: String,
}

impl SyncTarget {
    /// Resolve the database id and load the mapping (`mapping_override`, else
    /// `<mappings.dir>/<category>.json`).
    pub fn resolve(config: &Config, category: Category, mapping_override: Option<&Path>) -> Result<Self, SyncError> {
        let database_id = config
            .remote
            .database_id(category)
            .ok_or(SyncError::MissingDatabaseId {
                category,
                env_var: category.database_env_var(),
            })?;
        let path = mapping_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.mapping_path(category));
        let mapping = load_mapping(&path)?;
        let title_property = mapping
            .title_property()
            .unwrap_or(config.remote.title_property.as_str())
            .to_string();
        Ok(Self {
            category,
            database_id,
            mapping,
            title_property,
        })
    }
}

pub fn load_mapping(path: &Path) -> Result<FieldMapping, SyncError> {
    if !path.exists() {
        return Err(SyncError::MissingMapping(path.to_path_buf()));
    }
    let invalid = |message: String| SyncError::InvalidMapping {
        path: path.to_path_buf(),
        message,
    };
    let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let doc: Value = serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;
    let mapping = FieldMapping::from_value(&doc).map_err(|e| invalid(format!("{:#}", e)))?;
    if mapping.is_empty() {
        return Err(invalid("mapping has no properties".to_string()));
    }
    Ok(mapping)
}

/// One entity or page that could not be synced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushReport {
    pub category: Category,
    pub created: usize,
    pub updated: usize,
    pub failed: Vec<ItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullReport {
    pub category: Category,
    pub pages: usize,
    pub written: usize,
    #[serde(flatten)]
    pub writes: WriteTally,
    pub failed: Vec<ItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaEnsureReport {
    pub category: Category,
    pub updated: bool,
    pub title_renamed: bool,
    pub added_properties: Vec<String>,
    pub existing_unchanged: Vec<String>,
    pub property_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaValidation {
    pub category: Category,
    pub consistent: bool,
    #[serde(flatten)]
    pub report: SchemaReport,
}

enum PushOutcome {
    Created,
    Updated,
}

/// Push every formatted entity: update the page whose title equals the
/// entity name, else create one.
pub async fn push(
    store: &LoreStore,
    remote: &dyn RemoteStore,
    target: &SyncTarget,
    locks: &SyncLocks,
) -> Result<PushReport, SyncError> {
    let _guard = locks.lock(target.category).await;
    let files = store.formatted_files(target.category).map_err(SyncError::Local)?;

    let mut report = PushReport {
        category: target.category,
        created: 0,
        updated: 0,
        failed: Vec::new(),
    };
    for path in &files {
        let label = store.relative(path);
        match push_entity(store, remote, target, path, &label).await {
            Ok(PushOutcome::Created) => report.created += 1,
            Ok(PushOutcome::Updated) => report.updated += 1,
            Err(e) => {
                let error = format!("{:#}", e);
                warn!(category = %target.category, item = label.as_str(), error = error.as_str(), "push failed");
                report.failed.push(ItemFailure { item: label, error });
            }
        }
    }

    info!(
        category = %target.category,
        created = report.created,
        updated = report.updated,
        failed = report.failed.len(),
        "push complete"
    );
    Ok(report)
}

async fn push_entity(
    store: &LoreStore,
    remote: &dyn RemoteStore,
    target: &SyncTarget,
    path: &Path,
    label: &str,
) -> anyhow::Result<PushOutcome> {
    let mut entity = store.read_json(path)?;
    let recorded = entity
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string);
    let name = match recorded {
        Some(name) => name,
        None => {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .filter(|stem| !stem.trim().is_empty())
                .ok_or_else(|| anyhow!("entity has no name"))?;
            set_by_path(&mut entity, "name", Value::String(stem.clone()));
            stem
        }
    };
    set_by_path(&mut entity, "source.file", Value::String(label.to_string()));
    set_by_path(&mut entity, "source.category", Value::String(target.category.to_string()));

    let properties = target.mapping.to_properties(&entity);
    let existing = remote
        .query_by_title(&target.database_id, &target.title_property, &name)
        .await?;
    match existing.first().and_then(|page| page.get("id")).and_then(Value::as_str) {
        Some(page_id) => {
            remote.update_page(page_id, &properties).await?;
            Ok(PushOutcome::Updated)
        }
        None => {
            remote.create_page(&target.database_id, &properties).await?;
            Ok(PushOutcome::Created)
        }
    }
}

/// Pull every remote page into local entity files, merging only mapped
/// fields into existing files.
pub async fn pull(
    store: &LoreStore,
    remote: &dyn RemoteStore,
    target: &SyncTarget,
    locks: &SyncLocks,
) -> Result<PullReport, SyncError> {
    let _guard = locks.lock(target.category).await;
    let mut report = PullReport {
        category: target.category,
        pages: 0,
        written: 0,
        writes: WriteTally::default(),
        failed: Vec::new(),
    };

    let mut cursor: Option<String> = None;
    loop {
        let batch = remote
            .list_pages(&target.database_id, cursor.as_deref())
            .await
            .map_err(SyncError::Remote)?;
        report.pages += batch.results.len();

        for page in &batch.results {
            let item = page
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("<no id>")
                .to_string();
            match merge_page(store, target, page) {
                Ok((path, doc)) => {
                    let status = store.write_json(&path, &doc).map_err(SyncError::Local)?;
                    report.writes.record(status);
                    report.written += 1;
                }
                Err(e) => {
                    let error = format!("{:#}", e);
                    warn!(category = %target.category, item = item.as_str(), error = error.as_str(), "pull failed");
                    report.failed.push(ItemFailure { item, error });
                }
            }
        }

        match batch.next_cursor {
            Some(next) if batch.has_more => cursor = Some(next),
            _ => break,
        }
    }

    info!(
        category = %target.category,
        pages = report.pages,
        written = report.written,
        failed = report.failed.len(),
        "pull complete"
    );
    Ok(report)
}

/// Destination file and merged document for one remote page.
fn merge_page(store: &LoreStore, target: &SyncTarget, page: &Value) -> anyhow::Result<(PathBuf, Value)> {
    let properties = page
        .get("properties")
        .filter(|p| p.is_object())
        .ok_or_else(|| anyhow!("page has no properties"))?;
    let pulled = target.mapping.from_properties(properties);

    let name = get_by_path(&pulled, "name")
        .cloned()
        .or_else(|| {
            properties
                .get(&target.title_property)
                .map(|prop| from_remote(PropertyType::Title, prop))
        })
        .and_then(|name| name.as_str().map(|n| n.trim().to_string()))
        .filter(|name| !name.is_empty())
        .ok_or_else(|| anyhow!("page has no name"))?;

    let recorded = get_by_path(&pulled, "source.file")
        .and_then(Value::as_str)
        .and_then(|rel| store.resolve(rel))
        .filter(|path| path.is_file());
    let path = match recorded {
        Some(path) => path,
        None => match store.find_by_name(target.category, &name)? {
            Some(path) => path,
            None => store.entity_path(target.category, &name),
        },
    };

    let mut doc = if path.is_file() {
        store.read_json(&path)?
    } else {
        json!({
            "id": derive_id(&name),
            "name": name,
            "source": {
                "file": store.relative(&path),
                "category": target.category,
            }
        })
    };
    target.mapping.merge_into(&mut doc, &pulled);
    Ok((path, doc))
}

/// Make the remote schema hold every mapped property. The title property
/// is renamed when needed, best effort. Existing properties are never
/// modified, even when their type differs from the mapping.
pub async fn ensure_schema(remote: &dyn RemoteStore, target: &SyncTarget) -> Result<SchemaEnsureReport, SyncError> {
    let schema = remote
        .retrieve_schema(&target.database_id)
        .await
        .map_err(SyncError::Remote)?;
    let plan = plan_schema(&target.mapping, &schema, &target.title_property);

    let mut title_renamed = false;
    if let Some(current) = &plan.rename_title_from {
        let mut rename = serde_json::Map::new();
        rename.insert(current.clone(), json!({ "name": target.title_property }));
        match remote.update_schema(&target.database_id, &rename).await {
            Ok(()) => title_renamed = true,
            Err(e) => warn!(
                category = %target.category,
                from = current.as_str(),
                to = target.title_property.as_str(),
                error = %format!("{:#}", e),
                "could not rename title property"
            ),
        }
    }

    if !plan.to_add.is_empty() {
        remote
            .update_schema(&target.database_id, &plan.to_add)
            .await
            .map_err(SyncError::Remote)?;
    }

    let added_properties: Vec<String> = plan.to_add.keys().cloned().collect();
    let report = SchemaEnsureReport {
        category: target.category,
        updated: title_renamed || !added_properties.is_empty(),
        title_renamed,
        property_count: schema.len() + added_properties.len(),
        added_properties,
        existing_unchanged: plan.existing,
    };
    info!(
        category = %target.category,
        added = report.added_properties.len(),
        title_renamed,
        "schema ensured"
    );
    Ok(report)
}

/// Read-only comparison of the mapping against the live schema.
pub async fn validate_schema(remote: &dyn RemoteStore, target: &SyncTarget) -> Result<SchemaValidation, SyncError> {
    let schema = remote
        .retrieve_schema(&target.database_id)
        .await
        .map_err(SyncError::Remote)?;
    let report = compare_schema(&target.mapping, &schema);
    Ok(SchemaValidation {
        category: target.category,
        consistent: report.is_consistent(),
        report,
    })
}
