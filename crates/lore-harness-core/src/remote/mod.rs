//! Remote page store abstraction.
//!
//! The [`RemoteStore`] trait is the only surface the sync operations need
//! from a document database with typed-property pages. Pages and schema
//! property definitions travel as raw JSON in the wire shape of the
//! Notion API (`{"id", "properties": {...}}`).
//!
//! Schema reconciliation is split into pure planning ([`plan_schema`],
//! [`validate_schema`]) and the store calls that apply it.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::mapping::{FieldMapping, PropertyType};

/// One page of a paginated listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageBatch {
    pub results: Vec<Value>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// Abstract remote page store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`query_by_title`](RemoteStore::query_by_title) | Pages whose title equals a name |
/// | [`create_page`](RemoteStore::create_page) | New page in a database |
/// | [`update_page`](RemoteStore::update_page) | Overwrite the given properties of a page |
/// | [`list_pages`](RemoteStore::list_pages) | Cursor-paginated listing |
/// | [`retrieve_schema`](RemoteStore::retrieve_schema) | Property definitions of a database |
/// | [`update_schema`](RemoteStore::update_schema) | Add or rename properties |
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn query_by_title(
        &self,
        database_id: &str,
        title_property: &str,
        title: &str,
    ) -> Result<Vec<Value>>;

    /// Returns the created page.
    async fn create_page(&self, database_id: &str, properties: &Map<String, Value>) -> Result<Value>;

    /// Properties not named in `properties` are left as they are.
    async fn update_page(&self, page_id: &str, properties: &Map<String, Value>) -> Result<Value>;

    async fn list_pages(&self, database_id: &str, cursor: Option<&str>) -> Result<PageBatch>;

    /// `property name → definition`. Each definition carries a `type` key.
    async fn retrieve_schema(&self, database_id: &str) -> Result<Map<String, Value>>;

    /// Apply `property name → change`, where a change is either a new
    /// definition ([`PropertyType::schema_stub`]) or `{"name": <new name>}`
    /// to rename an existing property.
    async fn update_schema(&self, database_id: &str, properties: &Map<String, Value>) -> Result<()>;
}

/// Type name of a schema property definition: its `type` key, else the
/// first key naming a known property type.
pub fn definition_type(def: &Value) -> Option<&str> {
    if let Some(kind) = def.get("type").and_then(Value::as_str) {
        return Some(kind);
    }
    def.as_object()?
        .keys()
        .map(String::as_str)
        .find(|key| PropertyType::parse(key).is_some())
}

/// Name of the schema's title-typed property.
pub fn title_property(schema: &Map<String, Value>) -> Option<&str> {
    schema
        .iter()
        .find(|(_, def)| definition_type(def) == Some(PropertyType::Title.as_str()))
        .map(|(name, _)| name.as_str())
}

/// Changes needed for a remote schema to hold every mapped property.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaPlan {
    /// Current title property name, when it differs from the wanted one.
    pub rename_title_from: Option<String>,
    /// Stubs for mapped properties the schema lacks.
    pub to_add: Map<String, Value>,
    /// Mapped properties already present (or covered by the title).
    pub existing: Vec<String>,
}

/// Plan schema changes. A database has exactly one title property, so a
/// title-typed mapping entry is never added when one already exists; it is
/// renamed to `title_name` instead.
pub fn plan_schema(mapping: &FieldMapping, schema: &Map<String, Value>, title_name: &str) -> SchemaPlan {
    let current_title = title_property(schema);
    let mut plan = SchemaPlan {
        rename_title_from: current_title
            .filter(|current| *current != title_name)
            .map(str::to_string),
        ..SchemaPlan::default()
    };
    for (name, spec) in mapping.iter() {
        let covered_by_title = spec.kind == PropertyType::Title && current_title.is_some();
        if schema.contains_key(name) || covered_by_title {
            plan.existing.push(name.to_string());
        } else {
            plan.to_add.insert(name.to_string(), spec.kind.schema_stub());
        }
    }
    plan
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeMismatch {
    pub property: String,
    pub expected: PropertyType,
    pub actual: Option<String>,
}

/// Read-only comparison of a mapping against a live schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaReport {
    pub missing: Vec<String>,
    pub type_mismatches: Vec<TypeMismatch>,
    /// Remote properties no mapping entry refers to. Informational.
    pub unmapped: Vec<String>,
}

impl SchemaReport {
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.type_mismatches.is_empty()
    }
}

pub fn validate_schema(mapping: &FieldMapping, schema: &Map<String, Value>) -> SchemaReport {
    let mut report = SchemaReport::default();
    for (name, spec) in mapping.iter() {
        match schema.get(name) {
            None => report.missing.push(name.to_string()),
            Some(def) => {
                let actual = definition_type(def);
                if actual != Some(spec.kind.as_str()) {
                    report.type_mismatches.push(TypeMismatch {
                        property: name.to_string(),
                        expected: spec.kind,
                        actual: actual.map(str::to_string),
                    });
                }
            }
        }
    }
    report.unmapped = schema
        .keys()
        .filter(|name| !mapping.properties.contains_key(name.as_str()))
        .cloned()
        .collect();
    report
}
