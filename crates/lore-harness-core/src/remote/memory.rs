//! In-memory [`RemoteStore`] implementation for tests and offline runs.
//!
//! Databases live behind a `std::sync::RwLock`. Stored pages mimic API
//! responses: every rich-text run written with `text.content` also gets a
//! `plain_text` copy. Titles listed with [`InMemoryRemote::fail_on_title`]
//! make page writes fail, for exercising per-item error paths.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{definition_type, title_property, PageBatch, RemoteStore};
use crate::mapping::{from_remote, PropertyType};

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Default)]
struct Database {
    schema: Map<String, Value>,
    pages: Vec<Value>,
}

/// In-memory remote store.
pub struct InMemoryRemote {
    databases: RwLock<HashMap<String, Database>>,
    failing_titles: RwLock<HashSet<String>>,
    page_size: usize,
    next_id: RwLock<u64>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self {
            databases: RwLock::new(HashMap::new()),
            failing_titles: RwLock::new(HashSet::new()),
            page_size: DEFAULT_PAGE_SIZE,
            next_id: RwLock::new(0),
        }
    }

    /// Listing page size, for exercising pagination.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Register a database with the given schema (`name → definition`).
    pub fn add_database(&self, database_id: &str, schema: Value) -> Result<()> {
        let schema = schema.as_object().cloned().unwrap_or_default();
        self.write_databases()?.insert(
            database_id.to_string(),
            Database {
                schema,
                pages: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn fail_on_title(&self, title: &str) -> Result<()> {
        self.failing_titles
            .write()
            .map_err(|_| anyhow!("remote lock poisoned"))?
            .insert(title.to_string());
        Ok(())
    }

    /// Every page of a database, in creation order.
    pub fn pages(&self, database_id: &str) -> Result<Vec<Value>> {
        let databases = self.read_databases()?;
        Ok(databases
            .get(database_id)
            .map(|db| db.pages.clone())
            .unwrap_or_default())
    }

    fn read_databases(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Database>>> {
        self.databases
            .read()
            .map_err(|_| anyhow!("remote lock poisoned"))
    }

    fn write_databases(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Database>>> {
        self.databases
            .write()
            .map_err(|_| anyhow!("remote lock poisoned"))
    }

    fn allocate_id(&self) -> Result<String> {
        let mut next = self.next_id.write().map_err(|_| anyhow!("remote lock poisoned"))?;
        *next += 1;
        Ok(format!("page-{:04}", *next))
    }

    /// Reject writes whose title is registered as failing.
    fn check_title(&self, schema: &Map<String, Value>, properties: &Map<String, Value>) -> Result<()> {
        let Some(title) = title_property(schema).and_then(|name| properties.get(name)) else {
            return Ok(());
        };
        let title = from_remote(PropertyType::Title, title);
        let failing = self
            .failing_titles
            .read()
            .map_err(|_| anyhow!("remote lock poisoned"))?;
        if let Some(title) = title.as_str().filter(|t| failing.contains(*t)) {
            bail!("remote rejected page '{}'", title);
        }
        Ok(())
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

/// Add `plain_text` to every text run, as API responses carry it.
fn with_plain_text(properties: &Map<String, Value>) -> Map<String, Value> {
    let mut out = properties.clone();
    for prop in out.values_mut() {
        for key in ["title", "rich_text"] {
            if let Some(Value::Array(runs)) = prop.get_mut(key) {
                for run in runs {
                    let text = run.pointer("/text/content").cloned();
                    if let (Some(text), Some(run)) = (text, run.as_object_mut()) {
                        run.entry("plain_text").or_insert(text);
                    }
                }
            }
        }
    }
    out
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn query_by_title(&self, database_id: &str, title_property: &str, title: &str) -> Result<Vec<Value>> {
        let databases = self.read_databases()?;
        let db = databases
            .get(database_id)
            .ok_or_else(|| anyhow!("database '{}' not found", database_id))?;
        Ok(db
            .pages
            .iter()
            .filter(|page| {
                page.pointer(&format!("/properties/{}", title_property))
                    .map(|prop| from_remote(PropertyType::Title, prop))
                    .is_some_and(|value| value.as_str() == Some(title))
            })
            .cloned()
            .collect())
    }

    async fn create_page(&self, database_id: &str, properties: &Map<String, Value>) -> Result<Value> {
        let id = self.allocate_id()?;
        let mut databases = self.write_databases()?;
        let db = databases
            .get_mut(database_id)
            .ok_or_else(|| anyhow!("database '{}' not found", database_id))?;
        self.check_title(&db.schema, properties)?;
        if let Some(unknown) = properties.keys().find(|name| !db.schema.contains_key(*name)) {
            bail!("property '{}' does not exist in database '{}'", unknown, database_id);
        }
        let page = json!({ "id": id, "properties": with_plain_text(properties) });
        db.pages.push(page.clone());
        Ok(page)
    }

    async fn update_page(&self, page_id: &str, properties: &Map<String, Value>) -> Result<Value> {
        let mut databases = self.write_databases()?;
        for db in databases.values_mut() {
            let Some(page) = db
                .pages
                .iter_mut()
                .find(|page| page.get("id").and_then(Value::as_str) == Some(page_id))
            else {
                continue;
            };
            self.check_title(&db.schema, properties)?;
            if let Some(existing) = page.get_mut("properties").and_then(Value::as_object_mut) {
                existing.extend(with_plain_text(properties));
            }
            return Ok(page.clone());
        }
        bail!("page '{}' not found", page_id)
    }

    async fn list_pages(&self, database_id: &str, cursor: Option<&str>) -> Result<PageBatch> {
        let databases = self.read_databases()?;
        let db = databases
            .get(database_id)
            .ok_or_else(|| anyhow!("database '{}' not found", database_id))?;
        let start = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| anyhow!("invalid cursor '{}'", cursor))?,
            None => 0,
        };
        let end = (start + self.page_size).min(db.pages.len());
        let has_more = end < db.pages.len();
        Ok(PageBatch {
            results: db.pages.get(start..end).map(<[Value]>::to_vec).unwrap_or_default(),
            has_more,
            next_cursor: has_more.then(|| end.to_string()),
        })
    }

    async fn retrieve_schema(&self, database_id: &str) -> Result<Map<String, Value>> {
        let databases = self.read_databases()?;
        databases
            .get(database_id)
            .map(|db| db.schema.clone())
            .ok_or_else(|| anyhow!("database '{}' not found", database_id))
    }

    async fn update_schema(&self, database_id: &str, properties: &Map<String, Value>) -> Result<()> {
        let mut databases = self.write_databases()?;
        let db = databases
            .get_mut(database_id)
            .ok_or_else(|| anyhow!("database '{}' not found", database_id))?;
        for (name, change) in properties {
            if let Some(new_name) = change.get("name").and_then(Value::as_str) {
                let def = db
                    .schema
                    .shift_remove(name)
                    .ok_or_else(|| anyhow!("property '{}' not found", name))?;
                db.schema.insert(new_name.to_string(), def);
                continue;
            }
            let Some(kind) = definition_type(change) else {
                bail!("property '{}' has no type", name);
            };
            let mut def = change.clone();
            if let Some(obj) = def.as_object_mut() {
                obj.insert("type".to_string(), Value::String(kind.to_string()));
            }
            db.schema.insert(name.clone(), def);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn remote() -> InMemoryRemote {
        let remote = InMemoryRemote::new().with_page_size(2);
        remote
            .add_database("db", json!({ "Name": { "type": "title" }, "Species": { "type": "select" } }))
            .unwrap();
        remote
    }

    fn title(name: &str) -> Map<String, Value> {
        props(json!({ "Name": { "title": [ { "text": { "content": name } } ] } }))
    }

    #[tokio::test]
    async fn test_create_query_update() {
        let remote = remote();
        let page = remote.create_page("db", &title("Lyra")).await.unwrap();
        assert_eq!(page["properties"]["Name"]["title"][0]["plain_text"], "Lyra");

        let hits = remote.query_by_title("db", "Name", "Lyra").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(remote.query_by_title("db", "Name", "Kael").await.unwrap().is_empty());

        let id = page["id"].as_str().unwrap();
        let species = props(json!({ "Species": { "select": { "name": "Fae" } } }));
        let updated = remote.update_page(id, &species).await.unwrap();
        assert_eq!(updated["properties"]["Species"]["select"]["name"], "Fae");
        assert_eq!(updated["properties"]["Name"]["title"][0]["plain_text"], "Lyra");
    }

    #[tokio::test]
    async fn test_list_pages_paginates() {
        let remote = remote();
        for name in ["A", "B", "C"] {
            remote.create_page("db", &title(name)).await.unwrap();
        }
        let first = remote.list_pages("db", None).await.unwrap();
        assert_eq!(first.results.len(), 2);
        assert!(first.has_more);
        let second = remote
            .list_pages("db", first.next_cursor.as_deref())
            .await
            .unwrap();
        assert_eq!(second.results.len(), 1);
        assert!(!second.has_more);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_unknown_property_and_failing_title() {
        let remote = remote();
        let bad = props(json!({ "Mood": { "rich_text": [] } }));
        assert!(remote.create_page("db", &bad).await.is_err());

        remote.fail_on_title("Cursed").unwrap();
        assert!(remote.create_page("db", &title("Cursed")).await.is_err());
        assert!(remote.create_page("nope", &title("Lyra")).await.is_err());
    }

    #[tokio::test]
    async fn test_update_schema_add_and_rename() {
        let remote = remote();
        let changes = props(json!({
            "Name": { "name": "Title" },
            "Domains": { "multi_select": { "options": [] } }
        }));
        remote.update_schema("db", &changes).await.unwrap();
        let schema = remote.retrieve_schema("db").await.unwrap();
        assert!(schema.contains_key("Title"));
        assert!(!schema.contains_key("Name"));
        assert_eq!(schema["Domains"]["type"], "multi_select");
    }
}
