//! Notion API client.
//!
//! Implements [`RemoteStore`] over the Notion REST API:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | query by title / list pages | `POST /databases/{id}/query` |
//! | create page | `POST /pages` |
//! | update page | `PATCH /pages/{id}` |
//! | retrieve schema | `GET /databases/{id}` |
//! | update schema | `PATCH /databases/{id}` |
//!
//! Every request carries the bearer token and the `Notion-Version` header.
//! HTTP 429, 5xx and network errors are retried with exponential backoff
//! (1s, 2s, 4s, ... capped at 32s); any other 4xx fails immediately.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use lore_harness_core::remote::{PageBatch, RemoteStore};
use reqwest::{Method, StatusCode};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RemoteConfig;
use crate::sync::SyncError;

const PAGE_SIZE: u32 = 100;

pub struct NotionClient {
    http: reqwest::Client,
    api_url: String,
    api_version: String,
    token: String,
    max_retries: u32,
}

impl NotionClient {
    pub fn new(config: &RemoteConfig, token: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            token,
            max_retries: config.max_retries,
        })
    }

    /// Client using the token from the environment variable named by
    /// `remote.token_env`.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, SyncError> {
        let token = config
            .token()
            .ok_or_else(|| SyncError::MissingCredential(config.token_env.clone()))?;
        Self::new(config, token).map_err(SyncError::Remote)
    }

    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.api_url, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(%url, attempt, ?delay, "retrying remote request");
                tokio::time::sleep(delay).await;
            }

            let mut req = self
                .http
                .request(method.clone(), &url)
                .header("Authorization", format!("Bearer {}", self.token))
                .header("Notion-Version", &self.api_version);
            if let Some(body) = body {
                req = req.json(body);
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.json().await?);
                    }
                    let body_text = response.text().await.unwrap_or_default();
                    if is_retryable(status) {
                        warn!(%url, %status, "remote request failed, will retry");
                        last_err = Some(anyhow!("Notion API error {}: {}", status, body_text));
                        continue;
                    }
                    bail!("Notion API error {}: {}", status, body_text);
                }
                Err(e) => {
                    warn!(%url, error = %e, "remote request failed, will retry");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Notion request failed after retries")))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn title_query(title_property: &str, title: &str) -> Value {
    json!({
        "filter": {
            "property": title_property,
            "title": { "equals": title }
        }
    })
}

fn list_query(cursor: Option<&str>) -> Value {
    let mut body = json!({ "page_size": PAGE_SIZE });
    if let Some(cursor) = cursor {
        body["start_cursor"] = Value::String(cursor.to_string());
    }
    body
}

fn parse_batch(response: Value) -> Result<PageBatch> {
    let batch: PageBatch = serde_json::from_value(response)
        .map_err(|e| anyhow!("Invalid Notion query response: {}", e))?;
    Ok(batch)
}

#[async_trait]
impl RemoteStore for NotionClient {
    async fn query_by_title(&self, database_id: &str, title_property: &str, title: &str) -> Result<Vec<Value>> {
        let body = title_query(title_property, title);
        let response = self
            .request(Method::POST, &format!("/databases/{}/query", database_id), Some(&body))
            .await?;
        Ok(parse_batch(response)?.results)
    }

    async fn create_page(&self, database_id: &str, properties: &Map<String, Value>) -> Result<Value> {
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": properties,
        });
        self.request(Method::POST, "/pages", Some(&body)).await
    }

    async fn update_page(&self, page_id: &str, properties: &Map<String, Value>) -> Result<Value> {
        let body = json!({ "properties": properties });
        self.request(Method::PATCH, &format!("/pages/{}", page_id), Some(&body))
            .await
    }

    async fn list_pages(&self, database_id: &str, cursor: Option<&str>) -> Result<PageBatch> {
        let body = list_query(cursor);
        let response = self
            .request(Method::POST, &format!("/databases/{}/query", database_id), Some(&body))
            .await?;
        parse_batch(response)
    }

    async fn retrieve_schema(&self, database_id: &str) -> Result<Map<String, Value>> {
        let response = self
            .request(Method::GET, &format!("/databases/{}", database_id), None)
            .await?;
        match response.get("properties") {
            Some(Value::Object(properties)) => Ok(properties.clone()),
            _ => bail!("Invalid Notion database response: missing properties"),
        }
    }

    async fn update_schema(&self, database_id: &str, properties: &Map<String, Value>) -> Result<()> {
        let body = json!({ "properties": properties });
        self.request(Method::PATCH, &format!("/databases/{}", database_id), Some(&body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_query_bodies() {
        assert_eq!(
            title_query("Name", "Lyra"),
            json!({ "filter": { "property": "Name", "title": { "equals": "Lyra" } } })
        );
        assert_eq!(list_query(None), json!({ "page_size": 100 }));
        assert_eq!(list_query(Some("abc"))["start_cursor"], "abc");
    }

    #[test]
    fn test_parse_batch() {
        let batch = parse_batch(json!({
            "object": "list",
            "results": [ { "id": "p1" } ],
            "has_more": true,
            "next_cursor": "c2"
        }))
        .unwrap();
        assert_eq!(batch.results.len(), 1);
        assert!(batch.has_more);
        assert_eq!(batch.next_cursor.as_deref(), Some("c2"));

        let last = parse_batch(json!({ "results": [], "has_more": false, "next_cursor": null })).unwrap();
        assert!(last.next_cursor.is_none());
        assert!(parse_batch(json!({ "oops": 1 })).is_err());
    }

    #[test]
    fn test_from_config_requires_token() {
        let config = RemoteConfig {
            token_env: "LORE_HARNESS_TEST_UNSET_TOKEN".to_string(),
            ..RemoteConfig::default()
        };
        assert!(matches!(
            NotionClient::from_config(&config),
            Err(SyncError::MissingCredential(_))
        ));
    }
}
