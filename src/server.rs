//! HTTP API over the lore pipeline.
//!
//! Exposes normalization, indexing, search and remote sync as a JSON HTTP
//! API. Every handler calls the same functions as the CLI, so a request and
//! the matching `lore` command produce the same report.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/normalize/{category}` | Batch normalization (`?dry_run=true`) |
//! | `POST` | `/migrate/{category}` | Legacy layout migration (`?dry_run=true`) |
//! | `POST` | `/index` | Regenerate every index and the master index |
//! | `GET`  | `/index/{category}` | Index entries of one category |
//! | `GET`  | `/entities/{category}/{id}` | One canonical entity file |
//! | `GET`  | `/search?q=` | Fuzzy search across all indexes |
//! | `GET`  | `/related/{name}` | Crosslinks for a name |
//! | `POST` | `/sync/{category}/push` | Push formatted entities to the remote |
//! | `POST` | `/sync/{category}/pull` | Pull remote pages into entity files |
//! | `POST` | `/sync/{category}/schema` | Add missing mapped properties |
//! | `GET`  | `/sync/{category}/schema` | Compare the mapping with the live schema |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), the sync
//! precondition codes `missing_credential`, `missing_database_id`,
//! `missing_mapping`, `invalid_mapping` (400), and `remote_error`,
//! `local_error`, `internal` (500).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lore_harness_core::fuzzy::Related;
use lore_harness_core::index::{IndexEntry, MasterIndex};
use lore_harness_core::remote::RemoteStore;
use lore_harness_core::Category;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::indexing::{build_category_index, generate_master_index};
use crate::migrate::{migrate_legacy_layout, MigrationReport};
use crate::notion::NotionClient;
use crate::pipeline::{load_synonyms, normalize_category, NormalizeOptions, NormalizeReport};
use crate::scheduler::run_scheduler;
use crate::search::{run_related, run_search};
use crate::storage::LoreStore;
use crate::sync::{
    ensure_schema, pull, push, validate_schema, PullReport, PushReport, SchemaEnsureReport, SchemaValidation,
    SyncError, SyncLocks, SyncTarget,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: LoreStore,
    locks: SyncLocks,
    /// `None` when no API token is configured; sync routes then answer
    /// `missing_credential`.
    remote: Option<Arc<dyn RemoteStore>>,
}

impl AppState {
    /// State backed by the Notion client when a token is available.
    pub fn new(config: Config) -> Self {
        let remote = match NotionClient::from_config(&config.remote) {
            Ok(client) => Some(Arc::new(client) as Arc<dyn RemoteStore>),
            Err(e) => {
                warn!(error = %e, "remote sync disabled");
                None
            }
        };
        Self {
            store: LoreStore::from_config(&config),
            config: Arc::new(config),
            locks: SyncLocks::new(),
            remote,
        }
    }

    /// Replace the remote store, e.g. with an in-memory one.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    fn remote(&self) -> Result<Arc<dyn RemoteStore>, SyncError> {
        self.remote
            .clone()
            .ok_or_else(|| SyncError::MissingCredential(self.config.remote.token_env.clone()))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/normalize/{category}", post(handle_normalize))
        .route("/migrate/{category}", post(handle_migrate))
        .route("/index", post(handle_generate_index))
        .route("/index/{category}", get(handle_category_index))
        .route("/entities/{category}/{id}", get(handle_get_entity))
        .route("/search", get(handle_search))
        .route("/related/{name}", get(handle_related))
        .route("/sync/{category}/push", post(handle_push))
        .route("/sync/{category}/pull", post(handle_pull))
        .route("/sync/{category}/schema", post(handle_ensure_schema).get(handle_validate_schema))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`.
///
/// With `with_scheduler` set, the sync scheduler runs in the same process
/// and shares the server's per-category locks. Ctrl-C stops both.
pub async fn run_server(config: Config, with_scheduler: bool) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState::new(config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = if with_scheduler {
        let remote = state.remote()?;
        Some(tokio::spawn(run_scheduler(
            state.config.clone(),
            remote,
            state.locks.clone(),
            shutdown_rx,
        )))
    } else {
        None
    };

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = bind_addr.as_str(), "lore server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler {
        handle.await??;
    }
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        let status = if err.is_precondition() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: format!("{:#}", err),
    }
}

fn parse_category(raw: &str) -> Result<Category, AppError> {
    raw.parse().map_err(|e: anyhow::Error| bad_request(e.to_string()))
}

#[derive(Deserialize, Default)]
struct DryRunParams {
    #[serde(default)]
    dry_run: bool,
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /normalize/{category} ============

async fn handle_normalize(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(params): Query<DryRunParams>,
) -> Result<Json<NormalizeReport>, AppError> {
    let category = parse_category(&category)?;
    let synonyms = load_synonyms(&state.config, category).map_err(internal)?;
    let options = NormalizeOptions {
        dry_run: params.dry_run,
        ..NormalizeOptions::default()
    };
    let _guard = state.locks.lock(category).await;
    let report = normalize_category(&state.store, category, &synonyms, &options).map_err(internal)?;
    Ok(Json(report))
}

// ============ POST /migrate/{category} ============

async fn handle_migrate(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(params): Query<DryRunParams>,
) -> Result<Json<MigrationReport>, AppError> {
    let category = parse_category(&category)?;
    let synonyms = load_synonyms(&state.config, category).map_err(internal)?;
    let _guard = state.locks.lock(category).await;
    let report = migrate_legacy_layout(&state.store, category, &synonyms, params.dry_run).map_err(internal)?;
    Ok(Json(report))
}

// ============ POST /index, GET /index/{category} ============

async fn handle_generate_index(State(state): State<AppState>) -> Result<Json<MasterIndex>, AppError> {
    let master = generate_master_index(&state.store).map_err(internal)?;
    Ok(Json(master))
}

#[derive(Serialize)]
struct CategoryIndexResponse {
    category: Category,
    entries: Vec<IndexEntry>,
}

async fn handle_category_index(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<CategoryIndexResponse>, AppError> {
    let category = parse_category(&category)?;
    let entries = build_category_index(&state.store, category).map_err(internal)?;
    Ok(Json(CategoryIndexResponse { category, entries }))
}

// ============ GET /entities/{category}/{id} ============

async fn handle_get_entity(
    State(state): State<AppState>,
    Path((category, id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let category = parse_category(&category)?;
    match state.store.read_entity(category, &id).map_err(internal)? {
        Some((_, doc)) => Ok(Json(doc)),
        None => Err(not_found(format!("no {} entity with id: {}", category, id))),
    }
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    results: Vec<IndexEntry>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    if params.q.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let results = run_search(&state.store, &params.q).map_err(internal)?;
    Ok(Json(SearchResponse {
        query: params.q,
        results,
    }))
}

// ============ GET /related/{name} ============

async fn handle_related(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<Related>, AppError> {
    if name.trim().is_empty() {
        return Err(bad_request("name must not be empty"));
    }
    let related = run_related(&state.store, &name).map_err(internal)?;
    Ok(Json(related))
}

// ============ /sync/{category}/... ============

async fn handle_push(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<PushReport>, AppError> {
    let category = parse_category(&category)?;
    let target = SyncTarget::resolve(&state.config, category, None)?;
    let remote = state.remote()?;
    let report = push(&state.store, remote.as_ref(), &target, &state.locks).await?;
    Ok(Json(report))
}

async fn handle_pull(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<PullReport>, AppError> {
    let category = parse_category(&category)?;
    let target = SyncTarget::resolve(&state.config, category, None)?;
    let remote = state.remote()?;
    let report = pull(&state.store, remote.as_ref(), &target, &state.locks).await?;
    Ok(Json(report))
}

async fn handle_ensure_schema(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<SchemaEnsureReport>, AppError> {
    let category = parse_category(&category)?;
    let target = SyncTarget::resolve(&state.config, category, None)?;
    let remote = state.remote()?;
    Ok(Json(ensure_schema(remote.as_ref(), &target).await?))
}

async fn handle_validate_schema(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<SchemaValidation>, AppError> {
    let category = parse_category(&category)?;
    let target = SyncTarget::resolve(&state.config, category, None)?;
    let remote = state.remote()?;
    Ok(Json(validate_schema(remote.as_ref(), &target).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use lore_harness_core::remote::memory::InMemoryRemote;
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app_state(tmp: &TempDir) -> AppState {
        let mut config = Config::minimal(tmp.path().join("lore"));
        config.remote.token_env = "LORE_HARNESS_TEST_UNSET_TOKEN".to_string();
        config.mappings.dir = tmp.path().join("mappings");
        config.remote.databases.insert("characters".into(), "chars-db".into());
        std::fs::create_dir_all(&config.mappings.dir).unwrap();
        std::fs::write(
            config.mapping_path(Category::Characters),
            r#"{ "Name": { "json": "name", "type": "title" }, "Species": { "json": "species", "type": "select" } }"#,
        )
        .unwrap();
        AppState::new(config)
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn seed_raw(state: &AppState) {
        let path = state.store.category_dir(Category::Characters).join("court.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{ "characters": [ { "name": "Lyra", "species": "high fae" } ] }"#).unwrap();
    }

    #[tokio::test]
    async fn test_health() {
        let tmp = TempDir::new().unwrap();
        let (status, body) = call(router(app_state(&tmp)), "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_normalize_index_and_search() {
        let tmp = TempDir::new().unwrap();
        let state = app_state(&tmp);
        seed_raw(&state);
        let app = router(state);

        let (status, body) = call(app.clone(), "POST", "/normalize/characters").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entities"], 1);
        assert_eq!(body["created"], 1);

        let (status, _) = call(app.clone(), "POST", "/index").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(app.clone(), "GET", "/index/characters").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entries"][0]["name"], "Lyra");

        let (status, body) = call(app.clone(), "GET", "/search?q=lyr").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"][0]["name"], "Lyra");

        let (status, body) = call(app, "GET", "/entities/characters/lyra").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Lyra");
    }

    #[tokio::test]
    async fn test_client_errors() {
        let tmp = TempDir::new().unwrap();
        let app = router(app_state(&tmp));

        let (status, body) = call(app.clone(), "POST", "/normalize/dragons").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");

        let (status, body) = call(app.clone(), "GET", "/search?q=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "query must not be empty");

        let (status, body) = call(app, "GET", "/entities/plots/nothing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn test_sync_without_token_is_missing_credential() {
        let tmp = TempDir::new().unwrap();
        let (status, body) = call(router(app_state(&tmp)), "POST", "/sync/characters/push").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "missing_credential");
    }

    #[tokio::test]
    async fn test_sync_routes_with_in_memory_remote() {
        let tmp = TempDir::new().unwrap();
        let remote = Arc::new(InMemoryRemote::new());
        remote.add_database("chars-db", json!({ "Title": { "type": "title" } })).unwrap();
        let state = app_state(&tmp).with_remote(remote.clone());
        seed_raw(&state);
        let app = router(state);

        let (status, body) = call(app.clone(), "GET", "/sync/characters/schema").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["consistent"], false);

        let (status, body) = call(app.clone(), "POST", "/sync/characters/schema").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["added_properties"], json!(["Species"]));

        call(app.clone(), "POST", "/normalize/characters").await;
        let (status, body) = call(app.clone(), "POST", "/sync/characters/push").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["created"], 1);

        let (status, body) = call(app.clone(), "POST", "/sync/characters/pull").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pages"], 1);
        assert_eq!(body["unchanged"], 1);

        let (status, body) = call(app, "POST", "/sync/plots/pull").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "missing_database_id");
    }
}
