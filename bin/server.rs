// Exam Catalog - Web Server
// REST API over the lab test catalog with Axum

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use exam_catalog::logging::{self, LogTarget};
use exam_catalog::{filter, CatalogSource, Config, LoadError, SharedEntry};

#[derive(Parser, Debug)]
#[command(name = "exam-server", version, about = "HTTP API for the lab test catalog")]
struct Cli {
    #[arg(long, help = "Configuration file (TOML)")]
    config: Option<PathBuf>,

    #[arg(long, help = "Directory holding <name>.csv instead of the bundled catalog")]
    catalog_dir: Option<PathBuf>,

    #[arg(long, help = "Address to listen on (overrides config)")]
    bind: Option<String>,
}

/// Loaded catalog plus when it was loaded
#[derive(Default)]
struct CatalogState {
    entries: Vec<SharedEntry>,
    loaded_at: Option<DateTime<Utc>>,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    catalog: Arc<RwLock<CatalogState>>,
    /// Held for a whole reload so results land in the order loads started
    reload_lock: Arc<Mutex<()>>,
    source: Arc<dyn CatalogSource>,
    name: String,
}

impl AppState {
    fn new(source: Arc<dyn CatalogSource>, name: impl Into<String>) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(CatalogState::default())),
            reload_lock: Arc::new(Mutex::new(())),
            source,
            name: name.into(),
        }
    }

    /// Load on the blocking pool and replace the catalog wholesale.
    /// On failure the previous catalog stays in place.
    async fn reload(&self) -> Result<usize, String> {
        let _reloading = self.reload_lock.lock().await;
        let source = self.source.clone();
        let name = self.name.clone();

        let result: Result<Vec<SharedEntry>, LoadError> =
            tokio::task::spawn_blocking(move || exam_catalog::load(source.as_ref(), &name))
                .await
                .map_err(|err| format!("Catalog load task failed: {}", err))?;

        match result {
            Ok(entries) => {
                let count = entries.len();
                let mut catalog = self.catalog.write().await;
                catalog.entries = entries;
                catalog.loaded_at = Some(Utc::now());
                Ok(count)
            }
            Err(err) => {
                tracing::error!(error = %err, "catalog reload failed");
                Err(format!("{}: {}", exam_catalog::catalog::LOAD_ERROR_PREFIX, err))
            }
        }
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn error(message: String) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message),
        }
    }
}

/// Catalog entry as exposed by the API
#[derive(Serialize, Deserialize)]
struct EntryResponse {
    id: String,
    code: String,
    name: String,
    amount: Option<f64>,
    amount_display: String,
}

impl From<&SharedEntry> for EntryResponse {
    fn from(entry: &SharedEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            code: entry.code.clone(),
            name: entry.name.clone(),
            amount: entry.amount,
            amount_display: entry.formatted_amount(),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    entries: usize,
    loaded_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: String,
}

#[derive(Serialize)]
struct ReloadResponse {
    entries: usize,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    Json(ApiResponse::ok(HealthResponse {
        status: "OK",
        version: exam_catalog::VERSION,
        entries: catalog.entries.len(),
        loaded_at: catalog.loaded_at,
    }))
}

/// GET /api/badania - Whole catalog, sorted by name
async fn get_entries(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    let response: Vec<EntryResponse> = catalog.entries.iter().map(EntryResponse::from).collect();
    Json(ApiResponse::ok(response))
}

/// POST /api/search - Entries matching a query; a blank query matches nothing
async fn search_entries(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> impl IntoResponse {
    let query = request.query.trim();
    if query.is_empty() {
        return Json(ApiResponse::ok(Vec::<EntryResponse>::new()));
    }

    let catalog = state.catalog.read().await;
    let response: Vec<EntryResponse> = filter(&catalog.entries, query)
        .iter()
        .map(EntryResponse::from)
        .collect();
    Json(ApiResponse::ok(response))
}

/// POST /api/reload - Re-read the catalog source
async fn reload_catalog(State(state): State<AppState>) -> impl IntoResponse {
    match state.reload().await {
        Ok(entries) => (StatusCode::OK, Json(ApiResponse::ok(ReloadResponse { entries }))).into_response(),
        Err(message) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(message)),
        )
            .into_response(),
    }
}

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/badania", get(get_entries))
        .route("/search", post(search_entries))
        .route("/reload", post(reload_catalog))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.catalog_dir {
        config.catalog.dir = Some(dir);
    }
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    logging::init(&config.logging, LogTarget::for_cli(&config.logging))?;

    let state = AppState::new(config.catalog_source(), config.catalog.name.clone());
    match state.reload().await {
        Ok(entries) => tracing::info!(entries, "catalog ready"),
        // Start anyway; POST /api/reload retries
        Err(message) => tracing::error!(%message, "starting with an empty catalog"),
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind to address: {}", config.server.bind))?;

    tracing::info!(bind = %config.server.bind, "server running");
    axum::serve(listener, app(state))
        .await
        .context("Server error")?;

    Ok(())
}
