//! HTTP server for the caseload API.
//!
//! # API Endpoints
//!
//! | Method | Path          | Description                        |
//! |--------|---------------|------------------------------------|
//! | GET    | `/health`     | Health check                       |
//! | POST   | `/api/import` | Upload a CSV and import its rows   |
//! | GET    | `/api/cases`  | Baseline and imported cases        |
//! | GET    | `/api/logs`   | SSE stream for real-time logs      |

use axum::{
    extract::{Multipart, State},
    http::{header, Method},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{CasesResponse, ImportResponse};
use crate::error::{ServerError, ServerResult};
use crate::store::JsonFileStore;
use crate::transform::pipeline::{ImportOptions, Importer};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub importer: Arc<Importer<JsonFileStore>>,
    /// Delimiter forced by configuration, if any
    pub delimiter: Option<char>,
}

impl AppState {
    pub fn new(importer: Importer<JsonFileStore>, delimiter: Option<char>) -> Self {
        Self {
            importer: Arc::new(importer),
            delimiter,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/import", post(import_csv))
        .route("/api/cases", get(list_cases))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Caseload server running on http://localhost:{}", port);
    println!("   POST /api/import - Import CSV file");
    println!("   GET  /api/cases  - List cases");
    println!("   GET  /api/logs   - SSE log stream");
    println!("   GET  /health     - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "caseload",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "import": "POST /api/import",
            "cases": "GET /api/cases",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        // lagged receivers just miss entries
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// All cases currently in the store
async fn list_cases(State(state): State<AppState>) -> ServerResult<Json<CasesResponse>> {
    let importer = state.importer.clone();
    let view = tokio::task::spawn_blocking(move || importer.store().view())
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .map_err(|e| ServerError::Import(e.into()))?;

    Ok(Json(CasesResponse::new(view.all_cases().cloned().collect())))
}

/// Import endpoint.
///
/// Multipart fields: `file` (required) and `dry_run` (`true` to preview).
async fn import_csv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ServerResult<Json<ImportResponse>> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut dry_run = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                file_data = Some(bytes.to_vec());
            }
            "dry_run" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                dry_run = crate::validation::parse_flag(&text);
            }
            _ => {}
        }
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;

    log_info(format!(
        "📄 New import: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let options = ImportOptions {
        delimiter: state.delimiter,
        dry_run,
        imported_at: None,
    };
    let importer = state.importer.clone();

    let report = tokio::task::spawn_blocking(move || importer.import_bytes(&bytes, &options))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .map_err(|e| {
            log_error(format!("Import failed: {}", e));
            ServerError::Import(e)
        })?;

    Ok(Json(ImportResponse::from(report)))
}
