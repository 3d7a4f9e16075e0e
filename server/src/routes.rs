//! HTTP API of the tool server

use crate::files::{FileCatalog, CONTENT_TYPE};
use crate::tunnel::{TunnelError, TunnelSession};
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use protocol::control::{ErrorResponse, HealthStatus, StopTunnelResponse, TunnelRequest};
use protocol::{FILE_HASH_HEADER, FILE_METADATA_HEADER};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<FileCatalog>,
    pub session: Arc<TunnelSession>,
    pub webtest_page: Arc<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(protocol::START_TUNNEL_PATH, post(start_tunnel))
        .route(protocol::STOP_TUNNEL_PATH, post(stop_tunnel))
        .route(protocol::FILES_PATH, get(list_files))
        .route("/download/{filename}", get(download))
        .route(protocol::WEBTEST_PATH, get(webtest))
        .route(protocol::HEALTH_PATH, get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

impl IntoResponse for TunnelError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        error_response(status, self.to_string())
    }
}

async fn start_tunnel(
    State(state): State<AppState>,
    Json(request): Json<TunnelRequest>,
) -> Result<impl IntoResponse, TunnelError> {
    info!("Start requested for {}", request.tool_name);
    let response = state.session.start(&request.tool_name).await?;
    Ok(Json(response))
}

async fn stop_tunnel(
    State(state): State<AppState>,
    Json(request): Json<TunnelRequest>,
) -> Result<impl IntoResponse, TunnelError> {
    info!("Stop requested for {}", request.tool_name);
    let message = state.session.stop(&request.tool_name).await?;
    Ok(Json(StopTunnelResponse { message }))
}

async fn list_files(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.catalog.list())
}

async fn download(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    // Only catalogued files are served; this also rules out path traversal
    let (Some(metadata), Some(path)) = (state.catalog.get(&filename), state.catalog.path_of(&filename)) else {
        return error_response(StatusCode::NOT_FOUND, format!("File not found: {}", filename));
    };

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            error!("Failed to open {:?}: {}", path, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file");
        }
    };

    let metadata_json = match serde_json::to_string(metadata) {
        Ok(json) => json,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(metadata.size));
    if let Ok(value) = HeaderValue::from_str(&metadata_json) {
        headers.insert(FILE_METADATA_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&metadata.hash) {
        headers.insert(FILE_HASH_HEADER, value);
    }
    response
}

async fn webtest(State(state): State<AppState>) -> Html<String> {
    Html(state.webtest_page.as_ref().clone())
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
