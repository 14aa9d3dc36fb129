//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{ErrorResponse, QueuedResponse, SessionListResponse, SuccessResponse};
use super::AppState;
use crate::protocol::SessionId;
use crate::runtime::{RelayError, RelayEvent, Subscription};
use crate::session::SessionView;
use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use thiserror::Error;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id", get(get_session))
        // Ingest
        .route("/api/sessions/:id/frames", post(post_frame))
        .route("/api/sessions/:id/ws", get(ingest_socket))
        // Observation
        .route("/api/sessions/:id/stream", get(stream_session))
        // Lifecycle
        .route("/api/sessions/:id/dispose", post(dispose_session))
        .route("/version", get(get_version))
        .with_state(state)
}

fn parse_session_id(raw: &str) -> Result<SessionId, AppError> {
    raw.parse()
        .map_err(|e: crate::protocol::DecodeError| AppError::BadRequest(e.to_string()))
}

// ============================================================
// Ingest
// ============================================================

/// Queue one raw frame. The body is passed through untouched so that
/// undecodable frames are reported by the session, not by the extractor.
async fn post_frame(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    let session_id = parse_session_id(&id)?;
    state.relay.ingest(&session_id, body.to_vec()).await?;
    Ok((StatusCode::ACCEPTED, Json(QueuedResponse { queued: true })))
}

async fn ingest_socket(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let session_id = parse_session_id(&id)?;
    Ok(ws.on_upgrade(move |socket| read_frames(socket, state, session_id)))
}

/// Ingest every data message of a socket until it closes.
///
/// Binary messages are passed on as bytes; the session reports any that are
/// not valid UTF-8 JSON as decode failures.
async fn read_frames(mut socket: WebSocket, state: AppState, session_id: SessionId) {
    tracing::info!(session_id = %session_id, "Ingest socket opened");
    let mut frames = 0u64;

    while let Some(message) = socket.recv().await {
        let raw = match message {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(bytes)) => bytes,
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Ingest socket failed");
                break;
            }
        };
        if let Err(e) = state.relay.ingest(&session_id, raw).await {
            tracing::warn!(session_id = %session_id, error = %e, "Closing ingest socket");
            break;
        }
        frames += 1;
    }

    tracing::info!(session_id = %session_id, frames, "Ingest socket closed");
}

// ============================================================
// Observation
// ============================================================

async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    let sessions = state
        .relay
        .session_ids()
        .await
        .iter()
        .map(ToString::to_string)
        .collect();
    Json(SessionListResponse { sessions })
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let session_id = parse_session_id(&id)?;
    Ok(Json(state.relay.view(&session_id).await?))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = parse_session_id(&id)?;
    let Subscription { view, events } = state.relay.subscribe(&session_id).await?;
    Ok(sse_stream(RelayEvent::Init { view }, events))
}

// ============================================================
// Lifecycle
// ============================================================

async fn dispose_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let session_id = parse_session_id(&id)?;
    if !state.relay.dispose(&session_id).await {
        return Err(RelayError::NotFound(session_id).into());
    }
    Ok(Json(SuccessResponse { success: true }))
}

async fn get_version() -> &'static str {
    concat!("upsert-relay ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unavailable(String),
}

impl From<RelayError> for AppError {
    fn from(error: RelayError) -> Self {
        match error {
            RelayError::NotFound(_) => AppError::NotFound(error.to_string()),
            RelayError::Closed(_) => AppError::Unavailable(error.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(ErrorResponse::new(self.to_string()));
        (status, body).into_response()
    }
}
