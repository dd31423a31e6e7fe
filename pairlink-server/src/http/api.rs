//! REST API handlers

use std::sync::Arc;

use axum::Json;
use axum::extract::{OriginalUri, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use pairlink_core::{PhaseCounts, SessionPhase};
use serde::{Deserialize, Serialize};

use crate::{AppState, ServerError};

/// Response for a newly created session
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub message: String,
}

/// Current pairing code of a session
#[derive(Debug, Serialize, Deserialize)]
pub struct QrResponse {
    /// `data:image/png;base64,...` URL
    pub qr: String,
}

/// Plain acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Status of one session
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub phase: SessionPhase,
    pub remote_identity: Option<String>,
    pub has_pairing_code: bool,
    pub live: bool,
    pub logged_out: bool,
    pub reconnect_gave_up: bool,
    pub created_at: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Status of the server
    pub status: String,
    /// Server version
    pub version: String,
    /// Seconds since server started
    pub uptime_seconds: i64,
    /// Sessions per phase
    pub sessions: PhaseCounts,
}

/// POST /api/create-session
pub async fn create_session(State(state): State<Arc<AppState>>) -> Json<CreateSessionResponse> {
    let session_id = state.controller.create_session().await;
    Json(CreateSessionResponse {
        session_id,
        message: "🔗 Session created successfully. Scan QR to connect.".to_string(),
    })
}

/// GET /api/qr/:session_id
///
/// 200 with the pairing code, 204 while none is available.
pub async fn get_qr(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Response, ServerError> {
    let snapshot = state
        .registry()
        .get(&session_id)
        .await
        .ok_or(ServerError::SessionNotFound(session_id))?;

    Ok(match snapshot.pairing_code {
        Some(qr) => Json(QrResponse { qr }).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// POST /api/start/:session_id
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<MessageResponse>, ServerError> {
    state.controller.start(&session_id).await?;
    Ok(Json(MessageResponse {
        message: format!("🔌 Started transport for session {session_id}"),
    }))
}

/// GET /api/sessions/:session_id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ServerError> {
    let snapshot = state
        .registry()
        .get(&session_id)
        .await
        .ok_or(ServerError::SessionNotFound(session_id))?;

    Ok(Json(SessionStatusResponse {
        session_id: snapshot.session_id,
        phase: snapshot.phase,
        remote_identity: snapshot.remote_identity,
        has_pairing_code: snapshot.pairing_code.is_some(),
        live: snapshot.live,
        logged_out: snapshot.logged_out,
        reconnect_gave_up: snapshot.reconnect_gave_up,
        created_at: snapshot.created_at,
    }))
}

/// Fallback for unknown paths below `/api`
pub async fn not_found(OriginalUri(uri): OriginalUri) -> ServerError {
    ServerError::RouteNotFound(uri.path().to_string())
}

/// GET /api/health
///
/// Returns server status, version, uptime, and session counts.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        sessions: state.registry().phase_counts().await,
    })
}
