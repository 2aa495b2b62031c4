//! DFU API handlers.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use dfufleet_core::{DfuError, DfuRequest, SessionInfo};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response for a successful start request. The transfer outcome arrives on
/// the event stream, not here.
#[derive(Debug, Serialize)]
pub struct StartDfuResponse {
    pub address: String,
}

/// Request body for aborting DFU sessions.
#[derive(Debug, Default, Deserialize)]
pub struct AbortDfuBody {
    /// Target address; omit to abort every live session.
    pub address: Option<String>,
}

/// Response for an abort request.
#[derive(Debug, Serialize)]
pub struct AbortDfuResponse {
    /// Addresses an abort was signalled for.
    pub aborted: Vec<String>,
}

/// Response for listing live sessions.
#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionInfo>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct DfuErrorResponse {
    pub error: &'static str,
    pub message: String,
}

/// Wrapper mapping core errors onto HTTP statuses.
pub struct ApiError(DfuError);

impl From<DfuError> for ApiError {
    fn from(err: DfuError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DfuError::AbnormalParameter(_) | DfuError::FirmwareInvalid(_) => {
                StatusCode::BAD_REQUEST
            }
            DfuError::AlreadyActive(_) => StatusCode::CONFLICT,
            DfuError::ParallelLimitReached => StatusCode::TOO_MANY_REQUESTS,
            DfuError::NoActiveSessions | DfuError::UnknownAddress(_) => StatusCode::NOT_FOUND,
            DfuError::Aborted | DfuError::Engine { .. } => StatusCode::BAD_GATEWAY,
        };

        let body = DfuErrorResponse {
            error: self.0.code(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Start a firmware update. Returns as soon as the session is admitted and
/// the transfer is underway; watch the event stream for progress and the
/// terminal outcome.
pub async fn start_dfu(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DfuRequest>,
) -> Result<Json<StartDfuResponse>, ApiError> {
    let address = request.address.clone();
    let completion = state.orchestrator().start(request).await?;

    // The HTTP response cannot carry the async outcome; log it when it lands.
    tokio::spawn(async move {
        match completion.await {
            Ok(addr) => info!("DFU finished for {}", addr),
            Err(e) => warn!("DFU ended with error: {}", e),
        }
    });

    Ok(Json(StartDfuResponse { address }))
}

/// Abort one session, or all of them when no address is given.
pub async fn abort_dfu(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AbortDfuBody>,
) -> Result<Json<AbortDfuResponse>, ApiError> {
    let aborted = state
        .orchestrator()
        .abort(body.address.as_deref())
        .await?;

    Ok(Json(AbortDfuResponse { aborted }))
}

/// List live sessions with their current state.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionsResponse> {
    Json(SessionsResponse {
        sessions: state.orchestrator().sessions(),
    })
}
