use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};

use crate::error::EngineError;
use crate::types::AppState;

pub fn internal_err(e: impl std::fmt::Display) -> (StatusCode, String) {
    error!(error = %e, "internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error".to_string(),
    )
}

/// Client errors keep their message; everything else is logged and hidden.
pub fn engine_err(e: EngineError) -> (StatusCode, String) {
    match e {
        EngineError::InvalidInput(_) | EngineError::InvalidNetwork(_) => {
            warn!(error = %e, "rejected request");
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        e if e.is_not_found() => (StatusCode::NOT_FOUND, e.to_string()),
        e => internal_err(e),
    }
}

pub async fn admin_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok());

    let expected_auth = format!("Bearer {}", state.config.server.admin_token);

    match auth_header {
        Some(auth) if auth == expected_auth => Ok(next.run(req).await),
        _ => {
            warn!("rejected administrative request with bad token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

pub async fn health() -> &'static str {
    "ok"
}
