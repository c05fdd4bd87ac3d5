use axum::{Json, extract::State, http::StatusCode};

use crate::handlers::common::engine_err;
use crate::types::{AppState, Attempt, AuthResponse, User};

pub async fn authorize(
    State(state): State<AppState>,
    Json(attempt): Json<Attempt>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let ok = state.engine.validate(&attempt).await.map_err(engine_err)?;
    Ok(Json(AuthResponse { ok }))
}

pub async fn clean_bucket(
    State(state): State<AppState>,
    Json(user): Json<User>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.engine.clean_bucket(&user).await.map_err(engine_err)?;
    Ok(StatusCode::NO_CONTENT)
}
