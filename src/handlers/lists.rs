use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

use crate::handlers::common::engine_err;
use crate::types::{AppState, ListEntry, ListKind, ListedResponse};

type HandlerResult<T> = Result<T, (StatusCode, String)>;

pub async fn get_whitelist(State(state): State<AppState>) -> HandlerResult<Json<Vec<String>>> {
    let ips = state.engine.list(ListKind::White).await.map_err(engine_err)?;
    Ok(Json(ips))
}

pub async fn get_blacklist(State(state): State<AppState>) -> HandlerResult<Json<Vec<String>>> {
    let ips = state.engine.list(ListKind::Black).await.map_err(engine_err)?;
    Ok(Json(ips))
}

/// `?ip=..&mask=..`; matches on the address alone.
pub async fn check_whitelist(
    State(state): State<AppState>,
    Query(entry): Query<ListEntry>,
) -> HandlerResult<Json<ListedResponse>> {
    let listed = state
        .engine
        .is_listed(ListKind::White, &entry)
        .await
        .map_err(engine_err)?;
    Ok(Json(ListedResponse { listed }))
}

pub async fn check_blacklist(
    State(state): State<AppState>,
    Query(entry): Query<ListEntry>,
) -> HandlerResult<Json<ListedResponse>> {
    let listed = state
        .engine
        .is_listed(ListKind::Black, &entry)
        .await
        .map_err(engine_err)?;
    Ok(Json(ListedResponse { listed }))
}

pub async fn add_to_whitelist(
    State(state): State<AppState>,
    Json(entry): Json<ListEntry>,
) -> HandlerResult<StatusCode> {
    state
        .engine
        .add_to_whitelist(&entry)
        .await
        .map_err(engine_err)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_to_blacklist(
    State(state): State<AppState>,
    Json(entry): Json<ListEntry>,
) -> HandlerResult<StatusCode> {
    state
        .engine
        .add_to_blacklist(&entry)
        .await
        .map_err(engine_err)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_from_whitelist(
    State(state): State<AppState>,
    Json(entry): Json<ListEntry>,
) -> HandlerResult<StatusCode> {
    state
        .engine
        .delete_from_whitelist(&entry)
        .await
        .map_err(engine_err)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_from_blacklist(
    State(state): State<AppState>,
    Json(entry): Json<ListEntry>,
) -> HandlerResult<StatusCode> {
    state
        .engine
        .delete_from_blacklist(&entry)
        .await
        .map_err(engine_err)?;
    Ok(StatusCode::NO_CONTENT)
}
