pub mod auth;
pub mod common;
pub mod lists;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::types::AppState;

pub use auth::{authorize, clean_bucket};
pub use common::{admin_auth, engine_err, health, internal_err};
pub use lists::{
    add_to_blacklist, add_to_whitelist, check_blacklist, check_whitelist, delete_from_blacklist,
    delete_from_whitelist, get_blacklist, get_whitelist,
};

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/auth", post(authorize));

    let protected_routes = Router::new()
        .route("/bucket/clean", post(clean_bucket))
        .route(
            "/whitelist",
            get(get_whitelist)
                .post(add_to_whitelist)
                .delete(delete_from_whitelist),
        )
        .route("/whitelist/entry", get(check_whitelist))
        .route(
            "/blacklist",
            get(get_blacklist)
                .post(add_to_blacklist)
                .delete(delete_from_blacklist),
        )
        .route("/blacklist/entry", get(check_blacklist))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth));

    let api_routes = Router::new().merge(public_routes).merge(protected_routes);

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
