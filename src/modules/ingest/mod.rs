use crate::state::AppState;
use axum::middleware;
use axum::routing::post;
use axum::Router;

pub mod dto;
pub mod handler;
pub mod service;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/videos/upload", post(handler::upload_video))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::role::admin_guard,
        ))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ))
}
