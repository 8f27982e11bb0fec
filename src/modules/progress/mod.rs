use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use crate::state::AppState;

pub mod dto;
pub mod handler;
pub mod model;
pub mod repository;
pub mod store;

pub fn router() -> Router<AppState> {
    let viewer_routes = Router::new()
        .route("/progress", get(handler::list_progress))
        .route("/progress/{content_id}", get(handler::get_progress).put(handler::save_progress));

    let signed_in_routes = Router::new()
        .route("/progress/reconcile", post(handler::reconcile_progress))
        .route_layer(middleware::from_fn(crate::middleware::auth::require_user));

    viewer_routes.merge(signed_in_routes)
}
