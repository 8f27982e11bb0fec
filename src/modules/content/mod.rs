use axum::Router;
use axum::routing::{get, post};
use crate::state::AppState;
use axum::middleware;

pub mod cache;
pub mod dto;
pub mod handler;
pub mod model;
pub mod repository;
pub mod seed;
pub mod service;

pub fn router() -> axum::Router<AppState> {
    let public_routes = Router::new()
        .route("/content", get(handler::list_content))
        .route("/content/{id}", get(handler::get_content))
        .route("/content/{id}/sources/{source_id}/report", post(handler::report_source))
        .route("/movies", get(handler::list_movies))
        .route("/series", get(handler::list_series))
        .route("/health/cache", get(handler::cache_health));

    let protected_routes = Router::new()
        .route("/content", post(handler::create_content))
        .route("/content/{id}", axum::routing::put(handler::update_content).delete(handler::delete_content))
        .route_layer(middleware::from_fn(crate::middleware::role::admin_guard));

    public_routes.merge(protected_routes)
}
