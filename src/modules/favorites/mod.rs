use axum::Router;
use axum::routing::get;
use crate::state::AppState;

pub mod handler;
pub mod model;
pub mod repository;
pub mod store;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/favorites", get(handler::list_favorites))
        .route(
            "/favorites/{content_id}",
            get(handler::get_favorite)
                .put(handler::add_favorite)
                .delete(handler::remove_favorite),
        )
}
