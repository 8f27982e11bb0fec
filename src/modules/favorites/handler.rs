use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::modules::auth::model::Viewer;
use crate::modules::favorites::model::FavoriteEntry;
use crate::state::AppState;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteStatus {
    pub content_id: String,
    pub favorite: bool,
}

fn status(content_id: String, favorite: bool, message: &str) -> impl IntoResponse {
    ApiSuccess(
        ApiResponse::success(FavoriteStatus { content_id, favorite }, message),
        StatusCode::OK,
    )
}

#[utoipa::path(
    get,
    path = "/api/v1/favorites",
    responses(
        (status = 200, description = "Favorites, newest first", body = ApiResponse<Vec<FavoriteEntry>>)
    ),
    tag = "Favorites"
)]
pub async fn list_favorites(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> impl IntoResponse {
    let favorites = state.favorites.list(&viewer).await;
    ApiSuccess(ApiResponse::success(favorites, "Favorites retrieved"), StatusCode::OK)
}

#[utoipa::path(
    get,
    path = "/api/v1/favorites/{content_id}",
    params(("content_id" = String, Path, description = "Content ID")),
    responses((status = 200, description = "Whether the item is a favorite", body = ApiResponse<FavoriteStatus>)),
    tag = "Favorites"
)]
pub async fn get_favorite(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(content_id): Path<String>,
) -> impl IntoResponse {
    let favorite = state.favorites.contains(&viewer, &content_id).await;
    status(content_id, favorite, "Favorite status retrieved")
}

#[utoipa::path(
    put,
    path = "/api/v1/favorites/{content_id}",
    params(("content_id" = String, Path, description = "Content ID")),
    responses(
        (status = 200, description = "Added to favorites", body = ApiResponse<FavoriteStatus>),
        (status = 503, description = "Favorites storage unavailable")
    ),
    tag = "Favorites"
)]
pub async fn add_favorite(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(content_id): Path<String>,
) -> impl IntoResponse {
    if !state.favorites.add(&viewer, &content_id).await {
        return ApiError("Favorites are temporarily unavailable".to_string(), StatusCode::SERVICE_UNAVAILABLE)
            .into_response();
    }
    status(content_id, true, "Added to favorites").into_response()
}

#[utoipa::path(
    delete,
    path = "/api/v1/favorites/{content_id}",
    params(("content_id" = String, Path, description = "Content ID")),
    responses(
        (status = 200, description = "Removed from favorites", body = ApiResponse<FavoriteStatus>),
        (status = 503, description = "Favorites storage unavailable")
    ),
    tag = "Favorites"
)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(content_id): Path<String>,
) -> impl IntoResponse {
    if !state.favorites.remove(&viewer, &content_id).await {
        return ApiError("Favorites are temporarily unavailable".to_string(), StatusCode::SERVICE_UNAVAILABLE)
            .into_response();
    }
    status(content_id, false, "Removed from favorites").into_response()
}
