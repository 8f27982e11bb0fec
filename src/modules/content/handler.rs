use crate::common::response::{ApiError, ApiResponse, ApiSuccess, Degraded};
use crate::modules::content::cache::{ContentError, Served};
use crate::modules::content::dto::*;
use crate::modules::content::model::{ContentRecord, ContentType, VideoSource};
use crate::modules::content::repository::StoreError;
use crate::modules::content::service::ContentService;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;
use validator::Validate;

fn degraded<T>(served: &Served<T>) -> Option<Degraded> {
    served.failure.as_ref().map(|failure| Degraded {
        source: served.origin.as_str().to_string(),
        retryable: true,
        reason: Some(failure.to_string()),
    })
}

fn list_response(served: Served<Vec<ContentRecord>>, message: &str) -> axum::response::Response {
    let degraded = degraded(&served);
    ApiSuccess(
        ApiResponse::success(served.value, message).with_degraded(degraded),
        StatusCode::OK,
    )
    .into_response()
}

fn content_error(e: ContentError) -> ApiError {
    let status = match &e {
        ContentError::NotFound(_) => StatusCode::NOT_FOUND,
        ContentError::Invalid(_) => StatusCode::BAD_REQUEST,
        ContentError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ContentError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        ContentError::Remote(StoreError::PermissionDenied(_)) => StatusCode::FORBIDDEN,
        ContentError::Remote(StoreError::Rejected(_)) => StatusCode::CONFLICT,
        ContentError::Remote(_) => StatusCode::BAD_GATEWAY,
    };
    ApiError(e.to_string(), status)
}

// --- READ MODEL ---

#[utoipa::path(
    get,
    path = "/api/v1/content",
    responses(
        (status = 200, description = "Full catalog", body = ApiResponse<Vec<ContentRecord>>)
    ),
    tag = "Content"
)]
pub async fn list_content(State(state): State<AppState>) -> impl IntoResponse {
    list_response(ContentService::list_all(state).await, "Content retrieved successfully")
}

#[utoipa::path(
    get,
    path = "/api/v1/content/{id}",
    params(
        ("id" = String, Path, description = "Content ID")
    ),
    responses(
        (status = 200, description = "Content details", body = ApiResponse<ContentRecord>),
        (status = 404, description = "Content not found"),
        (status = 503, description = "Catalog unreachable, retry later")
    ),
    tag = "Content"
)]
pub async fn get_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let served = ContentService::get(state, &id).await;
    let degraded = degraded(&served);

    match served.value {
        Some(record) => ApiSuccess(
            ApiResponse::success(record, "Content retrieved successfully").with_degraded(degraded),
            StatusCode::OK,
        )
        .into_response(),
        None if served.failure.is_some() => ApiError(
            "Content is temporarily unavailable, please retry".to_string(),
            StatusCode::SERVICE_UNAVAILABLE,
        )
        .into_response(),
        None => ApiError("Content not found".to_string(), StatusCode::NOT_FOUND).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/movies",
    responses(
        (status = 200, description = "List Movies", body = ApiResponse<Vec<ContentRecord>>)
    ),
    tag = "Content"
)]
pub async fn list_movies(State(state): State<AppState>) -> impl IntoResponse {
    list_response(
        ContentService::list_by_type(state, ContentType::Movie, None).await,
        "Movies retrieved successfully",
    )
}

#[utoipa::path(
    get,
    path = "/api/v1/series",
    params(SeriesQuery),
    responses(
        (status = 200, description = "List Series", body = ApiResponse<Vec<ContentRecord>>)
    ),
    tag = "Content"
)]
pub async fn list_series(
    State(state): State<AppState>,
    Query(query): Query<SeriesQuery>,
) -> impl IntoResponse {
    list_response(
        ContentService::list_by_type(state, ContentType::Series, query.anime).await,
        "Series retrieved successfully",
    )
}

// --- WRITE MODEL ---

#[utoipa::path(
    post,
    path = "/api/v1/content",
    request_body = CreateContentRequest,
    responses(
        (status = 201, description = "Content Created", body = ApiResponse<ContentRecord>),
        (status = 400, description = "Bad Request"),
        (status = 403, description = "Forbidden"),
        (status = 502, description = "Remote store rejected the write")
    ),
    tag = "Content",
    security(("bearer_auth" = []))
)]
pub async fn create_content(
    State(state): State<AppState>,
    Json(req): Json<CreateContentRequest>,
) -> impl IntoResponse {
    if let Err(e) = req.validate() {
        return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }

    match ContentService::create(state, req).await {
        Ok(record) => {
            info!(id = %record.id, "Admin created content");
            ApiSuccess(ApiResponse::success(record, "Content created successfully"), StatusCode::CREATED).into_response()
        }
        Err(e) => content_error(e).into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/v1/content/{id}",
    params(
        ("id" = String, Path, description = "Content ID")
    ),
    request_body = UpdateContentRequest,
    responses(
        (status = 200, description = "Content Updated", body = ApiResponse<ContentRecord>),
        (status = 400, description = "Bad Request"),
        (status = 404, description = "Content not found")
    ),
    tag = "Content",
    security(("bearer_auth" = []))
)]
pub async fn update_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateContentRequest>,
) -> impl IntoResponse {
    if let Err(e) = req.validate() {
        return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }

    match ContentService::update(state, &id, req).await {
        Ok(record) => ApiSuccess(ApiResponse::success(record, "Content updated successfully"), StatusCode::OK).into_response(),
        Err(e) => content_error(e).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/content/{id}",
    params(
        ("id" = String, Path, description = "Content ID")
    ),
    responses(
        (status = 200, description = "Content Deleted", body = ApiResponse<String>),
        (status = 404, description = "Content not found")
    ),
    tag = "Content",
    security(("bearer_auth" = []))
)]
pub async fn delete_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match ContentService::delete(state, &id).await {
        Ok(()) => ApiSuccess(ApiResponse::success(id, "Content deleted successfully"), StatusCode::OK).into_response(),
        Err(e) => content_error(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/content/{id}/sources/{source_id}/report",
    params(
        ("id" = String, Path, description = "Content ID"),
        ("source_id" = String, Path, description = "Video source ID"),
        ReportSourceQuery
    ),
    responses(
        (status = 200, description = "Report recorded", body = ApiResponse<VideoSource>),
        (status = 404, description = "Content, episode or source not found")
    ),
    tag = "Content"
)]
pub async fn report_source(
    State(state): State<AppState>,
    Path((id, source_id)): Path<(String, String)>,
    Query(query): Query<ReportSourceQuery>,
) -> impl IntoResponse {
    match ContentService::report_source(state, &id, &source_id, query.episode_id.as_deref()).await {
        Ok(source) => ApiSuccess(ApiResponse::success(source, "Report recorded"), StatusCode::OK).into_response(),
        Err(e) => content_error(e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/health/cache",
    responses(
        (status = 200, description = "Cache statistics", body = ApiResponse<CacheHealthResponse>)
    ),
    tag = "Health"
)]
pub async fn cache_health(State(state): State<AppState>) -> impl IntoResponse {
    let cache = state.content.stats().await;
    ApiSuccess(
        ApiResponse::success(
            CacheHealthResponse {
                status: "ok".to_string(),
                cache,
            },
            "Cache statistics",
        ),
        StatusCode::OK,
    )
}
