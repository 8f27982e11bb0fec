use crate::common::response::{ApiError, ApiResponse, ApiSuccess, Degraded};
use crate::modules::auth::model::{DeviceId, Viewer};
use crate::modules::progress::dto::*;
use crate::modules::progress::model::{ReconcileReport, WatchProgress};
use crate::state::AppState;
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

#[utoipa::path(
    get,
    path = "/api/v1/progress/{content_id}",
    params(
        ("content_id" = String, Path, description = "Content ID"),
        ProgressQuery
    ),
    responses(
        (status = 200, description = "Resume position, 0 when not started", body = ApiResponse<ProgressResponse>)
    ),
    tag = "Progress"
)]
pub async fn get_progress(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(content_id): Path<String>,
    Query(query): Query<ProgressQuery>,
) -> impl IntoResponse {
    let progress = state
        .progress
        .get_progress(&viewer, &content_id, query.season_id.as_deref(), query.episode_id.as_deref())
        .await;

    ApiSuccess(
        ApiResponse::success(
            ProgressResponse {
                content_id,
                season_id: query.season_id,
                episode_id: query.episode_id,
                progress,
            },
            "Progress retrieved",
        ),
        StatusCode::OK,
    )
}

#[utoipa::path(
    put,
    path = "/api/v1/progress/{content_id}",
    params(
        ("content_id" = String, Path, description = "Content ID")
    ),
    request_body = SaveProgressRequest,
    responses(
        (status = 200, description = "Progress saved", body = ApiResponse<WatchProgress>),
        (status = 202, description = "Progress accepted but not persisted"),
        (status = 400, description = "Bad Request")
    ),
    tag = "Progress"
)]
pub async fn save_progress(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(content_id): Path<String>,
    Json(req): Json<SaveProgressRequest>,
) -> impl IntoResponse {
    if let Err(e) = req.validate() {
        return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }

    let saved = state
        .progress
        .save_progress(
            &viewer,
            &content_id,
            req.progress,
            req.season_id.as_deref(),
            req.episode_id.as_deref(),
        )
        .await;

    match saved {
        Some(record) => ApiSuccess(ApiResponse::success(record, "Progress saved"), StatusCode::OK).into_response(),
        None => ApiSuccess(
            ApiResponse::success(
                ProgressResponse {
                    content_id,
                    season_id: req.season_id,
                    episode_id: req.episode_id,
                    progress: req.progress,
                },
                "Progress could not be stored",
            )
            .with_degraded(Some(Degraded {
                source: "none".to_string(),
                retryable: true,
                reason: None,
            })),
            StatusCode::ACCEPTED,
        )
        .into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/progress",
    responses(
        (status = 200, description = "Continue watching, newest first", body = ApiResponse<Vec<WatchProgress>>)
    ),
    tag = "Progress"
)]
pub async fn list_progress(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> impl IntoResponse {
    let records = state.progress.list_progress(&viewer).await;
    ApiSuccess(ApiResponse::success(records, "Progress retrieved"), StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/api/v1/progress/reconcile",
    responses(
        (status = 200, description = "Anonymous progress reconciled", body = ApiResponse<ReconcileReport>),
        (status = 401, description = "Sign in required"),
        (status = 503, description = "Local storage unavailable")
    ),
    tag = "Progress",
    security(("bearer_auth" = []))
)]
pub async fn reconcile_progress(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
) -> impl IntoResponse {
    let Some(user_id) = viewer.user_id() else {
        return ApiError("Unauthorized: Sign in required".to_string(), StatusCode::UNAUTHORIZED).into_response();
    };

    match state.progress.reconcile_login(&device_id, user_id).await {
        Ok(report) => ApiSuccess(ApiResponse::success(report, "Progress reconciled"), StatusCode::OK).into_response(),
        Err(e) => ApiError(e.to_string(), StatusCode::SERVICE_UNAVAILABLE).into_response(),
    }
}
