use crate::modules::auth::model::Viewer;
use crate::common::response::ApiError;
use axum::{
    extract::{Request, Extension},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

pub async fn admin_guard(
    Extension(viewer): Extension<Viewer>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match viewer {
        Viewer::Authenticated { .. } if viewer.is_admin() => Ok(next.run(req).await),
        Viewer::Authenticated { .. } => Err(ApiError("Forbidden: Admin access required".to_string(), StatusCode::FORBIDDEN)),
        Viewer::Anonymous { .. } => Err(ApiError("Unauthorized: Sign in required".to_string(), StatusCode::UNAUTHORIZED)),
    }
}
