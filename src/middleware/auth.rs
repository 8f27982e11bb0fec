use crate::common::response::ApiError;
use crate::modules::auth::dto::TokenClaims;
use crate::modules::auth::model::{DeviceId, UserRole, Viewer};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use tower_cookies::{Cookie, Cookies};
use tracing::warn;
use uuid::Uuid;

pub const DEVICE_COOKIE: &str = "device_id";

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// Reads the browser profile id, issuing a fresh one when the cookie is
/// missing or is not a UUID.
fn device_id(cookies: &Cookies) -> String {
    if let Some(cookie) = cookies.get(DEVICE_COOKIE) {
        match Uuid::parse_str(cookie.value()) {
            Ok(id) => return id.to_string(),
            Err(_) => warn!("Rejected malformed device cookie"),
        }
    }

    let id = Uuid::new_v4().to_string();
    let mut cookie = Cookie::new(DEVICE_COOKIE, id.clone());
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_max_age(Some(time::Duration::days(365)));
    cookies.add(cookie);
    id
}

/// Resolves the [`Viewer`] for every request: a valid bearer token makes an
/// authenticated viewer, anything else is the anonymous browser profile.
pub async fn session_middleware(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let device = device_id(&cookies);
    req.extensions_mut().insert(DeviceId(device.clone()));

    let token = match bearer_token(&req) {
        Some(t) => t,
        None => {
            req.extensions_mut().insert(Viewer::Anonymous { device_id: device });
            return Ok(next.run(req).await);
        }
    };

    // Revoked tokens are listed in the key-value store
    let is_blocked = state
        .kv
        .get(&format!("blocked_token:{}", token))
        .await
        .map_err(|e| {
            warn!("Token revocation check failed: {}", e);
            ApiError("Internal Server Error: session store unavailable".to_string(), StatusCode::INTERNAL_SERVER_ERROR)
        })?
        .is_some();

    if is_blocked {
        return Err(ApiError("Unauthorized: Token is blocked/revoked".to_string(), StatusCode::UNAUTHORIZED));
    }

    let claims = decode::<TokenClaims>(
        &token,
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError("Unauthorized: Invalid token signature".to_string(), StatusCode::UNAUTHORIZED))?
    .claims;

    let role = claims
        .role
        .parse::<UserRole>()
        .map_err(|_| ApiError("Unauthorized: Unknown role".to_string(), StatusCode::UNAUTHORIZED))?;

    req.extensions_mut().insert(Viewer::Authenticated { user_id: claims.sub, role });
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

pub async fn require_user(req: Request, next: Next) -> Result<Response, ApiError> {
    match req.extensions().get::<Viewer>() {
        Some(Viewer::Authenticated { .. }) => Ok(next.run(req).await),
        _ => Err(ApiError("Unauthorized: Sign in required".to_string(), StatusCode::UNAUTHORIZED)),
    }
}
