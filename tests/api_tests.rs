mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use catalog_cache::app::create_app;
use catalog_cache::modules::auth::dto::TokenClaims;
use catalog_cache::modules::content::model::RawDocument;
use catalog_cache::modules::content::seed::SEED_MOVIE_ID;
use catalog_cache::modules::progress::model::LoginPolicy;
use catalog_cache::modules::progress::model::WatchProgress;
use common::{Harness, JWT_SECRET, Mode, harness, movie_doc, series_doc};

const DEVICE_A: &str = "0b7e5e4c-4d1f-4c2a-9a57-1f2d3c4b5a60";
const DEVICE_B: &str = "6f1c2d3e-8a9b-4c0d-b1e2-f3a4b5c6d7e8";

fn catalog() -> Vec<RawDocument> {
    vec![
        RawDocument::new(
            "m1",
            json!({
                "title": "Heat",
                "type": "movie",
                "sources": [
                    { "id": "m1-src-1", "provider": "player.example", "embedUrl": "https://player.example/e/1" }
                ]
            }),
        ),
        movie_doc("m2", "Ronin"),
        series_doc("s1", "Frieren", true),
        series_doc("s2", "The Wire", false),
    ]
}

fn token(user_id: Uuid, role: &str) -> String {
    let now = time::OffsetDateTime::now_utc().unix_timestamp() as usize;
    let claims = TokenClaims {
        sub: user_id,
        role: role.to_string(),
        exp: now + 3600,
        iat: now,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}

fn spawn_app(policy: LoginPolicy) -> (Router, Harness) {
    let h = harness(catalog(), policy);
    (create_app(h.state.clone()), h)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
}

#[tokio::test]
async fn test_health_and_device_cookie() {
    let (app, _) = spawn_app(LoginPolicy::Discard);

    let response = app.clone().oneshot(get("/api/v1/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("device_id="));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .header(header::COOKIE, format!("device_id={}", DEVICE_A))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_catalog_reads() {
    let (app, h) = spawn_app(LoginPolicy::Discard);

    let (status, body) = send(&app, get("/api/v1/content")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 4);
    assert!(body.get("degraded").is_none());

    let (_, body) = send(&app, get("/api/v1/movies")).await;
    let movies: Vec<&str> = body["data"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(movies, vec!["m1", "m2"]);

    let (_, body) = send(&app, get("/api/v1/series?anime=true")).await;
    let anime = body["data"].as_array().unwrap();
    assert_eq!(anime.len(), 1);
    assert_eq!(anime[0]["id"], "s1");

    let (status, body) = send(&app, get("/api/v1/content/s2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["seasons"][0]["episodes"][1]["id"], "s2-s1e2");

    let (status, _) = send(&app, get("/api/v1/content/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, get("/api/v1/health/cache")).await;
    assert_eq!(body["data"]["cache"]["records"], 4);
    assert_eq!(common::MemoryContentStore::calls(&h.store.get_all_calls), 1);
}

#[tokio::test]
async fn test_degraded_reads_when_store_is_down() {
    let (app, h) = spawn_app(LoginPolicy::Discard);
    h.store.set_mode(Mode::Fail);

    let (status, body) = send(&app, get("/api/v1/movies")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], SEED_MOVIE_ID);
    assert_eq!(body["degraded"]["source"], "seed");
    assert_eq!(body["degraded"]["retryable"], true);

    let (status, body) = send(&app, get(&format!("/api/v1/content/{}", SEED_MOVIE_ID))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["degraded"]["source"], "seed");

    let (status, body) = send(&app, get("/api/v1/content/unknown-id")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_admin_writes() {
    let (app, h) = spawn_app(LoginPolicy::Discard);
    let new_movie = json!({ "id": "m3", "title": "Collateral", "type": "movie", "genres": ["Crime", " thriller "] });

    let request = |auth: Option<String>, body: &Value| {
        let mut builder = json_request("POST", "/api/v1/content");
        if let Some(token) = auth {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    };

    let (status, _) = send(&app, request(None, &new_movie)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, request(Some(token(Uuid::new_v4(), "USER")), &new_movie)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = token(Uuid::new_v4(), "ADMIN");
    let (status, body) = send(&app, request(Some(admin.clone()), &json!({ "title": "", "type": "movie" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, body) = send(&app, request(Some(admin.clone()), &new_movie)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["genres"], json!(["crime", "thriller"]));

    let (status, _) = send(&app, request(Some(admin.clone()), &new_movie)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send(&app, get("/api/v1/movies")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let update = Request::builder()
        .method("PUT")
        .uri("/api/v1/content/m2")
        .header(header::AUTHORIZATION, format!("Bearer {}", admin))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "seasons": [{ "number": 1, "episodes": [] }] }).to_string()))
        .unwrap();
    let (status, _) = send(&app, update).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let delete = Request::builder()
        .method("DELETE")
        .uri("/api/v1/content/m2")
        .header(header::AUTHORIZATION, format!("Bearer {}", admin))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get("/api/v1/content/m2")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(common::MemoryContentStore::calls(&h.store.write_calls) >= 3);
}

#[tokio::test]
async fn test_rejected_series_update_leaves_record_intact() {
    let (app, h) = spawn_app(LoginPolicy::Discard);
    let admin = token(Uuid::new_v4(), "ADMIN");

    let seasons = json!([{
        "number": 1,
        "episodes": [{ "id": "a", "number": 1 }, { "id": "b", "number": 1 }]
    }]);
    let update = json_request("PUT", "/api/v1/content/s2")
        .header(header::AUTHORIZATION, format!("Bearer {}", admin))
        .body(Body::from(json!({ "seasons": seasons }).to_string()))
        .unwrap();
    let (status, _) = send(&app, update).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(common::MemoryContentStore::calls(&h.store.write_calls), 0);

    let (status, body) = send(&app, get("/api/v1/content/s2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "The Wire");
    let (_, body) = send(&app, get("/api/v1/series")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_malformed_device_cookie_is_replaced() {
    let (app, h) = spawn_app(LoginPolicy::Upload);
    let other = WatchProgress::new("m2", 80.0, None, None, 10);
    h.kv.put(
        &format!("local:{}:progress:m2", DEVICE_B),
        &serde_json::to_string(&other).unwrap(),
    );

    let save = json_request("PUT", "/api/v1/progress/m1")
        .header(header::COOKIE, "device_id=*")
        .body(Body::from(json!({ "progress": 30.0 }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(save).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let issued = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(issued.starts_with("device_id="));
    assert!(!issued.starts_with("device_id=*"));
    assert!(h.kv.raw("local:*:progress:m1").is_none());

    let list = Request::builder()
        .uri("/api/v1/progress")
        .header(header::COOKIE, "device_id=*")
        .body(Body::empty())
        .unwrap();
    let (_, body) = send(&app, list).await;
    assert_eq!(body["data"], json!([]));

    let user = Uuid::new_v4();
    let reconcile = Request::builder()
        .method("POST")
        .uri("/api/v1/progress/reconcile")
        .header(header::COOKIE, "device_id=local:")
        .header(header::AUTHORIZATION, format!("Bearer {}", token(user, "USER")))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, reconcile).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["uploaded"], 0);
    assert!(h.progress_remote.record(user, "m2").is_none());
    assert!(h.kv.raw(&format!("local:{}:progress:m2", DEVICE_B)).is_some());
}

#[tokio::test]
async fn test_revoked_tokens_are_rejected() {
    let (app, h) = spawn_app(LoginPolicy::Discard);
    let admin = token(Uuid::new_v4(), "ADMIN");
    h.kv.put(&format!("blocked_token:{}", admin), "1");

    let request = Request::builder()
        .uri("/api/v1/progress")
        .header(header::AUTHORIZATION, format!("Bearer {}", admin))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/v1/progress")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_source_reports() {
    let (app, _) = spawn_app(LoginPolicy::Discard);

    let report = || {
        Request::builder()
            .method("POST")
            .uri("/api/v1/content/m1/sources/m1-src-1/report")
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = send(&app, report()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["reportCount"], 1);
    assert_eq!(body["data"]["isWorking"], true);

    send(&app, report()).await;
    let (_, body) = send(&app, report()).await;
    assert_eq!(body["data"]["reportCount"], 3);
    assert_eq!(body["data"]["isWorking"], false);

    let (_, body) = send(&app, get("/api/v1/content/m1")).await;
    assert_eq!(body["data"]["sources"][0]["isWorking"], false);

    let missing = Request::builder()
        .method("POST")
        .uri("/api/v1/content/m1/sources/nope/report")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_anonymous_progress_round_trip() {
    let (app, _) = spawn_app(LoginPolicy::Discard);

    let save = |progress: f64| {
        json_request("PUT", "/api/v1/progress/s1")
            .header(header::COOKIE, format!("device_id={}", DEVICE_A))
            .body(Body::from(
                json!({ "progress": progress, "seasonId": "1", "episodeId": "s1-s1e2" }).to_string(),
            ))
            .unwrap()
    };

    let (status, body) = send(&app, save(40.0)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["completed"], false);

    let (status, _) = send(&app, save(150.0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let read = |cookie: &str, episode: &str| {
        Request::builder()
            .uri(format!("/api/v1/progress/s1?seasonId=1&episodeId={}", episode))
            .header(header::COOKIE, format!("device_id={}", cookie))
            .body(Body::empty())
            .unwrap()
    };

    let (_, body) = send(&app, read(DEVICE_A, "s1-s1e2")).await;
    assert_eq!(body["data"]["progress"], 40.0);
    let (_, body) = send(&app, read(DEVICE_A, "s1-s1e1")).await;
    assert_eq!(body["data"]["progress"], 0.0);
    let (_, body) = send(&app, read(DEVICE_B, "s1-s1e2")).await;
    assert_eq!(body["data"]["progress"], 0.0);
}

#[tokio::test]
async fn test_reconcile_after_sign_in() {
    let (app, h) = spawn_app(LoginPolicy::Upload);
    let user = Uuid::new_v4();

    let save = json_request("PUT", "/api/v1/progress/m1")
        .header(header::COOKIE, format!("device_id={}", DEVICE_A))
        .body(Body::from(json!({ "progress": 55.0 }).to_string()))
        .unwrap();
    send(&app, save).await;

    let anonymous = Request::builder()
        .method("POST")
        .uri("/api/v1/progress/reconcile")
        .header(header::COOKIE, format!("device_id={}", DEVICE_A))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, anonymous).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let signed_in = Request::builder()
        .method("POST")
        .uri("/api/v1/progress/reconcile")
        .header(header::COOKIE, format!("device_id={}", DEVICE_A))
        .header(header::AUTHORIZATION, format!("Bearer {}", token(user, "USER")))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, signed_in).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["policy"], "upload");
    assert_eq!(body["data"]["uploaded"], 1);

    assert_eq!(h.progress_remote.record(user, "m1").map(|p| p.progress), Some(55.0));

    let list = Request::builder()
        .uri("/api/v1/progress")
        .header(header::AUTHORIZATION, format!("Bearer {}", token(user, "USER")))
        .body(Body::empty())
        .unwrap();
    let (_, body) = send(&app, list).await;
    assert_eq!(body["data"][0]["contentId"], "m1");
}

#[tokio::test]
async fn test_favorites() {
    let (app, _) = spawn_app(LoginPolicy::Discard);

    let call = |method: &str, uri: &str| {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, format!("device_id={}", DEVICE_A))
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = send(&app, call("PUT", "/api/v1/favorites/m1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["favorite"], true);
    send(&app, call("PUT", "/api/v1/favorites/s1")).await;

    let (_, body) = send(&app, call("GET", "/api/v1/favorites")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    send(&app, call("DELETE", "/api/v1/favorites/m1")).await;
    let (_, body) = send(&app, call("GET", "/api/v1/favorites/m1")).await;
    assert_eq!(body["data"]["favorite"], false);
}
