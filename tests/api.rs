use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, TimeZone, Utc};
use geotrack::{
    AppState,
    cache::ManualClock,
    config::Config,
    database::Stores,
    router::create_router,
    routing::{FetchError, JsonFetcher},
    utils::{Claims, error_codes},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

struct Offline;

#[async_trait]
impl JsonFetcher for Offline {
    async fn fetch_json(&self, _url: &str) -> Result<Value, FetchError> {
        Err(FetchError::Network("connection refused".into()))
    }
}

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
}

fn app() -> TestApp {
    let vars = HashMap::from([
        ("SERVER_HOST", "127.0.0.1"),
        ("JWT_SECRET", SECRET),
        ("API_BASE_URI", "/api"),
    ]);
    let config = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
    ));
    let state = AppState::new(config, Stores::memory(), Arc::new(Offline), clock.clone());
    TestApp {
        router: create_router(state, None),
        clock,
    }
}

fn token(user_id: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 3600,
        iat: now,
        is_temp: false,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

impl TestApp {
    async fn call(&self, method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn create_path(&self, user: &str, source: (f64, f64), destination: (f64, f64)) -> Value {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/paths",
                Some(user),
                Some(json!({
                    "source": {"lat": source.0, "lng": source.1},
                    "destination": {"lat": destination.0, "lng": destination.1}
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["resp_data"].clone()
    }

    async fn report(&self, user: &str, lat: f64, lng: f64) {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/locations",
                Some(user),
                Some(json!({"latitude": lat, "longitude": lng, "display_name": user.to_uppercase()})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = app();
    let (status, body) = app.call(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resp_data"], "ok");
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = app();
    let (status, body) = app.call(Method::GET, "/api/paths/mine", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], error_codes::AUTH_FAILED);

    let request = Request::builder()
        .uri("/api/paths/mine")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn new_user_has_no_path_yet() {
    let app = app();
    let (status, body) = app.call(Method::GET, "/api/paths/mine", Some("newbie"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], error_codes::NO_PATH);
    assert!(body["resp_data"].is_null());

    let (status, body) = app
        .call(Method::GET, "/api/paths/nearby-users", Some("newbie"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], error_codes::NO_PATH);
}

#[tokio::test]
async fn create_path_falls_back_to_straight_line_when_routing_is_down() {
    let app = app();
    let path = app.create_path("alice", (28.6139, 77.2090), (19.0760, 72.8777)).await;
    assert_eq!(path["geometry"], "LINESTRING(77.209 28.6139, 72.8777 19.076)");
    assert_eq!(path["owner_id"], "alice");
    assert_eq!(path["source"], json!({"lat": 28.6139, "lng": 77.209}));

    let (_, mine) = app.call(Method::GET, "/api/paths/mine", Some("alice"), None).await;
    assert_eq!(mine["resp_data"]["path_id"], path["path_id"]);
}

#[tokio::test]
async fn new_path_supersedes_old_one() {
    let app = app();
    let first = app.create_path("alice", (0.0, 0.0), (0.0, 1.0)).await;
    let second = app.create_path("alice", (1.0, 0.0), (1.0, 1.0)).await;
    assert_ne!(first["path_id"], second["path_id"]);

    let uri = format!("/api/paths/nearby-users?path_id={}", first["path_id"].as_str().unwrap());
    let (status, body) = app.call(Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], error_codes::NOT_FOUND);
}

#[tokio::test]
async fn invalid_coordinates_are_rejected() {
    let app = app();
    let (status, body) = app
        .call(
            Method::POST,
            "/api/paths",
            Some("alice"),
            Some(json!({"source": {"lat": 95.0, "lng": 0.0}, "destination": {"lat": 0.0, "lng": 0.0}})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], error_codes::VALIDATION_ERROR);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/locations",
            Some("alice"),
            Some(json!({"latitude": 0.0, "longitude": 200.0})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn nearby_users_respects_radius() {
    let app = app();
    app.create_path("owner", (0.0, 0.0), (10.0, 0.0)).await;
    app.report("bob", 5.0, 0.001).await;

    let (status, body) = app
        .call(Method::GET, "/api/paths/nearby-users?radius=200", Some("owner"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["resp_data"];
    assert_eq!(data["radius"], 200.0);
    assert_eq!(data["cached"], false);
    let users = data["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["userId"], "bob");
    assert_eq!(users[0]["displayName"], "BOB");
    assert_eq!(users[0]["latitude"], 5.0);
    assert_eq!(users[0]["longitude"], 0.001);
    let distance = users[0]["distanceMeters"].as_f64().unwrap();
    assert!((distance - 110.8).abs() < 1.0, "got {distance}");

    let (_, body) = app
        .call(Method::GET, "/api/paths/nearby-users?radius=50", Some("owner"), None)
        .await;
    assert!(body["resp_data"]["users"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn default_radius_is_used_and_capped() {
    let app = app();
    app.create_path("owner", (0.0, 0.0), (10.0, 0.0)).await;

    let (_, body) = app
        .call(Method::GET, "/api/paths/nearby-users", Some("owner"), None)
        .await;
    assert_eq!(body["resp_data"]["radius"], 500.0);

    let (_, body) = app
        .call(Method::GET, "/api/paths/nearby-users?radius=100000", Some("owner"), None)
        .await;
    assert_eq!(body["resp_data"]["radius"], 5000.0);

    let (status, body) = app
        .call(Method::GET, "/api/paths/nearby-users?radius=-3", Some("owner"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], error_codes::VALIDATION_ERROR);
}

#[tokio::test]
async fn repeated_polls_are_cached_until_someone_moves() {
    let app = app();
    app.create_path("owner", (0.0, 0.0), (10.0, 0.0)).await;
    app.report("bob", 5.0, 0.001).await;

    let uri = "/api/paths/nearby-users?radius=300";
    let (_, first) = app.call(Method::GET, uri, Some("owner"), None).await;
    assert_eq!(first["resp_data"]["cached"], false);

    app.clock.advance(Duration::seconds(3));
    let (_, second) = app.call(Method::GET, uri, Some("owner"), None).await;
    assert_eq!(second["resp_data"]["cached"], true);
    assert_eq!(second["resp_data"]["users"], first["resp_data"]["users"]);

    app.report("carol", 5.0, -0.002).await;
    let (_, third) = app.call(Method::GET, uri, Some("owner"), None).await;
    assert_eq!(third["resp_data"]["cached"], false);
    assert_eq!(third["resp_data"]["users"].as_array().unwrap().len(), 2);

    app.clock.advance(Duration::seconds(6));
    let (_, fourth) = app.call(Method::GET, uri, Some("owner"), None).await;
    assert_eq!(fourth["resp_data"]["cached"], false);
}

#[tokio::test]
async fn intersecting_only_filter() {
    let app = app();
    let path = app.create_path("owner", (0.0, 0.0), (0.0, 1.0)).await;
    app.report("crosser", 0.001, 0.4).await;
    app.report("idle", 0.001, 0.6).await;
    app.create_path("crosser", (-0.5, 0.4), (0.5, 0.4)).await;

    let uri = format!(
        "/api/paths/nearby-users?path_id={}&intersecting_only=true",
        path["path_id"].as_str().unwrap()
    );
    let (_, body) = app.call(Method::GET, &uri, Some("owner"), None).await;
    let users = body["resp_data"]["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["userId"], "crosser");
}

#[tokio::test]
async fn crossing_paths_lists_other_owners() {
    let app = app();
    app.create_path("me", (0.0, 0.0), (10.0, 10.0)).await;
    let x = app.create_path("x", (0.0, 10.0), (10.0, 0.0)).await;
    app.create_path("far", (40.0, 40.0), (41.0, 41.0)).await;

    let (status, body) = app.call(Method::GET, "/api/paths/crossing", Some("me"), None).await;
    assert_eq!(status, StatusCode::OK);
    let paths = body["resp_data"].as_array().unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0]["path_id"], x["path_id"]);
}

#[tokio::test]
async fn delete_path() {
    let app = app();
    app.create_path("alice", (0.0, 0.0), (0.0, 1.0)).await;

    let (status, body) = app.call(Method::DELETE, "/api/paths/mine", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resp_data"]["success"], true);

    let (_, body) = app.call(Method::DELETE, "/api/paths/mine", Some("alice"), None).await;
    assert_eq!(body["code"], error_codes::NO_PATH);
}
