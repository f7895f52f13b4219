//! The passport API through the full router and middleware stack.
//!
//! Requests carry the headers the upstream gateway adds (the shared secret
//! and the authenticated user) and the peer address the rate limiter keys on.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Method, Request, StatusCode},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use tourpass_server::middleware::{ClientIpKeyExtractor, GATEWAY_SECRET_HEADER, USER_ID_HEADER};
use tourpass_server::services::CheckInService;
use tourpass_server::state::AppState;

use tourpass_integration_tests::{
    GATEWAY_SECRET, app_state, bonito_store, gruta_location, north_of, no_cooldown_config,
    rio_sucuri_location, seed_bonito_rewards,
};

const CLIENT_ADDR: &str = "203.0.113.7:51000";

async fn app() -> Router {
    tourpass_server::app(app_state(bonito_store().await, no_cooldown_config())).unwrap()
}

struct Call {
    method: Method,
    uri: String,
    body: Option<Value>,
    user: Option<String>,
    secret: Option<&'static str>,
    peer: SocketAddr,
    forwarded_for: Option<String>,
}

impl Call {
    fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            body: None,
            user: Some("7".to_owned()),
            secret: Some(GATEWAY_SECRET),
            peer: CLIENT_ADDR.parse().unwrap(),
            forwarded_for: None,
        }
    }

    fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    fn post(uri: impl Into<String>, body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new(Method::POST, uri)
        }
    }

    async fn send(self, app: &Router) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        if let Some(forwarded_for) = self.forwarded_for {
            builder = builder.header("x-forwarded-for", forwarded_for);
        }
        if let Some(secret) = self.secret {
            builder = builder.header(GATEWAY_SECRET_HEADER, secret);
        }
        if let Some(user) = self.user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        let mut request = match self.body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        request.extensions_mut().insert(ConnectInfo(self.peer));

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

fn near_rio_sucuri(meters: f64) -> Value {
    let point = north_of(rio_sucuri_location(), meters);
    json!({ "latitude": point.latitude(), "longitude": point.longitude() })
}

#[tokio::test]
async fn test_bonito_scenario_over_http() {
    let app = app().await;

    let (status, body) = Call::post("/api/checkpoints/11/check-in", near_rio_sucuri(30.0))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["method"], "geofence");
    assert_eq!(body["points_awarded"], 20);
    assert_eq!(body["stamp"]["checkpoint_id"], 11);
    assert_eq!(body["geofence"]["within_radius"], true);

    let (status, body) = Call::post(
        "/api/checkpoints/12/check-in",
        json!({ "code": "bonito2025" }),
    )
    .send(&app)
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["method"], "code");

    let (status, body) = Call::post("/api/checkpoints/11/check-in", near_rio_sucuri(5.0))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_completed");

    let (status, body) = Call::post(
        "/api/checkpoints/12/check-in",
        json!({ "code": "BONITO2025" }),
    )
    .send(&app)
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_completed");

    let (status, body) = Call::get("/api/routes/1/progress").send(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["collected_fragments"], 2);
    assert_eq!(body["completion_percentage"], 67);
}

#[tokio::test]
async fn test_gateway_headers_required() {
    let app = app().await;

    let (status, body) = Call {
        secret: None,
        ..Call::get("/api/passport")
    }
    .send(&app)
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = Call {
        secret: Some("not-the-gateway"),
        ..Call::get("/api/passport")
    }
    .send(&app)
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = Call {
        user: Some("abc".to_owned()),
        ..Call::get("/api/passport")
    }
    .send(&app)
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = Call {
        user: None,
        ..Call::post("/api/checkpoints/11/check-in", near_rio_sucuri(0.0))
    }
    .send(&app)
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rejections_map_to_statuses() {
    let app = app().await;

    let (status, body) = Call::post("/api/checkpoints/13/check-in", json!({}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["error"], "locked");
    assert_eq!(body["blocked_by"], json!([11, 12]));

    let (status, body) = Call::post("/api/checkpoints/11/check-in", near_rio_sucuri(80.0))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "out_of_range");
    assert_eq!(body["distance_meters"], 80.0);
    assert_eq!(body["required_radius_meters"], 50.0);

    let (status, body) = Call::post("/api/checkpoints/11/check-in", json!({}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "location_required");

    let (status, body) = Call::post("/api/checkpoints/11/check-in", json!({ "latitude": -20.4 }))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, body) = Call::post("/api/checkpoints/99/check-in", json!({}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_partner_code_endpoint() {
    let app = app().await;

    let (status, body) = Call::post(
        "/api/checkpoints/12/partner-code",
        json!({ "code": " Bonito2025 " }),
    )
    .send(&app)
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "points": 20 }));

    let (status, body) = Call::post(
        "/api/checkpoints/12/partner-code",
        json!({ "code": "PANTANAL" }),
    )
    .send(&app)
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_code");
    assert!(!body["message"].as_str().unwrap().contains("BONITO"));
}

#[tokio::test]
async fn test_wrong_partner_codes_are_limited_per_user() {
    let app = app().await;

    for _ in 0..5 {
        let (status, body) = Call::post(
            "/api/checkpoints/12/partner-code",
            json!({ "code": "BONITO0000" }),
        )
        .send(&app)
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid_code");
    }

    // Even the right code is refused until the window passes.
    let (status, body) = Call::post(
        "/api/checkpoints/12/partner-code",
        json!({ "code": "BONITO2025" }),
    )
    .send(&app)
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limited");

    // Another visitor is unaffected.
    let (status, _) = Call {
        user: Some("8".to_owned()),
        ..Call::post(
            "/api/checkpoints/12/partner-code",
            json!({ "code": "BONITO2025" }),
        )
    }
    .send(&app)
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_code_check_ins_share_the_wrong_code_limit() {
    let app = app().await;

    let (status, _) = Call::post("/api/checkpoints/11/check-in", near_rio_sucuri(10.0))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    for _ in 0..3 {
        let (status, _) = Call::post(
            "/api/checkpoints/12/partner-code",
            json!({ "code": "BONITO0000" }),
        )
        .send(&app)
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
    for _ in 0..2 {
        let (status, body) = Call::post(
            "/api/checkpoints/12/check-in",
            json!({ "code": "BONITO0000" }),
        )
        .send(&app)
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid_code");
    }

    let (status, body) = Call::post(
        "/api/checkpoints/12/check-in",
        json!({ "code": "BONITO2025" }),
    )
    .send(&app)
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limited");
}

/// Distinct users from one address, each with a fresh `x-forwarded-for`.
async fn spoofed_burst(app: &Router, requests: u16) -> usize {
    let mut limited = 0;
    for i in 0..requests {
        let (status, _) = Call {
            user: Some((100 + i).to_string()),
            forwarded_for: Some(format!("198.51.100.{}", i + 1)),
            ..Call::post(
                "/api/checkpoints/12/partner-code",
                json!({ "code": "BONITO0000" }),
            )
        }
        .send(app)
        .await;
        if status == StatusCode::TOO_MANY_REQUESTS {
            limited += 1;
        }
    }
    limited
}

#[tokio::test]
async fn test_forwarded_for_ignored_without_trusted_proxy() {
    let app = app().await;
    assert!(spoofed_burst(&app, 20).await >= 5);
}

#[tokio::test]
async fn test_forwarded_for_keys_limiter_behind_trusted_proxy() {
    let state = AppState::new(
        CheckInService::new(bonito_store().await, no_cooldown_config()),
        SecretString::from(GATEWAY_SECRET),
        ClientIpKeyExtractor::behind_proxy(),
    );
    let app = tourpass_server::app(state).unwrap();
    assert_eq!(spoofed_burst(&app, 20).await, 0);
}

#[tokio::test]
async fn test_completing_route_unlocks_rewards_and_totals() {
    let store = bonito_store().await;
    seed_bonito_rewards(&store).await;
    let app = tourpass_server::app(app_state(store, no_cooldown_config())).unwrap();

    let (status, view) = Call::get("/api/routes/1").send(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["route"]["name"], "Circuito Bonito");
    assert_eq!(view["checkpoints"].as_array().unwrap().len(), 3);
    assert_eq!(view["checkpoints"][0]["reachable"], true);
    assert_eq!(view["checkpoints"][1]["reachable"], false);
    assert!(view["checkpoints"][1].get("partner_code").is_none());
    assert_eq!(view["rewards"].as_array().unwrap().len(), 2);

    Call::post("/api/checkpoints/11/check-in", near_rio_sucuri(10.0))
        .send(&app)
        .await;
    let (_, receipt) = Call::post(
        "/api/checkpoints/12/check-in",
        json!({ "code": "BONITO2025" }),
    )
    .send(&app)
    .await;
    assert!(receipt.get("rewards_unlocked").is_none());

    let gruta = gruta_location();
    let (status, receipt) = Call::post(
        "/api/checkpoints/13/check-in",
        json!({
            "latitude": gruta.latitude(),
            "longitude": gruta.longitude(),
            "photo_url": "https://cdn.example.com/gruta.jpg",
        }),
    )
    .send(&app)
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["route_completed"], true);
    let unlocked = receipt["rewards_unlocked"].as_array().unwrap();
    assert_eq!(unlocked.len(), 1);
    assert_eq!(unlocked[0]["reward_id"], 21);
    assert!(unlocked[0]["voucher_code"].as_str().unwrap().starts_with("JOAO-"));

    let (status, passport) = Call::get("/api/passport").send(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(passport["total_stamps"], 3);
    assert_eq!(passport["total_points"], 90);
    assert_eq!(passport["total_routes_completed"], 1);
    assert_eq!(passport["vouchers"].as_array().unwrap().len(), 1);

    let (_, view) = Call::get("/api/routes/1").send(&app).await;
    assert_eq!(view["progress"]["completion_percentage"], 100);
    assert!(view["checkpoints"][2]["stamped_at"].is_string());
}

#[tokio::test]
async fn test_route_view_unknown_route() {
    let app = app().await;
    let (status, body) = Call::get("/api/routes/42").send(&app).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_reachability_and_geofence_distance() {
    let app = app().await;

    let (status, body) = Call::get("/api/checkpoints/12/reachability")
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "reachable": false, "blocked_by": [11] }));

    let point = north_of(rio_sucuri_location(), 40.0);
    let (status, body) = Call::get(format!(
        "/api/checkpoints/11/geofence?latitude={}&longitude={}",
        point.latitude(),
        point.longitude()
    ))
    .send(&app)
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["checkpoint_name"], "Rio Sucuri");
    assert!((body["distance_meters"].as_f64().unwrap() - 40.0).abs() < 0.5);

    let (status, _) = Call::post("/api/checkpoints/11/check-in", near_rio_sucuri(10.0))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = Call::get("/api/checkpoints/12/reachability")
        .send(&app)
        .await;
    assert_eq!(body["reachable"], true);
}

#[tokio::test]
async fn test_passport_and_health() {
    let app = app().await;

    let (status, first) = Call::get("/api/passport").send(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["user_id"], 7);
    assert!(first["passport_number"].as_str().unwrap().starts_with("MS-"));

    let (_, second) = Call::get("/api/passport").send(&app).await;
    assert_eq!(first["passport_number"], second["passport_number"]);

    let (status, _) = Call::get("/health/ready").send(&app).await;
    assert_eq!(status, StatusCode::OK);
}
