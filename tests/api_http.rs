// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use es_alert::api;
use es_alert::config::Settings;
use es_alert::dashboard::{Dashboard, Sources};
use es_alert::flags::MemoryFlagStore;
use es_alert::notify::RecordingSink;
use es_alert::source::FixtureSource;

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router(authorized: bool) -> Router {
    let sources = Sources {
        alert: Arc::new(FixtureSource::status("alert", 404)),
        feed: Arc::new(FixtureSource::ok("ticker", "<rss><channel></channel></rss>")),
        muf: Arc::new(FixtureSource::status("muf", 502)),
        version: Arc::new(FixtureSource::status("version", 404)),
    };
    let d = Dashboard::new(
        Settings::default(),
        sources,
        Arc::new(MemoryFlagStore::new()),
        Arc::new(RecordingSink::new()),
        Arc::new(move || authorized),
    );
    api::router(d)
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Vec<u8>) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app
        .oneshot(req.body(body).expect("build request"))
        .await
        .expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

fn as_json(bytes: &[u8]) -> Json {
    serde_json::from_slice(bytes).expect("json body")
}

#[tokio::test]
async fn health_returns_ok() {
    let (status, body) = send(test_router(false), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "OK");
}

#[tokio::test]
async fn ticker_slot_starts_with_loading_placeholder() {
    let (status, body) = send(test_router(false), "GET", "/ticker", None).await;
    assert_eq!(status, StatusCode::OK);
    let v = as_json(&body);
    assert_eq!(v["text"], "Loading logs…");
    assert!(v["link"].is_null());

    let (_, body) = send(test_router(false), "GET", "/ticker/entries", None).await;
    assert_eq!(as_json(&body), json!([]));
}

#[tokio::test]
async fn alert_toggle_is_gated_by_authorization() {
    let (status, body) = send(test_router(false), "POST", "/alert/toggle", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(as_json(&body)["result"], "denied");

    let (status, body) = send(test_router(true), "POST", "/alert/toggle", None).await;
    assert_eq!(status, StatusCode::OK);
    let v = as_json(&body);
    assert_eq!(v["result"], "toggled");
    assert_eq!(v["active"], false);
}

#[tokio::test]
async fn alert_status_has_expected_fields() {
    let (status, body) = send(test_router(false), "GET", "/alert/status", None).await;
    assert_eq!(status, StatusCode::OK);
    let v = as_json(&body);
    assert_eq!(v["active"], true);
    assert_eq!(v["recent_alert"], false);
    assert!(v["last_shown"].is_null());
    assert_eq!(v["latest_directions"], json!([]));
}

#[tokio::test]
async fn map_without_alert_is_not_found() {
    let (status, body) = send(test_router(false), "GET", "/map", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "No map information is currently available for the configured OMID."
    );
}

#[tokio::test]
async fn map_geometry_put_then_get() {
    let app = test_router(false);
    let (status, body) = send(app.clone(), "GET", "/map/geometry", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body), json!({"x": 100, "y": 100, "width": 600, "height": 600}));

    let g = json!({"x": 10, "y": 20, "width": 640, "height": 480});
    let (status, body) = send(app.clone(), "PUT", "/map/geometry", Some(g.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body), g);

    let (_, body) = send(app, "GET", "/map/geometry", None).await;
    assert_eq!(as_json(&body), g);
}

#[tokio::test]
async fn panel_toggle_flips_and_rejects_unknown_panels() {
    let app = test_router(false);
    let (status, body) = send(app.clone(), "POST", "/panels/ticker/toggle", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body), json!({"panel": "ticker", "hidden": true}));

    let (status, _) = send(app.clone(), "POST", "/panels/clock/toggle", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(app, "GET", "/muf", None).await;
    let v = as_json(&body);
    assert_eq!(v["hidden"], false);
    assert!(v["reading"].is_null());
}
