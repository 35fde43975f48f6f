use std::sync::Arc;
use std::time::Duration;

use avocado::geocode::{Candidate, GeocodeFuture, Geocoder, GoogleGeocoder};
use avocado::web_server::{router, AppState};
use avocado::{Coordinate, Gazetteer};
use axum::http::StatusCode;
use axum_test::{TestServer, TestServerConfig, TestWebSocket};
use serde_json::{json, Value};
use tokio::sync::Notify;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_server(geocoder: Option<Arc<dyn Geocoder>>) -> TestServer {
    let state = AppState::new("templates", Gazetteer::builtin(), geocoder);
    TestServer::new(router(state, "static")).unwrap()
}

#[tokio::test]
async fn test_map_endpoint_resolves_from_gazetteer() {
    let server = test_server(None);
    let response = server
        .get("/api/map")
        .add_query_param("city", "toronto")
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["view"], "map_ready");
    assert_eq!(body["city"], "toronto");
    assert_eq!(body["coordinate"], json!({"lat": 43.6532, "lng": -79.3832}));
    assert_eq!(body["label"], "43.6532°N, 79.3832°W");
    assert_eq!(body["zoom"], 12);
    assert_eq!(body["render_version"], 1);
}

#[tokio::test]
async fn test_map_endpoint_without_key_shows_placeholder() {
    let server = test_server(None);
    let body: Value = server
        .get("/api/map")
        .add_query_param("city", "Gotham")
        .await
        .json();
    assert_eq!(body, json!({"view": "unconfigured", "city": "Gotham"}));
}

#[tokio::test]
async fn test_map_endpoint_uses_geocoder_on_miss() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("address", "Gotham"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "results": [ { "geometry": { "location": { "lat": 10.0, "lng": 20.0 } } } ]
        })))
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(query_param("address", "Erewhon"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock)
        .await;

    let geocoder: Arc<dyn Geocoder> = Arc::new(
        GoogleGeocoder::new("test-key".to_string(), mock.uri(), Duration::from_secs(5)).unwrap(),
    );
    let server = test_server(Some(geocoder));

    let found: Value = server
        .get("/api/map")
        .add_query_param("city", "Gotham")
        .await
        .json();
    assert_eq!(found["view"], "map_ready");
    assert_eq!(found["coordinate"], json!({"lat": 10.0, "lng": 20.0}));

    let failed: Value = server
        .get("/api/map")
        .add_query_param("city", "Erewhon")
        .await
        .json();
    assert_eq!(
        failed,
        json!({
            "view": "error_display",
            "city": "Erewhon",
            "message": "Failed to fetch location data"
        })
    );
}

#[tokio::test]
async fn test_cities_endpoint_lists_gazetteer() {
    let server = test_server(None);
    let cities: Vec<String> = server.get("/api/cities").await.json();
    assert_eq!(cities.len(), Gazetteer::builtin().len());
    assert!(cities.contains(&"São Paulo".to_string()));
    assert!(cities.contains(&"Toronto, Canada".to_string()));
}

#[tokio::test]
async fn test_index_page_renders_examples() {
    let server = test_server(None);
    let response = server.get("/").await;
    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains("<title>Avocado</title>"));
    assert!(html.contains("I want to move to Toronto"));
    assert!(html.contains(r#"<template id="map-setup">"#));
    assert!(html.contains("To enable interactive map"));
}

#[tokio::test]
async fn test_index_page_omits_setup_hint_with_key() {
    let geocoder: Arc<dyn Geocoder> = Arc::new(GatedGeocoder {
        gate: Arc::new(Notify::new()),
    });
    let html = test_server(Some(geocoder)).get("/").await.text();
    assert!(!html.contains("map-setup"));
    assert!(!html.contains("To enable interactive map"));
}

#[tokio::test]
async fn test_script_rebuilds_placeholder_for_unconfigured_view() {
    let script = test_server(None).get("/static/app.js").await.text();
    assert!(script.contains(r#"getElementById("map-setup")"#));
    assert!(script.contains(r#"case "unconfigured":"#));
    assert!(!script.contains("map-city"));
}

#[tokio::test]
async fn test_missing_static_file_is_not_found() {
    let server = test_server(None);
    server
        .get("/static/nope.js")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_static_script_is_served() {
    let server = test_server(None);
    let response = server.get("/static/app.js").await;
    response.assert_status_ok();
    assert!(response.text().contains("WebSocket"));
}

/// Holds "Gotham" until released; answers everything else at once.
struct GatedGeocoder {
    gate: Arc<Notify>,
}

impl Geocoder for GatedGeocoder {
    fn geocode(&self, query: String) -> GeocodeFuture<'_> {
        let gate = self.gate.clone();
        Box::pin(async move {
            let coordinate = if query == "Gotham" {
                gate.notified().await;
                Coordinate::new(10.0, 20.0)
            } else {
                Coordinate::new(30.0, 40.0)
            };
            Ok(vec![Candidate {
                coordinate,
                formatted_address: None,
            }])
        })
    }
}

async fn connect(geocoder: Option<Arc<dyn Geocoder>>) -> (TestServer, TestWebSocket) {
    let state = AppState::new("templates", Gazetteer::builtin(), geocoder);
    let config = TestServerConfig::builder().http_transport().build();
    let server = TestServer::new_with_config(router(state, "static"), config).unwrap();
    let socket = server.get_websocket("/ws").await.into_websocket().await;
    (server, socket)
}

async fn next_view(socket: &mut TestWebSocket) -> Value {
    let event: Value = socket.receive_json().await;
    assert_eq!(event["type"], "map", "unexpected event {event}");
    event["view"].clone()
}

#[tokio::test]
async fn test_socket_sends_placeholder_then_gazetteer_map() {
    let (_server, mut socket) = connect(None).await;
    assert_eq!(
        next_view(&mut socket).await,
        json!({"view": "unconfigured", "city": ""})
    );

    socket
        .send_json(&json!({"type": "locate", "city": "Toronto, Canada"}))
        .await;
    let view = next_view(&mut socket).await;
    assert_eq!(view["view"], "map_ready");
    assert_eq!(view["render_version"], 1);

    socket
        .send_json(&json!({"type": "locate", "city": "Gotham"}))
        .await;
    assert_eq!(
        next_view(&mut socket).await,
        json!({"view": "unconfigured", "city": "Gotham"})
    );
}

#[tokio::test]
async fn test_socket_drops_late_result_for_older_locate() {
    let gate = Arc::new(Notify::new());
    let geocoder: Arc<dyn Geocoder> = Arc::new(GatedGeocoder { gate: gate.clone() });
    let (_server, mut socket) = connect(Some(geocoder)).await;
    next_view(&mut socket).await;

    // Gotham stalls in the geocoder
    socket
        .send_json(&json!({"type": "locate", "city": "Gotham"}))
        .await;
    assert_eq!(
        next_view(&mut socket).await,
        json!({"view": "loading", "city": "Gotham"})
    );

    // Metropolis is asked later and answered first
    socket
        .send_json(&json!({"type": "locate", "city": "Metropolis"}))
        .await;
    assert_eq!(
        next_view(&mut socket).await,
        json!({"view": "loading", "city": "Metropolis"})
    );
    let ready = next_view(&mut socket).await;
    assert_eq!(ready["view"], "map_ready");
    assert_eq!(ready["city"], "Metropolis");
    assert_eq!(ready["coordinate"], json!({"lat": 30.0, "lng": 40.0}));

    // Gotham's answer now arrives and must not reach the client
    gate.notify_one();
    socket
        .send_json(&json!({"type": "locate", "city": "Tokyo"}))
        .await;
    let view = next_view(&mut socket).await;
    assert_eq!(view["view"], "map_ready");
    assert_eq!(view["city"], "Tokyo");
    assert_eq!(view["coordinate"], json!({"lat": 35.6762, "lng": 139.6503}));
    assert_eq!(view["render_version"], 2);
}
