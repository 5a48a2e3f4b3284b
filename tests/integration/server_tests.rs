//! Integration tests for the HTTP endpoint
//!
//! Requests go straight into the router with `oneshot`; crawled sites are
//! wiremock servers.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use site_mapper::config::Config;
use site_mapper::gateway::ProgressSnapshot;
use site_mapper::output::GraphDocument;
use site_mapper::server::{router, AppState, StartRunResponse};
use site_mapper::state::RunState;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_app() -> Router {
    let mut config = Config::default();
    config.crawler.delay_ms = 0;
    config.crawler.request_timeout_secs = 5;
    router(AppState::new(config))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body.to_vec())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, _, body) = send(app, request).await;
    (status, body)
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _, body) = send(app, request).await;
    (status, body)
}

async fn start(app: &Router, body: Value) -> StartRunResponse {
    let (status, body) = post_json(app, "/api/runs", body).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    serde_json::from_slice(&body).unwrap()
}

/// Polls the run until it reaches a terminal state
async fn wait_until_finished(app: &Router, run_id: &str) -> ProgressSnapshot {
    for _ in 0..200 {
        let (status, body) = get(app, &format!("/api/runs/{}", run_id)).await;
        assert_eq!(status, StatusCode::OK);
        let snapshot: ProgressSnapshot = serde_json::from_slice(&body).unwrap();
        if snapshot.terminal {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("run {} did not finish", run_id);
}

async fn mount_page(server: &MockServer, route: &str, title: &str, links: &[&str]) {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    "<html><head><title>{}</title></head><body>{}</body></html>",
                    title, anchors
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_health() {
    let app = create_test_app();
    let (status, body) = get(&app, "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_cors_headers() {
    let app = create_test_app();
    let request = Request::builder()
        .uri("/api/health")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = create_test_app();
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/runs")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&app, request).await;

    assert!(status.is_success());
    assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_start_with_invalid_seed() {
    let app = create_test_app();

    let (status, body) = post_json(&app, "/api/runs", json!({ "url": "ftp://example.test/" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("ftp"));

    // A rejected seed leaves no run behind
    let (_, body) = get(&app, "/api/runs").await;
    let runs: Vec<ProgressSnapshot> = serde_json::from_slice(&body).unwrap();
    assert!(runs.is_empty());
}

#[tokio::test]
async fn test_start_with_zero_page_limit() {
    let app = create_test_app();
    let (status, _) = post_json(
        &app,
        "/api/runs",
        json!({ "url": "http://example.test/", "max_pages": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_run() {
    let app = create_test_app();
    let id = uuid::Uuid::new_v4();

    let (status, _) = get(&app, &format!("/api/runs/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, &format!("/api/runs/{}/sitemap.json", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post_json(&app, &format!("/api/runs/{}/stop", id), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_crawl_through_api() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", "Home", &["/docs/", "/contact"]).await;
    mount_page(&server, "/docs/", "Docs", &["intro", "/"]).await;
    mount_page(&server, "/docs/intro", "Intro", &[]).await;
    mount_page(&server, "/contact", "Contact", &["mailto:hi@example.test"]).await;

    let app = create_test_app();
    let started = start(&app, json!({ "url": base })).await;
    assert_eq!(started.status, "started");
    let run_id = started.run_id.to_string();

    let snapshot = wait_until_finished(&app, &run_id).await;
    assert_eq!(snapshot.state, RunState::Completed);
    assert_eq!(snapshot.pages, 4);
    assert_eq!(snapshot.queued, 0);

    let (status, first) = get(&app, &format!("/api/runs/{}/sitemap.json", run_id)).await;
    assert_eq!(status, StatusCode::OK);
    let graph: GraphDocument = serde_json::from_slice(&first).unwrap();
    assert_eq!(graph.nodes.len(), 4);
    assert!(graph.node(&format!("{}/docs/intro", base)).is_some());

    // Building twice gives identical bytes
    let (_, second) = get(&app, &format!("/api/runs/{}/sitemap.json", run_id)).await;
    assert_eq!(first, second);

    let (status, outline) = get(&app, &format!("/api/runs/{}/sitemap.md", run_id)).await;
    assert_eq!(status, StatusCode::OK);
    let outline = String::from_utf8(outline).unwrap();
    assert!(outline.contains("[Intro]"));

    let (_, body) = get(&app, "/api/runs").await;
    let runs: Vec<ProgressSnapshot> = serde_json::from_slice(&body).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, Some(started.run_id));
}

#[tokio::test]
async fn test_sitemap_of_running_run_conflicts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><title>Slow</title><a href="/next">next</a></html>"#)
                .insert_header("content-type", "text/html")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let app = create_test_app();
    let run_id = start(&app, json!({ "url": server.uri() })).await.run_id.to_string();

    let (status, _) = get(&app, &format!("/api/runs/{}/sitemap.json", run_id)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = post_json(&app, &format!("/api/runs/{}/stop", run_id), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let snapshot = wait_until_finished(&app, &run_id).await;
    assert_eq!(snapshot.state, RunState::Stopped);

    // A stopped run still has a sitemap
    let (status, _) = get(&app, &format!("/api/runs/{}/sitemap.md", run_id)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_failed_run_has_no_sitemap() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let app = create_test_app();
    let run_id = start(&app, json!({ "url": format!("http://127.0.0.1:{}/", port) }))
        .await
        .run_id
        .to_string();

    let snapshot = wait_until_finished(&app, &run_id).await;
    assert_eq!(snapshot.state, RunState::Failed);
    assert!(snapshot.error.is_some());

    let (status, _) = get(&app, &format!("/api/runs/{}/sitemap.json", run_id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

/// Reads a server-sent event stream to its end and returns `(event, data)` pairs
async fn read_events(app: &Router, run_id: &str) -> Vec<(String, Value)> {
    let request = Request::builder()
        .uri(format!("/api/runs/{}/events", run_id))
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = tokio::time::timeout(Duration::from_secs(10), send(app, request))
        .await
        .expect("event stream did not end");

    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let text = String::from_utf8(body).unwrap();
    let mut events = Vec::new();
    for block in text.split("\n\n") {
        let mut name = None;
        let mut data = None;
        for line in block.lines() {
            if let Some(value) = line.strip_prefix("event:") {
                name = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                data = Some(serde_json::from_str(value.trim()).unwrap());
            }
        }
        if let (Some(name), Some(data)) = (name, data) {
            events.push((name, data));
        }
    }
    events
}

#[tokio::test]
async fn test_event_stream_follows_run() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><title>Root</title><a href="/a">a</a><a href="/b">b</a></html>"#)
                .insert_header("content-type", "text/html")
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/a", "A", &[]).await;
    mount_page(&server, "/b", "B", &[]).await;

    let app = create_test_app();
    let run_id = start(&app, json!({ "url": base })).await.run_id.to_string();

    let events = read_events(&app, &run_id).await;
    let names: Vec<&str> = events.iter().map(|(name, _)| name.as_str()).collect();

    assert_eq!(names.first(), Some(&"snapshot"));
    assert_eq!(names.last(), Some(&"finished"));

    // `started` may precede the subscription; every page comes after it
    let middle: Vec<&str> = names[1..names.len() - 1]
        .iter()
        .copied()
        .filter(|name| *name != "started")
        .collect();
    assert_eq!(middle, vec!["page", "page", "page"]);
    if let Some(started) = names.iter().position(|name| *name == "started") {
        assert_eq!(started, 1);
    }

    let pages: Vec<&str> = events
        .iter()
        .filter(|(name, _)| name == "page")
        .map(|(_, data)| data["url"].as_str().unwrap())
        .collect();
    assert_eq!(
        pages,
        vec![
            format!("{}/", base),
            format!("{}/a", base),
            format!("{}/b", base)
        ]
    );

    let (_, finished) = events.last().unwrap();
    assert_eq!(finished["type"], "finished");
    assert_eq!(finished["state"], "completed");
    assert_eq!(finished["pages"], 3);
}

#[tokio::test]
async fn test_event_stream_of_finished_run() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Only", &[]).await;

    let app = create_test_app();
    let run_id = start(&app, json!({ "url": server.uri() })).await.run_id.to_string();
    wait_until_finished(&app, &run_id).await;

    let events = read_events(&app, &run_id).await;

    assert_eq!(events.len(), 1);
    let (name, snapshot) = &events[0];
    assert_eq!(name, "snapshot");
    assert_eq!(snapshot["terminal"], true);
    assert_eq!(snapshot["state"], "completed");
    assert_eq!(snapshot["pages"], 1);
}

#[tokio::test]
async fn test_event_stream_unknown_run() {
    let app = create_test_app();
    let (status, _) = get(&app, &format!("/api/runs/{}/events", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
