//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end, from seed to files on disk.

use site_mapper::config::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use site_mapper::crawler::run_batch;
use site_mapper::output::GraphDocument;
use site_mapper::state::{PageOutcome, RunState, TerminalReason};
use site_mapper::MapperError;
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing into `output_dir`
fn create_test_config(output_dir: &Path) -> Config {
    Config {
        seed: None,
        crawler: CrawlerConfig {
            delay_ms: 0,
            request_timeout_secs: 5,
            ..CrawlerConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: Some("https://example.test/contact".to_string()),
        },
        output: OutputConfig {
            directory: output_dir.to_string_lossy().into_owned(),
            ..OutputConfig::default()
        },
        ..Config::default()
    }
}

fn html(title: &str, links: &[&str]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
        .collect();
    ResponseTemplate::new(200)
        .set_body_string(format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, anchors
        ))
        .insert_header("content-type", "text/html; charset=utf-8")
}

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

fn read_graph(dir: &Path) -> GraphDocument {
    let json = std::fs::read_to_string(dir.join("sitemap.json")).expect("graph file missing");
    GraphDocument::from_json(&json).expect("graph file is not valid JSON")
}

#[tokio::test]
async fn test_full_crawl_small_site() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount(&server, "/", html("Home", &["/about", "/blog/", "http://external.test/x"])).await;
    mount(&server, "/about", html("About", &["/", "/blog/#latest"])).await;
    mount(&server, "/blog/", html("Blog", &["post-1", "/about"])).await;
    mount(&server, "/blog/post-1", html("First Post", &["../about"])).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());

    let report = run_batch(&format!("{}/", base), &config, CancellationToken::new())
        .await
        .expect("crawl should succeed");

    assert_eq!(report.run_state, RunState::Completed);
    assert_eq!(report.reason, TerminalReason::FrontierExhausted);

    let graph = read_graph(dir.path());
    assert_eq!(graph, report.documents.graph);

    let urls: Vec<String> = graph.nodes.iter().map(|n| n.url.clone()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/", base),
            format!("{}/about", base),
            format!("{}/blog/", base),
            format!("{}/blog/post-1", base),
        ]
    );
    assert!(graph.nodes.iter().all(|n| n.outcome == PageOutcome::Ok));
    assert_eq!(graph.node(&format!("{}/blog/post-1", base)).unwrap().depth, 2);

    // The external link is an edge, never a node
    assert!(graph
        .edges
        .iter()
        .any(|e| e.target == "http://external.test/x" && !e.in_scope));
    assert!(graph.node("http://external.test/x").is_none());

    // Every in-scope edge target was visited
    assert!(graph.unfetched_targets().is_empty());

    let outline = std::fs::read_to_string(dir.path().join("sitemap.md")).unwrap();
    assert!(outline.contains("[First Post]"));
    assert!(outline.contains("http://external.test/x"));
    assert_eq!(outline, report.documents.outline);
}

#[tokio::test]
async fn test_error_pages_are_recorded() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount(&server, "/", html("Home", &["/missing", "/report.pdf", "/broken"])).await;
    mount(&server, "/missing", ResponseTemplate::new(404)).await;
    mount(
        &server,
        "/report.pdf",
        ResponseTemplate::new(200)
            .set_body_bytes(b"%PDF-1.4".to_vec())
            .insert_header("content-type", "application/pdf"),
    )
    .await;
    mount(&server, "/broken", ResponseTemplate::new(500)).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());

    let report = run_batch(&base, &config, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.run_state, RunState::Completed);

    let graph = read_graph(dir.path());
    let missing = graph.node(&format!("{}/missing", base)).unwrap();
    assert_eq!(missing.outcome, PageOutcome::HttpError);
    assert_eq!(missing.status, Some(404));

    let pdf = graph.node(&format!("{}/report.pdf", base)).unwrap();
    assert_eq!(pdf.outcome, PageOutcome::NotHtml);
    assert_eq!(pdf.content_type.as_deref(), Some("application/pdf"));

    let broken = graph.node(&format!("{}/broken", base)).unwrap();
    assert_eq!(broken.status, Some(500));

    assert_eq!(report.statistics.failed_pages(), 2);
}

#[tokio::test]
async fn test_unreachable_seed_writes_nothing() {
    // Bind and drop a listener to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let config = create_test_config(&out);

    let result = run_batch(
        &format!("http://127.0.0.1:{}/", port),
        &config,
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(MapperError::SeedUnreachable { .. })));
    assert!(!out.exists());
}

#[tokio::test]
async fn test_invalid_seed_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let config = create_test_config(&out);

    let result = run_batch("mailto:someone@example.test", &config, CancellationToken::new()).await;

    assert!(matches!(result, Err(MapperError::SeedInvalid { .. })));
    assert!(!out.exists());
}

#[tokio::test]
async fn test_depth_limit() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount(&server, "/", html("Root", &["/one"])).await;
    mount(&server, "/one", html("One", &["/two"])).await;
    mount(&server, "/two", html("Two", &["/three"])).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    config.crawler.max_depth = Some(1);

    run_batch(&base, &config, CancellationToken::new())
        .await
        .unwrap();

    let graph = read_graph(dir.path());
    assert_eq!(graph.nodes.len(), 2);
    assert!(graph.nodes.iter().all(|n| n.depth <= 1));
    assert_eq!(
        graph.unfetched_targets().into_iter().collect::<Vec<_>>(),
        vec![format!("{}/two", base).as_str()]
    );

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/two"));
}

#[tokio::test]
async fn test_page_limit() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount(&server, "/", html("Root", &["/a", "/b", "/c"])).await;
    mount(&server, "/a", html("A", &[])).await;
    mount(&server, "/b", html("B", &[])).await;
    mount(&server, "/c", html("C", &[])).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    config.crawler.max_pages = Some(2);

    let report = run_batch(&base, &config, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.run_state, RunState::Completed);
    assert_eq!(report.reason, TerminalReason::PageLimit);
    assert_eq!(report.documents.graph.nodes.len(), 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_stopped_run_still_writes_sitemap() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount(&server, "/", html("Root", &["/a"])).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());

    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = run_batch(&base, &config, cancel).await.unwrap();

    assert_eq!(report.run_state, RunState::Stopped);
    assert_eq!(report.reason, TerminalReason::Cancelled);
    assert!(dir.path().join("sitemap.json").exists());
    assert!(dir.path().join("sitemap.md").exists());
    assert_eq!(read_graph(dir.path()).run_state, RunState::Stopped);
}

#[tokio::test]
async fn test_redirect_within_site() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount(&server, "/", html("Root", &["/old"])).await;
    mount(
        &server,
        "/old",
        ResponseTemplate::new(301).insert_header("location", format!("{}/new/", base).as_str()),
    )
    .await;
    mount(&server, "/new/", html("New", &["page"])).await;
    mount(&server, "/new/page", html("Page", &[])).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());

    run_batch(&base, &config, CancellationToken::new())
        .await
        .unwrap();

    let graph = read_graph(dir.path());
    let old = graph.node(&format!("{}/old", base)).unwrap();
    assert_eq!(old.redirected_to, Some(format!("{}/new/", base)));
    assert_eq!(old.title.as_deref(), Some("New"));

    // Relative links resolve against the final URL
    assert!(graph.node(&format!("{}/new/page", base)).is_some());
}
