//! API Integration Tests for the fanout exporter
//!
//! Drives the real router over TCP the way Prometheus does.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fanout_exporter::config::ScrapeConfig;
use fanout_exporter::server::{AppState, SCRAPE_TIMEOUT_HEADER, create_router};
use fanout_exporter::{MetricDesc, MetricSink, ScrapeContext, ScrapeError, Scraper, ScraperRegistry};
use tokio::net::TcpListener;

// =============================================================================
// Test Helpers
// =============================================================================

/// Emits `fanout_echo{name="echo"} 7` without waiting.
struct EchoScraper {
    desc: Arc<MetricDesc>,
}

impl EchoScraper {
    fn new() -> Self {
        Self {
            desc: Arc::new(MetricDesc::new("fanout_echo", "Echo value", &["name"])),
        }
    }
}

#[async_trait::async_trait]
impl Scraper for EchoScraper {
    fn name(&self) -> &str {
        "echo"
    }

    fn help(&self) -> &str {
        "Echo a constant"
    }

    fn version(&self) -> f64 {
        1.0
    }

    async fn scrape(&self, _ctx: &ScrapeContext, sink: &MetricSink) -> Result<(), ScrapeError> {
        sink.gauge(&self.desc, 7.0, &["echo"])?;
        Ok(())
    }
}

/// Always fails.
struct BrokenScraper;

#[async_trait::async_trait]
impl Scraper for BrokenScraper {
    fn name(&self) -> &str {
        "broken"
    }

    fn help(&self) -> &str {
        "Always fails"
    }

    fn version(&self) -> f64 {
        1.0
    }

    async fn scrape(&self, _ctx: &ScrapeContext, _sink: &MetricSink) -> Result<(), ScrapeError> {
        Err(ScrapeError::Failed("target unreachable".to_string()))
    }
}

/// Start test server and return base URL.
async fn start_test_server(metrics_path: &str) -> String {
    let mut registry = ScraperRegistry::builtin("fanout");
    registry.register(EchoScraper::new(), true).unwrap();
    registry.register(BrokenScraper, false).unwrap();
    let scrapers = registry
        .resolve(&BTreeMap::from([("broken".to_string(), true)]))
        .unwrap();

    let state = AppState::new(&ScrapeConfig::default(), scrapers);
    let router = create_router(state, metrics_path).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://{}", addr)
}

/// Series lines (name plus labels) of an exposition body.
fn series(body: &str) -> BTreeSet<String> {
    body.lines()
        .filter(|line| !line.starts_with('#') && !line.is_empty())
        .filter_map(|line| line.rsplit_once(' ').map(|(series, _)| series.to_string()))
        .collect()
}

// =============================================================================
// Health Probe Tests
// =============================================================================

#[tokio::test]
async fn test_health_probe() {
    let base_url = start_test_server("/metrics").await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/healthz", base_url))
        .send()
        .await
        .expect("Failed to send healthz request");
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.expect("Failed to read healthz response");
    let json: serde_json::Value = serde_json::from_str(&body).expect("Invalid JSON");
    assert_eq!(json["status"], "ok");
}

// =============================================================================
// Scrape Tests
// =============================================================================

#[tokio::test]
async fn test_scrape_all_enabled() {
    let base_url = start_test_server("/metrics").await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/metrics", base_url))
        .send()
        .await
        .expect("Failed to scrape");
    assert_eq!(resp.status(), 200);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = resp.text().await.unwrap();
    assert!(body.contains("fanout_up 1"));
    assert!(body.contains(r#"fanout_ping{type="ping"} 1"#));
    assert!(body.contains(r#"fanout_echo{name="echo"} 7"#));
    assert!(body.contains(r#"fanout_exporter_collector_success{collector="collect.ping"} 1"#));
    assert!(body.contains(r#"fanout_exporter_collector_success{collector="collect.echo"} 1"#));
    assert!(body.contains(r#"fanout_exporter_collector_success{collector="collect.broken"} 0"#));
    assert!(body.contains(r#"fanout_exporter_collector_duration_seconds{collector="collect.broken"}"#));
}

#[tokio::test]
async fn test_scrape_filtered_subset() {
    let base_url = start_test_server("/metrics").await;
    let client = reqwest::Client::new();

    let body = client
        .get(format!("{}/metrics?collect[]=echo", base_url))
        .send()
        .await
        .expect("Failed to scrape")
        .text()
        .await
        .unwrap();

    assert!(body.contains(r#"collector="collect.echo""#));
    assert!(!body.contains("collect.ping"));
    assert!(!body.contains("collect.broken"));
}

#[tokio::test]
async fn test_scrape_unknown_filter_falls_back() {
    let base_url = start_test_server("/metrics").await;
    let client = reqwest::Client::new();

    let body = client
        .get(format!("{}/metrics?collect[]=nope", base_url))
        .send()
        .await
        .expect("Failed to scrape")
        .text()
        .await
        .unwrap();

    for name in ["ping", "echo", "broken"] {
        assert!(
            body.contains(&format!(r#"collector="collect.{name}""#)),
            "missing {name} in:\n{body}"
        );
    }
}

#[tokio::test]
async fn test_scrape_timeout_header_bounds_scrapers() {
    let base_url = start_test_server("/metrics").await;
    let client = reqwest::Client::new();

    // 0.5s announced, 0.25s offset: ping's one-second wait cannot finish.
    let start = Instant::now();
    let body = client
        .get(format!("{}/metrics?collect[]=ping&collect[]=echo", base_url))
        .header(SCRAPE_TIMEOUT_HEADER, "0.5")
        .send()
        .await
        .expect("Failed to scrape")
        .text()
        .await
        .unwrap();

    assert!(start.elapsed() < Duration::from_millis(900));
    assert!(body.contains(r#"fanout_exporter_collector_success{collector="collect.ping"} 0"#));
    assert!(body.contains(r#"fanout_exporter_collector_success{collector="collect.echo"} 1"#));
    assert!(!body.contains("fanout_ping{"));
    assert!(body.contains("fanout_up 1"));
}

#[tokio::test]
async fn test_scrape_rejected_timeout_runs_without_deadline() {
    let base_url = start_test_server("/metrics").await;
    let client = reqwest::Client::new();

    // Offset exceeds the announced timeout: logged, scrape runs unbounded.
    let resp = client
        .get(format!("{}/metrics?collect[]=ping", base_url))
        .header(SCRAPE_TIMEOUT_HEADER, "0.1")
        .send()
        .await
        .expect("Failed to scrape");
    assert_eq!(resp.status(), 200);

    let body = resp.text().await.unwrap();
    assert!(body.contains(r#"fanout_exporter_collector_success{collector="collect.ping"} 1"#));
}

#[tokio::test]
async fn test_repeated_scrapes_share_series() {
    let base_url = start_test_server("/metrics").await;
    let client = reqwest::Client::new();
    let url = format!("{}/metrics?collect[]=echo&collect[]=broken", base_url);

    let first = client.get(&url).send().await.unwrap().text().await.unwrap();
    let second = client.get(&url).send().await.unwrap().text().await.unwrap();

    assert_eq!(series(&first), series(&second));
    assert_eq!(series(&first).len(), 6);
}

// =============================================================================
// Landing Page Tests
// =============================================================================

#[tokio::test]
async fn test_landing_page() {
    let base_url = start_test_server("/probe").await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/", base_url))
        .send()
        .await
        .expect("Failed to fetch landing page");
    assert_eq!(resp.status(), 200);

    let body = resp.text().await.unwrap();
    assert!(body.contains("probe"));
    assert!(body.contains("<code>echo</code>"));

    let resp = client
        .get(format!("{}/probe?collect[]=echo", base_url))
        .send()
        .await
        .expect("Failed to scrape");
    assert_eq!(resp.status(), 200);
}
