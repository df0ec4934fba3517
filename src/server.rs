//! Web server module for the exporter.
//!
//! Serves the scrape endpoint, a liveness probe and, when metrics live
//! somewhere other than `/`, a small landing page.

mod timeout;

use askama::Template;
use axum::{
    Json, Router,
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::Instrument;

use crate::collector::{EnabledScrapers, Exporter, ExporterDescs, MetricSink, ScrapeContext};
use crate::config::ScrapeConfig;
use crate::exposition;

pub use timeout::{DEFAULT_TIMEOUT_OFFSET, SCRAPE_TIMEOUT_HEADER, TimeoutError, scrape_timeout};

/// Path of the liveness probe.
pub const HEALTH_PATH: &str = "/healthz";

/// Query parameter naming the scrapers a request wants.
const COLLECT_PARAM: &str = "collect[]";

/// Shared application state.
///
/// Built once at startup and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Scrapers enabled for the life of the process.
    pub scrapers: EnabledScrapers,
    /// Descriptors of the orchestrator's own metrics.
    pub descs: ExporterDescs,
    /// Seconds subtracted from the Prometheus scrape timeout.
    pub timeout_offset: f64,
}

impl AppState {
    pub fn new(config: &ScrapeConfig, scrapers: EnabledScrapers) -> Self {
        Self {
            scrapers,
            descs: ExporterDescs::new(&config.namespace),
            timeout_offset: config.timeout_offset,
        }
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

/// Landing page template.
#[derive(Template)]
#[template(path = "landing.html")]
struct LandingTemplate<'a> {
    name: &'a str,
    description: &'a str,
    version: &'a str,
    metrics_path: &'a str,
    scrapers: Vec<&'a str>,
}

/// Render the landing page listing the metrics path and enabled scrapers.
///
/// # Errors
/// Returns the template error; the caller treats it as fatal.
pub fn render_landing_page(metrics_path: &str, scrapers: &EnabledScrapers) -> Result<String, askama::Error> {
    LandingTemplate {
        name: env!("CARGO_PKG_NAME"),
        description: env!("CARGO_PKG_DESCRIPTION"),
        version: env!("CARGO_PKG_VERSION"),
        metrics_path,
        scrapers: scrapers.names(),
    }
    .render()
}

/// Create the Axum router with all routes.
///
/// # Errors
/// Fails only if the landing page cannot be rendered.
pub fn create_router(state: AppState, metrics_path: &str) -> Result<Router, askama::Error> {
    let landing_page = if metrics_path != "/" {
        Some(render_landing_page(metrics_path, &state.scrapers)?)
    } else {
        None
    };

    let mut router = Router::new()
        .route(metrics_path, get(metrics_handler))
        .route(HEALTH_PATH, get(healthz_handler));

    if let Some(page) = landing_page {
        let page: Arc<str> = page.into();
        router = router.route(
            "/",
            get(move || {
                let page = Arc::clone(&page);
                async move { Html(page.to_string()) }
            }),
        );
    }

    Ok(router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .with_state(Arc::new(state)))
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Scrape endpoint.
///
/// Runs the requested scrapers (`collect[]`, falling back to every enabled
/// scraper) on a fresh sink under the deadline announced by Prometheus, then
/// renders the samples. An unusable timeout header is logged and the scrape
/// runs without a deadline.
async fn metrics_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let requested = collect_params(query.as_deref());

    let ctx = match timeout_header(&headers)
        .and_then(|value| scrape_timeout(value, state.timeout_offset))
    {
        Ok(Some(timeout)) => ScrapeContext::with_timeout(timeout),
        Ok(None) => ScrapeContext::new(),
        Err(e) => {
            tracing::error!(error = %e, "Error getting timeout from Prometheus header");
            ScrapeContext::new()
        }
    };

    let scrapers = state.scrapers.filter(requested.as_slice());
    let span = tracing::info_span!(
        "scrape",
        scrapers = scrapers.len(),
        timeout_seconds = ctx.remaining().map(|d| d.as_secs_f64()),
    );
    let exporter = Exporter::new(state.descs.clone(), scrapers);

    let (sink, stream) = MetricSink::channel();
    if let Err(e) = exporter.collect(&ctx, &sink).instrument(span).await {
        tracing::error!(error = %e, "Failed to write liveness sample");
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response();
    }
    drop(sink);

    match exposition::encode(&stream.drain()) {
        Ok(body) => ([(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
    }
}

/// Values of every `collect[]` query parameter.
fn collect_params(query: Option<&str>) -> Vec<String> {
    let Some(query) = query else {
        return Vec::new();
    };
    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == COLLECT_PARAM)
        .map(|(_, value)| value.into_owned())
        .collect()
}

/// Raw scrape timeout header, if present.
fn timeout_header(headers: &HeaderMap) -> Result<Option<&str>, TimeoutError> {
    headers
        .get(SCRAPE_TIMEOUT_HEADER)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| TimeoutError::Parse("header value is not valid UTF-8".to_string()))
        })
        .transpose()
}
