//! Collection orchestrator: fans scrapers out over tokio tasks and joins them.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::Instrument;

use crate::collector::sink::build_fq_name;
use crate::collector::{MetricDesc, MetricSink, SampleError, ScrapeContext, ScrapeError, Scraper};

/// Subsystem for the orchestrator's own per-scraper metrics.
const EXPORTER_SUBSYSTEM: &str = "exporter";

/// Label carrying `collect.<scraper name>`.
pub const COLLECTOR_LABEL: &str = "collector";

/// Liveness value reported once the orchestrator has run.
pub const UP: f64 = 1.0;

/// Descriptors for the samples the orchestrator writes itself.
#[derive(Debug, Clone)]
pub struct ExporterDescs {
    pub up: Arc<MetricDesc>,
    pub collector_success: Arc<MetricDesc>,
    pub collector_duration: Arc<MetricDesc>,
}

impl ExporterDescs {
    pub fn new(namespace: &str) -> Self {
        Self {
            up: Arc::new(MetricDesc::new(
                build_fq_name(namespace, "", "up"),
                "Whether the exporter is up.",
                &[],
            )),
            collector_success: Arc::new(MetricDesc::new(
                build_fq_name(namespace, EXPORTER_SUBSYSTEM, "collector_success"),
                "Whether a collector succeeded.",
                &[COLLECTOR_LABEL],
            )),
            collector_duration: Arc::new(MetricDesc::new(
                build_fq_name(namespace, EXPORTER_SUBSYSTEM, "collector_duration_seconds"),
                "Collector time duration.",
                &[COLLECTOR_LABEL],
            )),
        }
    }
}

/// Runs one request's scrapers concurrently against a shared sink.
pub struct Exporter {
    descs: ExporterDescs,
    scrapers: Vec<Arc<dyn Scraper>>,
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field(
                "scrapers",
                &self.scrapers.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Exporter {
    pub fn new(descs: ExporterDescs, scrapers: Vec<Arc<dyn Scraper>>) -> Self {
        Self { descs, scrapers }
    }

    /// Run every scraper and write the liveness sample.
    ///
    /// # Errors
    /// Returns `SampleError` only if the liveness sample cannot be written.
    pub async fn collect(&self, ctx: &ScrapeContext, sink: &MetricSink) -> Result<(), SampleError> {
        let up = self.scrape(ctx, sink).await;
        sink.gauge(&self.descs.up, up, &[])
    }

    /// Run every scraper concurrently and wait for all of them.
    ///
    /// Each scraper gets its own task. Whatever its outcome, a success flag
    /// and a duration sample are written for it once it returns. A failing
    /// scraper never affects its siblings. Scrapers are not cancelled here:
    /// one that ignores the context deadline holds this call open until it
    /// exits.
    ///
    /// Always returns [`UP`].
    pub async fn scrape(&self, ctx: &ScrapeContext, sink: &MetricSink) -> f64 {
        let mut tasks = JoinSet::new();

        for scraper in &self.scrapers {
            let span = tracing::info_span!("scraper", scraper = %scraper.name());
            tasks.spawn(
                run_scraper(
                    Arc::clone(scraper),
                    ctx.clone(),
                    sink.clone(),
                    self.descs.clone(),
                )
                .instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "Scraper task did not complete");
            }
        }

        UP
    }
}

/// Execute one scraper and write its success and duration samples.
async fn run_scraper(
    scraper: Arc<dyn Scraper>,
    ctx: ScrapeContext,
    sink: MetricSink,
    descs: ExporterDescs,
) {
    let name = scraper.name();
    let label = format!("collect.{name}");
    let start = Instant::now();

    let result = AssertUnwindSafe(scraper.scrape(&ctx, &sink))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(ScrapeError::Panicked(panic_message(panic.as_ref()))));
    let elapsed = start.elapsed().as_secs_f64();

    let success = match &result {
        Ok(()) => {
            tracing::debug!(scraper = %name, duration_seconds = elapsed, "Scraper succeeded");
            1.0
        }
        Err(e) => {
            tracing::error!(scraper = %name, error = %e, "Error from scraper");
            0.0
        }
    };

    if let Err(e) = sink
        .gauge(&descs.collector_success, success, &[&label])
        .and_then(|()| sink.gauge(&descs.collector_duration, elapsed, &[&label]))
    {
        tracing::warn!(scraper = %name, error = %e, "Failed to write scraper status");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
