//! Built-in ping scraper.
//!
//! Waits one second, then reports a constant gauge. Serves as a liveness
//! check of the scrape pipeline and as a template for real scrapers.

use std::sync::Arc;
use std::time::Duration;

use crate::collector::{MetricDesc, MetricSink, ScrapeContext, ScrapeError, Scraper};
use crate::collector::sink::build_fq_name;

/// Simulated probe latency.
const PING_DELAY: Duration = Duration::from_secs(1);

/// Scraper reporting `<namespace>_ping{type="ping"} 1`.
#[derive(Debug, Clone)]
pub struct PingScraper {
    desc: Arc<MetricDesc>,
}

impl PingScraper {
    pub fn new(namespace: &str) -> Self {
        Self {
            desc: Arc::new(MetricDesc::new(
                build_fq_name(namespace, "", "ping"),
                "ping test",
                &["type"],
            )),
        }
    }
}

#[async_trait::async_trait]
impl Scraper for PingScraper {
    fn name(&self) -> &str {
        "ping"
    }

    fn help(&self) -> &str {
        "Collect from ping"
    }

    fn version(&self) -> f64 {
        1.0
    }

    async fn scrape(&self, ctx: &ScrapeContext, sink: &MetricSink) -> Result<(), ScrapeError> {
        ctx.sleep(PING_DELAY).await?;
        sink.gauge(&self.desc, 1.0, &["ping"])?;
        tracing::debug!("Ping sample emitted");
        Ok(())
    }
}
