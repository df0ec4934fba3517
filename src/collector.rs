//! Collector Layer
//!
//! Scrapers run on demand, once per scrape request. The [`Exporter`] fans
//! the request's scrapers out over Tokio tasks, writes each scraper's
//! success flag and duration, and joins every task before returning.
//!
//! # Architecture
//!
//! - [`Scraper`]: Core trait for implementing scrapers
//! - [`ScrapeContext`]: Per-request deadline shared by all scrapers
//! - [`MetricSink`]: Concurrent-safe destination for samples
//! - [`ScraperRegistry`]: Compiled-in scrapers and their default enablement
//! - [`Exporter`]: Fan-out/fan-in orchestration
//!
//! # Example
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use fanout_exporter::collector::{
//!     Exporter, ExporterDescs, MetricSink, ScrapeContext, ScraperRegistry,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let enabled = ScraperRegistry::builtin("fanout").resolve(&BTreeMap::new())?;
//! let exporter = Exporter::new(ExporterDescs::new("fanout"), enabled.filter(&["ping"]));
//!
//! let (sink, stream) = MetricSink::channel();
//! exporter.collect(&ScrapeContext::new(), &sink).await?;
//! drop(sink);
//! let samples = stream.drain();
//! # Ok(())
//! # }
//! ```

mod exporter;
pub mod ping;
mod registry;
pub(crate) mod sink;
mod traits;

pub use exporter::{COLLECTOR_LABEL, Exporter, ExporterDescs, UP};
pub use registry::{EnabledScrapers, RegistryError, ScraperRegistry};
pub use sink::{MetricDesc, MetricSink, Sample, SampleError, SampleStream, build_fq_name};
pub use traits::{ScrapeContext, ScrapeError, Scraper};
