//! Core scraper trait, scrape context and error types.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::collector::{MetricSink, SampleError};

/// Errors a scraper can return from one scrape.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The request deadline passed before the scraper finished.
    #[error("scrape deadline exceeded")]
    DeadlineExceeded,

    /// Network or file I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A sample could not be written to the sink.
    #[error("failed to emit sample: {0}")]
    Sample(#[from] SampleError),

    /// The scraper panicked. Carries the panic message when one was available.
    #[error("scraper panicked: {0}")]
    Panicked(String),

    /// Any other collection failure.
    #[error("{0}")]
    Failed(String),
}

/// Deadline-bound context shared by every scraper of one request.
///
/// Cheap to clone; the orchestrator hands each task its own copy. A context
/// without a deadline never expires.
#[derive(Debug, Clone, Default)]
pub struct ScrapeContext {
    deadline: Option<Instant>,
}

impl ScrapeContext {
    /// Context without a deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context expiring `timeout` from now.
    ///
    /// A timeout too large to represent yields a context without a deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Context expiring at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Drive `fut` to completion unless the deadline passes first.
    ///
    /// # Errors
    /// Returns `ScrapeError::DeadlineExceeded` if the deadline elapses before
    /// `fut` completes. `fut` is dropped in that case.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ScrapeError> {
        match self.deadline {
            None => Ok(fut.await),
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| ScrapeError::DeadlineExceeded),
        }
    }

    /// Sleep for `duration`, waking early with an error if the deadline passes.
    pub async fn sleep(&self, duration: Duration) -> Result<(), ScrapeError> {
        self.run(tokio::time::sleep(duration)).await
    }
}

/// A named unit of metric collection.
///
/// Scrapers are constructed once at startup and shared by every request, so
/// they must not hold request-scoped state. The orchestrator calls `scrape`
/// concurrently with other scrapers but never concurrently with itself
/// within one request.
///
/// # Contract
///
/// - `name()` is non-empty and unique within a registry. It is used for
///   `collect[]` filtering and as the `collector="collect.<name>"` label.
/// - `scrape()` must honor the context deadline: long waits go through
///   [`ScrapeContext::run`] or [`ScrapeContext::sleep`], or poll
///   [`ScrapeContext::is_expired`], and return promptly once it passes.
///   The orchestrator never cancels a scraper on its own.
/// - Logging inside `scrape()` is already scoped by a `scraper` span carrying
///   the scraper name.
#[async_trait::async_trait]
pub trait Scraper: Send + Sync + 'static {
    /// Stable identifier.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn help(&self) -> &str;

    /// Informational version of the scraper.
    fn version(&self) -> f64;

    /// Collect samples into `sink`.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: collection completed; reported as success = 1
    /// - `Err(_)`: collection failed; reported as success = 0 and logged
    async fn scrape(&self, ctx: &ScrapeContext, sink: &MetricSink) -> Result<(), ScrapeError>;
}
