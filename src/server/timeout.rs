//! Scrape deadline derived from the Prometheus timeout header.

use std::time::Duration;

use thiserror::Error;

/// Header in which Prometheus announces its scrape timeout, in seconds.
pub const SCRAPE_TIMEOUT_HEADER: &str = "X-Prometheus-Scrape-Timeout-Seconds";

/// Default safety margin subtracted from the announced timeout (seconds).
pub const DEFAULT_TIMEOUT_OFFSET: f64 = 0.25;

/// Reasons the announced timeout cannot be turned into a deadline.
#[derive(Debug, Error, PartialEq)]
pub enum TimeoutError {
    #[error("failed to parse timeout from Prometheus header: {0}")]
    Parse(String),

    #[error("timeout value from Prometheus header is invalid: {0}")]
    Invalid(f64),

    #[error("timeout offset ({offset}) should be lower than prometheus scrape timeout ({timeout})")]
    OffsetTooLarge { offset: f64, timeout: f64 },
}

/// Time the scrapers may use, given the header value and the configured offset.
///
/// - absent, empty or zero header: `Ok(None)`, no deadline
/// - negative or non-finite value: `Err(Invalid)`
/// - `offset >= timeout`: `Err(OffsetTooLarge)`
/// - otherwise `Ok(Some(timeout - offset))`
///
/// Callers log the error and carry on without a deadline.
pub fn scrape_timeout(header: Option<&str>, offset: f64) -> Result<Option<Duration>, TimeoutError> {
    let Some(raw) = header.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let timeout: f64 = raw
        .parse()
        .map_err(|e: std::num::ParseFloatError| TimeoutError::Parse(format!("{raw:?}: {e}")))?;

    if timeout == 0.0 {
        return Ok(None);
    }
    if !timeout.is_finite() || timeout < 0.0 {
        return Err(TimeoutError::Invalid(timeout));
    }
    if offset >= timeout {
        return Err(TimeoutError::OffsetTooLarge { offset, timeout });
    }

    Duration::try_from_secs_f64(timeout - offset)
        .map(Some)
        .map_err(|_| TimeoutError::Invalid(timeout))
}
