//! Prometheus text exposition of one request's samples.
//!
//! Samples are loaded into a throwaway [`prometheus::Registry`] built for the
//! request and rendered with the [`TextEncoder`]. Nothing is reused across
//! requests.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

use crate::collector::{MetricDesc, Sample};

/// Content type of [`encode`] output.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Errors raised while building the exposition for a request.
#[derive(Debug, Error)]
pub enum ExpositionError {
    /// Two samples share a metric name but not its help or label names.
    #[error("metric {0} was emitted with inconsistent descriptors")]
    InconsistentDesc(String),

    /// Two samples share a metric name and label values.
    #[error("metric {name} was collected before with the same label values {labels:?}")]
    DuplicateSample { name: String, labels: Vec<String> },

    /// Registration or encoding rejected by the prometheus crate.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("exposition is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Render `samples` in the Prometheus text format.
///
/// Families and series come out sorted, so the order in which scrapers
/// wrote their samples does not show in the output.
///
/// # Errors
/// Returns `ExpositionError` if the samples cannot form a consistent set of
/// metric families.
pub fn encode(samples: &[Sample]) -> Result<String, ExpositionError> {
    let registry = Registry::new();
    let mut families: BTreeMap<&str, (Arc<MetricDesc>, GaugeVec)> = BTreeMap::new();
    let mut seen: HashSet<(&str, &[String])> = HashSet::new();

    for sample in samples {
        let name = sample.desc.fq_name();
        let gauge = match families.entry(name) {
            Entry::Vacant(entry) => {
                let label_names: Vec<&str> =
                    sample.desc.label_names().iter().map(String::as_str).collect();
                let gauge = GaugeVec::new(
                    Opts::new(name, sample.desc.help()),
                    label_names.as_slice(),
                )?;
                registry.register(Box::new(gauge.clone()))?;
                &entry.insert((Arc::clone(&sample.desc), gauge)).1
            }
            Entry::Occupied(entry) => {
                if *entry.get().0 != *sample.desc {
                    return Err(ExpositionError::InconsistentDesc(name.to_string()));
                }
                &entry.into_mut().1
            }
        };

        if !seen.insert((name, sample.label_values.as_slice())) {
            return Err(ExpositionError::DuplicateSample {
                name: name.to_string(),
                labels: sample.label_values.clone(),
            });
        }

        let values: Vec<&str> = sample.label_values.iter().map(String::as_str).collect();
        gauge
            .get_metric_with_label_values(values.as_slice())?
            .set(sample.value);
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
