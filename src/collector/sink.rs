//! Metric descriptors, samples and the shared sink scrapers write to.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised when emitting a sample.
#[derive(Debug, Error)]
pub enum SampleError {
    /// Number of label values does not match the descriptor's label names.
    #[error("metric {metric} expects {expected} label values, got {got}")]
    LabelCardinality {
        metric: String,
        expected: usize,
        got: usize,
    },

    /// The receiving side of the sink is gone.
    #[error("metric sink closed")]
    Closed,
}

/// Join non-empty name parts with `_`, e.g. `fanout_exporter_collector_success`.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// Identity of a metric: name, help text and fixed label schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDesc {
    fq_name: String,
    help: String,
    label_names: Vec<String>,
}

impl MetricDesc {
    pub fn new(fq_name: impl Into<String>, help: impl Into<String>, label_names: &[&str]) -> Self {
        Self {
            fq_name: fq_name.into(),
            help: help.into(),
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
        }
    }

    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }
}

/// One gauge observation.
#[derive(Debug, Clone)]
pub struct Sample {
    pub desc: Arc<MetricDesc>,
    pub value: f64,
    pub label_values: Vec<String>,
}

impl Sample {
    /// Value of the label named `name`, if the descriptor has one.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .label_names()
            .iter()
            .position(|l| l == name)
            .and_then(|i| self.label_values.get(i))
            .map(String::as_str)
    }
}

/// Write side of a per-request sample channel.
///
/// Cloned into every scraper task; concurrent writers are safe and no
/// ordering is implied between samples of different writers.
#[derive(Debug, Clone)]
pub struct MetricSink {
    tx: mpsc::UnboundedSender<Sample>,
}

/// Read side of a per-request sample channel.
#[derive(Debug)]
pub struct SampleStream {
    rx: mpsc::UnboundedReceiver<Sample>,
}

impl MetricSink {
    /// Create a fresh sink and the stream receiving its samples.
    pub fn channel() -> (MetricSink, SampleStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (MetricSink { tx }, SampleStream { rx })
    }

    /// Emit a gauge sample for `desc`.
    ///
    /// # Errors
    /// Returns `SampleError::LabelCardinality` if `label_values` does not match
    /// the descriptor, `SampleError::Closed` if the stream was dropped.
    pub fn gauge(
        &self,
        desc: &Arc<MetricDesc>,
        value: f64,
        label_values: &[&str],
    ) -> Result<(), SampleError> {
        self.send(Sample {
            desc: Arc::clone(desc),
            value,
            label_values: label_values.iter().map(|v| v.to_string()).collect(),
        })
    }

    /// Emit a prebuilt sample.
    pub fn send(&self, sample: Sample) -> Result<(), SampleError> {
        let expected = sample.desc.label_names().len();
        if sample.label_values.len() != expected {
            return Err(SampleError::LabelCardinality {
                metric: sample.desc.fq_name().to_string(),
                expected,
                got: sample.label_values.len(),
            });
        }
        self.tx.send(sample).map_err(|_| SampleError::Closed)
    }
}

impl SampleStream {
    /// Wait for the next sample. Returns `None` once every sink is dropped.
    pub async fn recv(&mut self) -> Option<Sample> {
        self.rx.recv().await
    }

    /// Take every sample buffered so far without waiting.
    pub fn drain(mut self) -> Vec<Sample> {
        let mut samples = Vec::new();
        while let Ok(sample) = self.rx.try_recv() {
            samples.push(sample);
        }
        samples
    }
}
