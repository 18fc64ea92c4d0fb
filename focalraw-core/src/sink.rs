//! Metrics sink contract and in-memory sinks.
//!
//! The decoding pipeline only produces values and coordinates; binning,
//! retention and presentation belong to whatever implements
//! [`MetricsSink`].

use serde::Serialize;
use std::collections::BTreeMap;

/// Receiver of typed fill events.
pub trait MetricsSink {
    /// Records a one-dimensional value.
    fn fill_scalar(&mut self, metric: &str, value: f64);

    /// Records a weighted two-dimensional point.
    fn fill_2d(&mut self, metric: &str, x: f64, y: f64, weight: f64);
}

impl<S: MetricsSink + ?Sized> MetricsSink for &mut S {
    fn fill_scalar(&mut self, metric: &str, value: f64) {
        (**self).fill_scalar(metric, value);
    }

    fn fill_2d(&mut self, metric: &str, x: f64, y: f64, weight: f64) {
        (**self).fill_2d(metric, x, y, weight);
    }
}

impl<S: MetricsSink + ?Sized> MetricsSink for Box<S> {
    fn fill_scalar(&mut self, metric: &str, value: f64) {
        (**self).fill_scalar(metric, value);
    }

    fn fill_2d(&mut self, metric: &str, x: f64, y: f64, weight: f64) {
        (**self).fill_2d(metric, x, y, weight);
    }
}

/// A single recorded fill.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fill {
    Scalar {
        metric: String,
        value: f64,
    },
    TwoD {
        metric: String,
        x: f64,
        y: f64,
        weight: f64,
    },
}

impl Fill {
    #[must_use]
    pub fn metric(&self) -> &str {
        match self {
            Fill::Scalar { metric, .. } | Fill::TwoD { metric, .. } => metric,
        }
    }
}

/// Sink that keeps every fill in arrival order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    fills: Vec<Fill>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    /// Number of fills (of either kind) for `metric`.
    #[must_use]
    pub fn count(&self, metric: &str) -> usize {
        self.fills.iter().filter(|f| f.metric() == metric).count()
    }

    /// Scalar values filled into `metric`, in order.
    #[must_use]
    pub fn scalars(&self, metric: &str) -> Vec<f64> {
        self.fills
            .iter()
            .filter_map(|f| match f {
                Fill::Scalar { metric: m, value } if m == metric => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// `(x, y, weight)` points filled into `metric`, in order.
    #[must_use]
    pub fn points(&self, metric: &str) -> Vec<(f64, f64, f64)> {
        self.fills
            .iter()
            .filter_map(|f| match f {
                Fill::TwoD {
                    metric: m,
                    x,
                    y,
                    weight,
                } if m == metric => Some((*x, *y, *weight)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.fills.clear();
    }
}

impl MetricsSink for RecordingSink {
    fn fill_scalar(&mut self, metric: &str, value: f64) {
        self.fills.push(Fill::Scalar {
            metric: metric.to_string(),
            value,
        });
    }

    fn fill_2d(&mut self, metric: &str, x: f64, y: f64, weight: f64) {
        self.fills.push(Fill::TwoD {
            metric: metric.to_string(),
            x,
            y,
            weight,
        });
    }
}

/// Running statistics of one metric.
///
/// For two-dimensional metrics the statistics are taken over the weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    pub entries: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl MetricSummary {
    fn first(value: f64) -> Self {
        Self {
            entries: 1,
            sum: value,
            min: value,
            max: value,
        }
    }

    fn add(&mut self, value: f64) {
        self.entries += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Mean of the filled values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.entries == 0 {
            0.0
        } else {
            self.sum / self.entries as f64
        }
    }
}

/// Sink keeping per-metric entry counts and extrema, sorted by name.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct SummarySink {
    metrics: BTreeMap<String, MetricSummary>,
}

impl SummarySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, metric: &str) -> Option<&MetricSummary> {
        self.metrics.get(metric)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricSummary)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    fn record(&mut self, metric: &str, value: f64) {
        match self.metrics.get_mut(metric) {
            Some(summary) => summary.add(value),
            None => {
                self.metrics
                    .insert(metric.to_string(), MetricSummary::first(value));
            }
        }
    }
}

impl MetricsSink for SummarySink {
    fn fill_scalar(&mut self, metric: &str, value: f64) {
        self.record(metric, value);
    }

    fn fill_2d(&mut self, metric: &str, _x: f64, _y: f64, weight: f64) {
        self.record(metric, weight);
    }
}
