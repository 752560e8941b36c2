//! Metric selection and distribution statistics.
//!
//! A `Metric` picks one field of `ExecStats`; queries order by it and the
//! text renderer reports the selected ones.

use crate::stats::ExecStats;
use crate::utils::error::OptionsError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A reportable metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Micros,
    AcceleratorMicros,
    CpuMicros,
    Bytes,
    PeakBytes,
    Occurrence,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Micros,
        Metric::AcceleratorMicros,
        Metric::CpuMicros,
        Metric::Bytes,
        Metric::PeakBytes,
        Metric::Occurrence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Micros => "micros",
            Metric::AcceleratorMicros => "accelerator_micros",
            Metric::CpuMicros => "cpu_micros",
            Metric::Bytes => "bytes",
            Metric::PeakBytes => "peak_bytes",
            Metric::Occurrence => "occurrence",
        }
    }

    /// Whether values of this metric are durations in microseconds
    pub fn is_time(&self) -> bool {
        matches!(
            self,
            Metric::Micros | Metric::AcceleratorMicros | Metric::CpuMicros
        )
    }

    /// Whether values of this metric are byte counts
    pub fn is_memory(&self) -> bool {
        matches!(self, Metric::Bytes | Metric::PeakBytes)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "micros" | "exec_micros" | "time" => Self::Micros,
            "accelerator_micros" => Self::AcceleratorMicros,
            "cpu_micros" => Self::CpuMicros,
            "bytes" | "requested_bytes" => Self::Bytes,
            "peak_bytes" => Self::PeakBytes,
            "occurrence" | "run_count" => Self::Occurrence,
            other => return Err(OptionsError::UnknownMetric(other.to_string())),
        })
    }
}

impl ExecStats {
    /// Value of one metric
    pub fn value(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Micros => self.exec_micros,
            Metric::AcceleratorMicros => self.accelerator_micros,
            Metric::CpuMicros => self.cpu_micros,
            Metric::Bytes => self.requested_bytes,
            Metric::PeakBytes => self.peak_bytes,
            Metric::Occurrence => self.run_count,
        }
    }
}

/// Parse a comma-separated metric list ("micros,bytes")
pub fn parse_metric_list(list: &str) -> Result<Vec<Metric>, OptionsError> {
    list.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Calculate how a metric is distributed over operations
///
/// # Arguments
/// * `values` - Per-operation stats (any order)
/// * `metric` - Metric to summarise
///
/// # Returns
/// Statistics about the distribution of `metric`
pub fn calculate_distribution(values: &[ExecStats], metric: Metric) -> Distribution {
    if values.is_empty() {
        return Distribution::new(metric);
    }

    let mut weights: Vec<u64> = values.iter().map(|s| s.value(metric)).collect();
    weights.sort_unstable_by(|a, b| b.cmp(a));

    let total: u64 = weights.iter().fold(0u64, |acc, w| acc.saturating_add(*w));
    let count = weights.len();
    let mean = total / count as u64;
    let median = weights[count / 2];

    // Top 10% of operations
    let top_count = (count as f64 * 0.1).ceil() as usize;
    let top_total: u64 = weights.iter().take(top_count).sum();

    debug!(
        "Distribution of {} over {} operations: total {}",
        metric, count, total
    );

    Distribution {
        metric,
        total,
        op_count: count,
        mean,
        median,
        top_10_percent_percentage: if total > 0 {
            (top_total as f64 / total as f64) * 100.0
        } else {
            0.0
        },
    }
}

/// Distribution of one metric over operations
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub metric: Metric,

    /// Sum over all operations
    pub total: u64,

    /// Number of operations
    pub op_count: usize,

    pub mean: u64,

    pub median: u64,

    /// Share of the total held by the top 10% of operations
    pub top_10_percent_percentage: f64,
}

impl Distribution {
    fn new(metric: Metric) -> Self {
        Self {
            metric,
            total: 0,
            op_count: 0,
            mean: 0,
            median: 0,
            top_10_percent_percentage: 0.0,
        }
    }

    /// Check if the metric is concentrated in a few operations
    ///
    /// Returns true if the top 10% of operations hold more than 80%
    pub fn is_highly_concentrated(&self) -> bool {
        self.top_10_percent_percentage > 80.0
    }

    /// Get human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "{} total: {} | Ops: {} | Mean: {} | Median: {} | Top 10%: {:.1}%",
            self.metric,
            self.total,
            self.op_count,
            self.mean,
            self.median,
            self.top_10_percent_percentage
        )
    }
}
