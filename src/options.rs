//! Query options.
//!
//! Options are immutable per query. Build them fluently or load them from
//! a TOML file:
//!
//! ```toml
//! step = 3
//! order_by = "peak_bytes"
//! max_depth = 4
//! max_children = 10
//! min_micros = 100
//! select = ["micros", "bytes"]
//! ```

use crate::aggregator::metrics::Metric;
use crate::utils::config::{DEFAULT_MAX_DEPTH, MAX_QUERY_DEPTH};
use crate::utils::error::OptionsError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Which steps a query reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepFilter {
    /// Sum over every ingested step
    #[default]
    All,
    /// Only the given step key
    Only(i64),
}

/// Options for one profile query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub step: StepFilter,

    /// Metric used to order siblings (descending, ties by name)
    pub order_by: Metric,

    /// Levels shown below the root; deeper nodes fold into "others"
    pub max_depth: usize,

    /// Siblings shown per parent; the rest fold into "others"
    pub max_children: Option<usize>,

    /// Nodes whose total time is below this fold into "others"
    pub min_micros: u64,

    /// Nodes whose total requested bytes are below this fold into "others"
    pub min_bytes: u64,

    /// Metrics reported by text output
    pub select: Vec<Metric>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            step: StepFilter::All,
            order_by: Metric::Micros,
            max_depth: DEFAULT_MAX_DEPTH,
            max_children: None,
            min_micros: 0,
            min_bytes: 0,
            select: vec![Metric::Micros, Metric::Bytes],
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, step: i64) -> Self {
        self.step = StepFilter::Only(step);
        self
    }

    pub fn with_order_by(mut self, metric: Metric) -> Self {
        self.order_by = metric;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_children(mut self, count: usize) -> Self {
        self.max_children = Some(count);
        self
    }

    pub fn with_min_micros(mut self, micros: u64) -> Self {
        self.min_micros = micros;
        self
    }

    pub fn with_min_bytes(mut self, bytes: u64) -> Self {
        self.min_bytes = bytes;
        self
    }

    pub fn with_select(mut self, metrics: Vec<Metric>) -> Self {
        self.select = metrics;
        self
    }

    /// Check the options against the steps a profiler has seen
    ///
    /// # Errors
    /// * `OptionsError::UnknownStep` - the step filter names an unseen step
    /// * `OptionsError::OutOfRange` - a limit is zero or too large
    pub fn validate(&self, has_step: impl Fn(i64) -> bool) -> Result<(), OptionsError> {
        if let StepFilter::Only(step) = self.step {
            if !has_step(step) {
                return Err(OptionsError::UnknownStep(step));
            }
        }

        if self.max_depth > MAX_QUERY_DEPTH {
            return Err(OptionsError::OutOfRange {
                name: "max_depth",
                value: self.max_depth,
            });
        }

        if self.max_children == Some(0) {
            return Err(OptionsError::OutOfRange {
                name: "max_children",
                value: 0,
            });
        }

        Ok(())
    }

    /// Parse options from TOML text
    ///
    /// Unset keys keep their defaults; metric names are checked here.
    pub fn from_toml_str(contents: &str) -> Result<Self, OptionsError> {
        let file: OptionsFile = toml::from_str(contents)?;
        file.into_options()
    }

    /// Load options from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Whether a node's totals pass the threshold filters
    pub(crate) fn passes_thresholds(&self, micros: u64, bytes: u64) -> bool {
        micros >= self.min_micros && bytes >= self.min_bytes
    }
}

/// On-disk form of `QueryOptions`; metrics stay strings until validated
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct OptionsFile {
    step: Option<i64>,
    order_by: Option<String>,
    max_depth: Option<usize>,
    max_children: Option<usize>,
    min_micros: Option<u64>,
    min_bytes: Option<u64>,
    select: Option<Vec<String>>,
}

impl OptionsFile {
    fn into_options(self) -> Result<QueryOptions, OptionsError> {
        let defaults = QueryOptions::default();

        let order_by = match self.order_by {
            Some(name) => name.parse()?,
            None => defaults.order_by,
        };

        let select = match self.select {
            Some(names) => names
                .iter()
                .map(|name| name.parse())
                .collect::<Result<Vec<Metric>, _>>()?,
            None => defaults.select,
        };

        Ok(QueryOptions {
            step: self.step.map_or(StepFilter::All, StepFilter::Only),
            order_by,
            max_depth: self.max_depth.unwrap_or(defaults.max_depth),
            max_children: self.max_children,
            min_micros: self.min_micros.unwrap_or(defaults.min_micros),
            min_bytes: self.min_bytes.unwrap_or(defaults.min_bytes),
            select,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_unknown_step() {
        let options = QueryOptions::new().with_step(5);
        assert!(matches!(
            options.validate(|step| step == 1),
            Err(OptionsError::UnknownStep(5))
        ));
        assert!(options.validate(|step| step == 5).is_ok());
    }

    #[test]
    fn test_validate_limits() {
        let zero_children = QueryOptions::new().with_max_children(0);
        assert!(matches!(
            zero_children.validate(|_| true),
            Err(OptionsError::OutOfRange { name: "max_children", .. })
        ));

        let too_deep = QueryOptions::new().with_max_depth(MAX_QUERY_DEPTH + 1);
        assert!(too_deep.validate(|_| true).is_err());

        let root_only = QueryOptions::new().with_max_depth(0);
        assert!(root_only.validate(|_| true).is_ok());
    }

    #[test]
    fn test_from_toml_str() {
        let options = QueryOptions::from_toml_str(
            r#"
            step = 3
            order_by = "peak_bytes"
            max_children = 4
            select = ["micros", "occurrence"]
            "#,
        )
        .unwrap();

        assert_eq!(options.step, StepFilter::Only(3));
        assert_eq!(options.order_by, Metric::PeakBytes);
        assert_eq!(options.max_children, Some(4));
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(options.select, vec![Metric::Micros, Metric::Occurrence]);
    }

    #[test]
    fn test_from_toml_unknown_metric() {
        let result = QueryOptions::from_toml_str(r#"order_by = "flops""#);
        assert!(matches!(result, Err(OptionsError::UnknownMetric(_))));
    }

    #[test]
    fn test_from_toml_unknown_key() {
        let result = QueryOptions::from_toml_str("max_dept = 3");
        assert!(matches!(result, Err(OptionsError::Toml(_))));
    }
}
