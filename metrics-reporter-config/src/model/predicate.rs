//! Metric name filter configuration.

use regex::Regex;
use serde::Deserialize;

use crate::{ConfigError, Result};

/// Whether matching metrics are kept or dropped.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PredicateColor {
    /// Only metrics matching a pattern are reported.
    White,
    /// Metrics matching a pattern are not reported.
    #[default]
    Black,
}

/// Configuration of the metric name filter applied by a reporter.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PredicateConfig {
    #[serde(default)]
    pub color: PredicateColor,
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Patterns are matched against the prefixed metric name instead of the
    /// instrument name.
    #[serde(default)]
    pub use_qualified_names: bool,
}

impl PredicateConfig {
    /// Compiles the patterns into a [`MetricFilter`]. Each pattern must match
    /// the whole name.
    pub fn to_filter(&self) -> Result<MetricFilter> {
        let patterns = self
            .patterns
            .iter()
            .map(|pattern| {
                Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                    ConfigError::InvalidField {
                        field: "predicate",
                        reason: e.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(MetricFilter {
            color: self.color,
            patterns,
            use_qualified_names: self.use_qualified_names,
        })
    }
}

/// Compiled metric name filter.
#[derive(Debug, Clone)]
pub struct MetricFilter {
    color: PredicateColor,
    patterns: Vec<Regex>,
    use_qualified_names: bool,
}

impl MetricFilter {
    /// Whether [`matches`](Self::matches) expects the prefixed metric name.
    pub fn uses_qualified_names(&self) -> bool {
        self.use_qualified_names
    }

    /// Returns true when the metric called `name` should be reported.
    pub fn matches(&self, name: &str) -> bool {
        let hit = self.patterns.iter().any(|p| p.is_match(name));
        match self.color {
            PredicateColor::White => hit,
            PredicateColor::Black => !hit,
        }
    }
}
