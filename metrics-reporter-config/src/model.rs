//! # Reporter configuration models
//!
//! This module defines the configuration document listing every reporter
//! to enable, one list per backend.

pub mod hawkular;
pub mod predicate;
pub mod settings;

use std::path::Path;

use opentelemetry::otel_info;
use opentelemetry_sdk::metrics::MeterProviderBuilder;
use serde::Deserialize;

use crate::{model::hawkular::HawkularReporterConfig, ConfigError, Result};

/// Root of a reporter configuration document.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct ReporterConfig {
    /// Hawkular reporters
    #[serde(default)]
    hawkular: Vec<HawkularReporterConfig>,
}

impl ReporterConfig {
    /// Parses a configuration document from a YAML string.
    pub fn load_from_str(yaml_str: &str) -> Result<Self> {
        serde_yaml::from_str(yaml_str).map_err(|e| {
            ConfigError::InvalidConfiguration(format!(
                "Failed to parse YAML configuration: {}",
                e
            ))
        })
    }

    /// Parses a configuration document from a YAML file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml_str = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::InvalidConfiguration(format!(
                "Failed to read YAML configuration file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::load_from_str(&yaml_str)
    }

    pub fn hawkular(&self) -> &[HawkularReporterConfig] {
        &self.hawkular
    }

    pub fn hawkular_mut(&mut self) -> &mut Vec<HawkularReporterConfig> {
        &mut self.hawkular
    }

    /// Enables every configured reporter, each against a fresh registry from
    /// `registry`. A failing reporter does not prevent the others from
    /// starting.
    ///
    /// Returns true if at least one reporter was enabled.
    pub fn enable_all<F>(&mut self, mut registry: F) -> bool
    where
        F: FnMut() -> MeterProviderBuilder,
    {
        let mut enabled = 0;
        for config in &mut self.hawkular {
            if config.enable(registry()) {
                enabled += 1;
            }
        }
        otel_info!(
            name: "ReporterConfig.EnableAll",
            configured = self.hawkular.len() as u64,
            enabled = enabled as u64
        );
        enabled > 0
    }

    /// Reports once through every enabled reporter.
    pub fn report_all(&self) {
        for config in &self.hawkular {
            config.report();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use opentelemetry_sdk::metrics::SdkMeterProvider;

    use super::*;

    #[test]
    fn test_deserialize_reporter_config() {
        let yaml_str = r#"
          hawkular:
            - tenant: "first"
              period: 30
            - tenant: "second"
              timeunit: MINUTES
        "#;
        let config = ReporterConfig::load_from_str(yaml_str).unwrap();
        assert_eq!(config.hawkular().len(), 2);
        assert_eq!(config.hawkular()[0].tenant(), Some("first"));
        assert_eq!(config.hawkular()[0].settings().period(), 30);
        assert_eq!(config.hawkular()[1].tenant(), Some("second"));
    }

    #[test]
    fn test_deserialize_empty_document() {
        let config = ReporterConfig::load_from_str("").unwrap();
        assert!(config.hawkular().is_empty());
    }

    #[test]
    fn test_deserialize_invalid_document() {
        let yaml_str = r#"
          graphite:
            - host: localhost
        "#;
        match ReporterConfig::load_from_str(yaml_str) {
            Err(ConfigError::InvalidConfiguration(details)) => {
                assert!(details.contains("unknown field `graphite`"))
            }
            other => panic!("Expected InvalidConfiguration error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hawkular:\n  - tenant: from-file").unwrap();
        let config = ReporterConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.hawkular()[0].tenant(), Some("from-file"));
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = ReporterConfig::load_from_file("/nonexistent/reporters.yaml");
        assert!(matches!(result, Err(ConfigError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_enable_all_without_tenants() {
        let yaml_str = r#"
          hawkular:
            - uri: "http://localhost:8080"
            - prefix: "app"
        "#;
        let mut config = ReporterConfig::load_from_str(yaml_str).unwrap();
        assert!(!config.enable_all(SdkMeterProvider::builder));
        assert!(config.hawkular().iter().all(|c| c.reporter().is_none()));
        config.report_all();
    }

    #[cfg(feature = "hawkular")]
    #[test]
    fn test_enable_all_isolates_failures() {
        let yaml_str = r#"
          hawkular:
            - uri: "http://localhost:8080/hawkular/metrics"
            - tenant: "acme"
              uri: "http://localhost:8080/hawkular/metrics"
        "#;
        let mut config = ReporterConfig::load_from_str(yaml_str).unwrap();
        assert!(config.enable_all(SdkMeterProvider::builder));
        assert!(config.hawkular()[0].reporter().is_none());
        assert!(config.hawkular()[1].reporter().is_some());
        config.report_all();
    }
}
