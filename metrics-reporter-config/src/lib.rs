//! # Library for declarative configuration of metrics reporters.
//!
//! This library maps a YAML reporter configuration onto a periodic metrics
//! reporter. Each configured backend entry is validated, wired into the
//! reporter builder with only the fields it actually carries, and started
//! against an OpenTelemetry meter provider.
//!
//! ```no_run
//! use metrics_reporter_config::model::ReporterConfig;
//! use opentelemetry_sdk::metrics::SdkMeterProvider;
//!
//! let mut config = ReporterConfig::load_from_file("reporters.yaml")?;
//! config.enable_all(SdkMeterProvider::builder);
//! config.report_all();
//! # Ok::<(), metrics_reporter_config::ConfigError>(())
//! ```

use thiserror::Error;

pub mod host;
pub mod model;
pub mod providers;
pub mod reporter;

/// Errors raised while loading or resolving reporter configurations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),
    #[error("Invalid value for field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("Reporter backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("Failed to build reporter: {0}")]
    BuildFailure(String),
    #[error("Failed to resolve local hostname: {0}")]
    HostResolution(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
