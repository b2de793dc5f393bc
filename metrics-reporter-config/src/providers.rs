//! # Reporter providers
//!
//! This module resolves configuration records into started reporters.

use opentelemetry::otel_warn;
use opentelemetry_sdk::metrics::MeterProviderBuilder;

use crate::{
    model::hawkular::HawkularReporterConfig,
    reporter::{self, HawkularReporter, HawkularReporterBuilder},
    ConfigError, Result,
};

/// Provider turning a [`HawkularReporterConfig`] into a started [`HawkularReporter`].
pub struct HawkularReporterProvider {}

impl HawkularReporterProvider {
    pub fn new() -> Self {
        HawkularReporterProvider {}
    }

    /// Validates `config`, builds the reporter with the fields it carries and
    /// starts periodic reporting.
    pub fn provide(
        &self,
        config: &HawkularReporterConfig,
        registry: MeterProviderBuilder,
    ) -> Result<HawkularReporter> {
        if !reporter::backend_available() {
            return Err(ConfigError::BackendUnavailable(
                "Hawkular reporter requires the `hawkular` feature".to_string(),
            ));
        }

        let tenant =
            non_empty(config.tenant()).ok_or(ConfigError::MissingRequiredField("tenant"))?;
        let settings = config.settings();
        let interval = settings.interval()?;

        let mut builder =
            self.configure_builder(HawkularReporterBuilder::new(registry, tenant), config);
        builder = builder
            .convert_rates_to(settings.rate_unit())
            .convert_durations_to(settings.duration_unit());
        if let Some(predicate) = settings.predicate() {
            builder = builder.with_filter(predicate.to_filter()?);
        }

        let mut reporter = builder.build()?;
        reporter.start(interval)?;
        Ok(reporter)
    }

    /// Calls a builder setter for every optional field that is set and non-empty.
    fn configure_builder(
        &self,
        mut builder: HawkularReporterBuilder,
        config: &HawkularReporterConfig,
    ) -> HawkularReporterBuilder {
        if let Some(uri) = non_empty(config.uri()) {
            builder = builder.with_uri(uri);
        }
        if let Some(prefix) = non_empty(config.prefix()) {
            builder = builder.with_prefix(prefix);
        }
        match (non_empty(config.username()), non_empty(config.password())) {
            (Some(username), Some(password)) => {
                builder = builder.with_basic_auth(username, password);
            }
            (None, None) => {}
            _ => {
                otel_warn!(
                    name: "Hawkular.IncompleteCredentials",
                    message = "Both username and password are required for basic auth, ignoring them"
                );
            }
        }
        if let Some(token) = non_empty(config.bearer_token()) {
            builder = builder.with_bearer_token(token);
        }
        if let Some(headers) = config.headers().filter(|h| !h.is_empty()) {
            builder = builder.with_headers(headers.clone());
        }
        if !config.global_tags().is_empty() {
            builder = builder.with_global_tags(config.global_tags().clone());
        }
        if let Some(tags) = config.per_metric_tags().filter(|t| !t.is_empty()) {
            builder = builder.with_per_metric_tags(tags.clone());
        }
        if let Some(auto_tagging) = config.auto_tagging() {
            builder = builder.with_auto_tagging(auto_tagging);
        }
        if let Some(max_size) = config.failover_cache_max_size() {
            builder = builder.with_failover_cache_max_size(max_size);
        }
        if let Some(duration) = config.failover_cache_duration() {
            builder = builder.with_failover_cache_duration(duration);
        }
        builder
    }
}

impl Default for HawkularReporterProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
