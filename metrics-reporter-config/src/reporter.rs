//! # Hawkular reporter
//!
//! Binding between a resolved reporter configuration and the OpenTelemetry
//! metrics SDK. [`HawkularReporterBuilder`] collects the optional settings,
//! [`HawkularReporter`] owns the started meter provider whose periodic reader
//! pushes metrics over OTLP/HTTP to the configured backend.
//!
//! The HTTP transport is only compiled with the `hawkular` feature. Without
//! it [`HawkularReporterBuilder::build`] fails with
//! [`ConfigError::BackendUnavailable`].

use std::{collections::HashMap, fmt, time::Duration};

use base64::Engine;
use opentelemetry::{otel_debug, KeyValue};
use opentelemetry_sdk::{
    metrics::{Aggregation, Instrument, MeterProviderBuilder, SdkMeterProvider, Stream},
    Resource,
};

use crate::{
    model::{predicate::MetricFilter, settings::TimeUnit},
    ConfigError, Result,
};

/// Header carrying the tenant on every request sent to the backend.
pub const TENANT_HEADER: &str = "Hawkular-Tenant";

const AUTHORIZATION_HEADER: &str = "Authorization";

/// Auto-tagging used when the configuration does not set it.
pub const DEFAULT_AUTO_TAGGING: bool = true;

/// Whether the HTTP transport was compiled in.
pub const fn backend_available() -> bool {
    cfg!(feature = "hawkular")
}

#[cfg(feature = "hawkular")]
type Exporter = opentelemetry_otlp::MetricExporter;

#[cfg(not(feature = "hawkular"))]
type Exporter = std::convert::Infallible;

#[cfg(feature = "hawkular")]
fn http_exporter(uri: Option<&str>, headers: HashMap<String, String>) -> Result<Exporter> {
    use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};

    let mut builder = opentelemetry_otlp::MetricExporter::builder()
        .with_http()
        .with_headers(headers);
    if let Some(uri) = uri {
        builder = builder.with_endpoint(uri);
    }
    builder
        .build()
        .map_err(|e| ConfigError::BuildFailure(e.to_string()))
}

#[cfg(not(feature = "hawkular"))]
fn http_exporter(_uri: Option<&str>, _headers: HashMap<String, String>) -> Result<Exporter> {
    Err(ConfigError::BackendUnavailable(
        "metrics-reporter-config was built without the `hawkular` feature".to_string(),
    ))
}

/// Registry and exporter waiting for [`HawkularReporter::start`].
struct PendingStart {
    registry: MeterProviderBuilder,
    exporter: Exporter,
}

impl PendingStart {
    fn attach(self, interval: Duration) -> MeterProviderBuilder {
        #[cfg(feature = "hawkular")]
        {
            let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(self.exporter)
                .with_interval(interval)
                .build();
            self.registry.with_reader(reader)
        }
        #[cfg(not(feature = "hawkular"))]
        {
            let PendingStart { registry, exporter } = self;
            let _ = (registry, interval);
            match exporter {}
        }
    }
}

/// Builder for [`HawkularReporter`].
///
/// Every setter is optional; settings that are never called keep the
/// defaults of the underlying SDK and exporter.
pub struct HawkularReporterBuilder {
    registry: MeterProviderBuilder,
    tenant: String,
    uri: Option<String>,
    prefix: Option<String>,
    credentials: Option<(String, String)>,
    bearer_token: Option<String>,
    headers: HashMap<String, String>,
    global_tags: HashMap<String, String>,
    per_metric_tags: HashMap<String, HashMap<String, String>>,
    auto_tagging: bool,
    failover_cache_max_size: Option<u32>,
    failover_cache_duration: Option<u64>,
    rate_unit: TimeUnit,
    duration_unit: TimeUnit,
    filter: Option<MetricFilter>,
}

impl HawkularReporterBuilder {
    pub fn new(registry: MeterProviderBuilder, tenant: impl Into<String>) -> Self {
        Self {
            registry,
            tenant: tenant.into(),
            uri: None,
            prefix: None,
            credentials: None,
            bearer_token: None,
            headers: HashMap::new(),
            global_tags: HashMap::new(),
            per_metric_tags: HashMap::new(),
            auto_tagging: DEFAULT_AUTO_TAGGING,
            failover_cache_max_size: None,
            failover_cache_duration: None,
            rate_unit: TimeUnit::Seconds,
            duration_unit: TimeUnit::Milliseconds,
            filter: None,
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Prefixes every reported metric name with `prefix.`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Bearer token authentication, preferred over basic auth when both are set.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_global_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.global_tags.extend(tags);
        self
    }

    /// Kept on the handle only; OTLP export carries no per-metric tags.
    pub fn with_per_metric_tags(
        mut self,
        tags: HashMap<String, HashMap<String, String>>,
    ) -> Self {
        self.per_metric_tags.extend(tags);
        self
    }

    /// Kept on the handle only; not applied by the OTLP transport.
    pub fn with_auto_tagging(mut self, auto_tagging: bool) -> Self {
        self.auto_tagging = auto_tagging;
        self
    }

    /// Kept on the handle only; the OTLP transport has no failover cache.
    pub fn with_failover_cache_max_size(mut self, max_size: u32) -> Self {
        self.failover_cache_max_size = Some(max_size);
        self
    }

    /// Kept on the handle only; the OTLP transport has no failover cache.
    pub fn with_failover_cache_duration(mut self, duration: u64) -> Self {
        self.failover_cache_duration = Some(duration);
        self
    }

    /// Kept on the handle only; exported values are not rescaled.
    pub fn convert_rates_to(mut self, unit: TimeUnit) -> Self {
        self.rate_unit = unit;
        self
    }

    /// Kept on the handle only; exported values are not rescaled.
    pub fn convert_durations_to(mut self, unit: TimeUnit) -> Self {
        self.duration_unit = unit;
        self
    }

    /// Drops every metric the filter does not match.
    pub fn with_filter(mut self, filter: MetricFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Headers sent with every export request.
    pub fn request_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(TENANT_HEADER.to_string(), self.tenant.clone());
        if let Some(token) = &self.bearer_token {
            headers.insert(AUTHORIZATION_HEADER.to_string(), format!("Bearer {}", token));
        } else if let Some((username, password)) = &self.credentials {
            let encoded = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", username, password));
            headers.insert(AUTHORIZATION_HEADER.to_string(), format!("Basic {}", encoded));
        }
        headers.extend(self.headers.clone());
        headers
    }

    /// Creates the exporter and prepares the registry. Nothing is reported
    /// until [`HawkularReporter::start`] is called.
    pub fn build(self) -> Result<HawkularReporter> {
        let exporter = http_exporter(self.uri.as_deref(), self.request_headers())?;

        let mut registry = self.registry;
        if !self.global_tags.is_empty() {
            registry = registry.with_resource(tags_resource(&self.global_tags));
        }
        if self.filter.is_some() || self.prefix.is_some() {
            let filter = self.filter.clone();
            let prefix = self.prefix.clone();
            registry = registry.with_view(move |instrument: &Instrument| {
                metric_stream(instrument, filter.as_ref(), prefix.as_deref())
            });
        }

        otel_debug!(
            name: "Hawkular.ReporterBuilt",
            tenant = self.tenant.as_str(),
            uri = self.uri.as_deref().unwrap_or("<default>")
        );

        Ok(HawkularReporter {
            uri: self.uri,
            tenant: self.tenant,
            prefix: self.prefix,
            global_tags: self.global_tags,
            per_metric_tags: self.per_metric_tags,
            auto_tagging: self.auto_tagging,
            failover_cache_max_size: self.failover_cache_max_size,
            failover_cache_duration: self.failover_cache_duration,
            rate_unit: self.rate_unit,
            duration_unit: self.duration_unit,
            interval: None,
            pending: Some(PendingStart { registry, exporter }),
            provider: None,
        })
    }
}

/// Converts global tags into resource attributes. The resource holds only the
/// tags, so merging it leaves the registry's own attributes untouched.
fn tags_resource(tags: &HashMap<String, String>) -> Resource {
    let mut builder = Resource::builder_empty();
    for (key, value) in tags {
        builder = builder.with_attribute(KeyValue::new(key.clone(), value.clone()));
    }
    builder.build()
}

/// View applying the metric filter and the name prefix.
fn metric_stream(
    instrument: &Instrument,
    filter: Option<&MetricFilter>,
    prefix: Option<&str>,
) -> Option<Stream> {
    let name = instrument.name();
    let qualified = prefix.map(|prefix| format!("{}.{}", prefix, name));
    if let Some(filter) = filter {
        let candidate = match &qualified {
            Some(qualified) if filter.uses_qualified_names() => qualified.as_str(),
            _ => name,
        };
        if !filter.matches(candidate) {
            return Stream::builder()
                .with_aggregation(Aggregation::Drop)
                .build()
                .ok();
        }
    }
    Stream::builder().with_name(qualified?).build().ok()
}

/// A configured reporter pushing metrics to a Hawkular compatible backend.
pub struct HawkularReporter {
    uri: Option<String>,
    tenant: String,
    prefix: Option<String>,
    global_tags: HashMap<String, String>,
    per_metric_tags: HashMap<String, HashMap<String, String>>,
    auto_tagging: bool,
    failover_cache_max_size: Option<u32>,
    failover_cache_duration: Option<u64>,
    rate_unit: TimeUnit,
    duration_unit: TimeUnit,
    interval: Option<Duration>,
    pending: Option<PendingStart>,
    provider: Option<SdkMeterProvider>,
}

impl HawkularReporter {
    pub fn builder(
        registry: MeterProviderBuilder,
        tenant: impl Into<String>,
    ) -> HawkularReporterBuilder {
        HawkularReporterBuilder::new(registry, tenant)
    }

    /// Attaches a periodic reader exporting every `interval` and builds the
    /// meter provider. A reporter can only be started once.
    pub fn start(&mut self, interval: Duration) -> Result<()> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| ConfigError::BuildFailure("reporter already started".to_string()))?;
        self.provider = Some(pending.attach(interval).build());
        self.interval = Some(interval);
        otel_debug!(
            name: "Hawkular.ReporterStarted",
            tenant = self.tenant.as_str(),
            interval_ms = interval.as_millis() as u64
        );
        Ok(())
    }

    /// Exports the current metrics immediately. Failures are logged by the SDK.
    pub fn report(&self) {
        if let Some(provider) = &self.provider {
            if let Err(err) = provider.force_flush() {
                otel_debug!(name: "Hawkular.ReportFailed", error = err.to_string());
            }
        }
    }

    pub fn is_started(&self) -> bool {
        self.provider.is_some()
    }

    /// Meter provider to create instruments from, once started.
    pub fn meter_provider(&self) -> Option<&SdkMeterProvider> {
        self.provider.as_ref()
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn global_tags(&self) -> &HashMap<String, String> {
        &self.global_tags
    }

    pub fn per_metric_tags(&self) -> &HashMap<String, HashMap<String, String>> {
        &self.per_metric_tags
    }

    pub fn is_enable_auto_tagging(&self) -> bool {
        self.auto_tagging
    }

    pub fn failover_cache_max_size(&self) -> Option<u32> {
        self.failover_cache_max_size
    }

    pub fn failover_cache_duration(&self) -> Option<u64> {
        self.failover_cache_duration
    }

    pub fn rate_unit(&self) -> TimeUnit {
        self.rate_unit
    }

    pub fn duration_unit(&self) -> TimeUnit {
        self.duration_unit
    }

    /// Reporting interval, once started.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }
}

impl fmt::Debug for HawkularReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HawkularReporter")
            .field("uri", &self.uri)
            .field("tenant", &self.tenant)
            .field("prefix", &self.prefix)
            .field("global_tags", &self.global_tags)
            .field("per_metric_tags", &self.per_metric_tags)
            .field("auto_tagging", &self.auto_tagging)
            .field("interval", &self.interval)
            .field("started", &self.is_started())
            .finish()
    }
}
