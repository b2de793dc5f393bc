//! Hawkular reporter configuration record.

use std::collections::HashMap;

use opentelemetry::{otel_error, otel_info, otel_warn};
use opentelemetry_sdk::metrics::MeterProviderBuilder;
use serde::Deserialize;

use crate::{
    host,
    model::{
        predicate::PredicateConfig,
        settings::{ReporterSettings, TimeUnit},
    },
    providers::HawkularReporterProvider,
    reporter::HawkularReporter,
    ConfigError,
};

/// Configuration of one Hawkular reporter, as it appears under the
/// `hawkular` list of the configuration document.
///
/// Loading runs the same setters as programmatic use: `globalTags` are merged,
/// `enableHostnameTag` and a `${host.name}` prefix are resolved immediately.
#[derive(Deserialize, Debug, Default)]
#[serde(try_from = "HawkularReporterConfigDocument")]
pub struct HawkularReporterConfig {
    settings: ReporterSettings,
    uri: Option<String>,
    tenant: Option<String>,
    username: Option<String>,
    password: Option<String>,
    bearer_token: Option<String>,
    headers: Option<HashMap<String, String>>,
    global_tags: HashMap<String, String>,
    per_metric_tags: Option<HashMap<String, HashMap<String, String>>>,
    auto_tagging: Option<bool>,
    failover_cache_max_size: Option<u32>,
    failover_cache_duration: Option<u64>,
    /// The `hostname` global tag was inserted by `set_enable_hostname_tag`.
    owns_hostname_tag: bool,
    reporter: Option<HawkularReporter>,
}

impl HawkularReporterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> &ReporterSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ReporterSettings {
        &mut self.settings
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = Some(uri.into());
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    /// Stores the tenant. An empty value is accepted here and rejected by
    /// [`enable`](Self::enable).
    pub fn set_tenant(&mut self, tenant: impl Into<String>) {
        self.tenant = Some(tenant.into());
    }

    /// The metric name prefix, after host name substitution.
    pub fn prefix(&self) -> Option<&str> {
        self.settings.prefix()
    }

    /// Stores the prefix. `${host.name}` is replaced with the sanitized local
    /// host name; failing to resolve it is an error.
    pub fn set_prefix(&mut self, raw: &str) -> crate::Result<()> {
        self.settings.set_prefix(raw)
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = Some(username.into());
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = Some(password.into());
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    pub fn set_bearer_token(&mut self, token: impl Into<String>) {
        self.bearer_token = Some(token.into());
    }

    pub fn headers(&self) -> Option<&HashMap<String, String>> {
        self.headers.as_ref()
    }

    pub fn set_headers(&mut self, headers: HashMap<String, String>) {
        self.headers = Some(headers);
    }

    pub fn global_tags(&self) -> &HashMap<String, String> {
        &self.global_tags
    }

    /// Adds `tags` to the global tags, overwriting existing values per key.
    pub fn merge_global_tags(&mut self, tags: HashMap<String, String>) {
        if tags.contains_key(host::HOSTNAME_TAG) {
            self.owns_hostname_tag = false;
        }
        self.global_tags.extend(tags);
    }

    /// Replaces the global tags with `tags`.
    pub fn replace_global_tags(&mut self, tags: HashMap<String, String>) {
        self.owns_hostname_tag = false;
        self.global_tags = tags;
    }

    pub fn per_metric_tags(&self) -> Option<&HashMap<String, HashMap<String, String>>> {
        self.per_metric_tags.as_ref()
    }

    pub fn set_per_metric_tags(&mut self, tags: HashMap<String, HashMap<String, String>>) {
        self.per_metric_tags = Some(tags);
    }

    pub fn auto_tagging(&self) -> Option<bool> {
        self.auto_tagging
    }

    pub fn set_auto_tagging(&mut self, auto_tagging: bool) {
        self.auto_tagging = Some(auto_tagging);
    }

    pub fn failover_cache_max_size(&self) -> Option<u32> {
        self.failover_cache_max_size
    }

    pub fn set_failover_cache_max_size(&mut self, max_size: u32) {
        self.failover_cache_max_size = Some(max_size);
    }

    pub fn failover_cache_duration(&self) -> Option<u64> {
        self.failover_cache_duration
    }

    pub fn set_failover_cache_duration(&mut self, duration: u64) {
        self.failover_cache_duration = Some(duration);
    }

    /// Whether the global tags carry the `hostname` tag.
    pub fn enable_hostname_tag(&self) -> bool {
        self.global_tags.contains_key(host::HOSTNAME_TAG)
    }

    /// `true` stores the local host name under the `hostname` global tag.
    /// `false` removes that tag only if it was stored by this setter; a
    /// `hostname` tag supplied through the global tags is kept.
    pub fn set_enable_hostname_tag(&mut self, enable: bool) -> crate::Result<()> {
        if enable {
            let hostname = host::local_hostname()?;
            self.global_tags
                .insert(host::HOSTNAME_TAG.to_string(), hostname);
            self.owns_hostname_tag = true;
        } else if self.owns_hostname_tag {
            self.global_tags.remove(host::HOSTNAME_TAG);
            self.owns_hostname_tag = false;
        }
        Ok(())
    }

    /// The started reporter, if [`enable`](Self::enable) succeeded.
    pub fn reporter(&self) -> Option<&HawkularReporter> {
        self.reporter.as_ref()
    }

    /// Builds and starts the reporter against `registry`.
    ///
    /// Returns `false` when the configuration is incomplete, the backend is
    /// not compiled in, or the reporter could not be built. The failure is
    /// logged and no reporter is retained.
    pub fn enable(&mut self, registry: MeterProviderBuilder) -> bool {
        if self.reporter.is_some() {
            otel_warn!(
                name: "Hawkular.AlreadyEnabled",
                tenant = self.tenant.as_deref().unwrap_or("")
            );
            return true;
        }
        match HawkularReporterProvider::new().provide(self, registry) {
            Ok(reporter) => {
                otel_info!(
                    name: "Hawkular.Enabled",
                    tenant = reporter.tenant(),
                    uri = reporter.uri().unwrap_or("<default>")
                );
                self.reporter = Some(reporter);
                true
            }
            Err(err) => {
                otel_error!(
                    name: "Hawkular.EnableFailed",
                    tenant = self.tenant.as_deref().unwrap_or(""),
                    error = err.to_string()
                );
                false
            }
        }
    }

    /// Like [`enable`](Self::enable), returning the started reporter.
    pub fn enable_and_get(
        &mut self,
        registry: MeterProviderBuilder,
    ) -> Option<&HawkularReporter> {
        if self.enable(registry) {
            self.reporter.as_ref()
        } else {
            None
        }
    }

    /// Reports once through the started reporter, if any.
    pub fn report(&self) {
        if let Some(reporter) = &self.reporter {
            reporter.report();
        }
    }
}

/// Raw document form of [`HawkularReporterConfig`].
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct HawkularReporterConfigDocument {
    period: Option<u64>,
    timeunit: Option<TimeUnit>,
    rateunit: Option<TimeUnit>,
    durationunit: Option<TimeUnit>,
    prefix: Option<String>,
    predicate: Option<PredicateConfig>,
    uri: Option<String>,
    tenant: Option<String>,
    username: Option<String>,
    password: Option<String>,
    bearer_token: Option<String>,
    headers: Option<HashMap<String, String>>,
    #[serde(default)]
    global_tags: HashMap<String, String>,
    per_metric_tags: Option<HashMap<String, HashMap<String, String>>>,
    auto_tagging: Option<bool>,
    enable_hostname_tag: Option<bool>,
    #[serde(alias = "cacheMaxSize")]
    failover_cache_max_size: Option<u32>,
    #[serde(alias = "cacheDuration")]
    failover_cache_duration: Option<u64>,
}

impl TryFrom<HawkularReporterConfigDocument> for HawkularReporterConfig {
    type Error = ConfigError;

    fn try_from(doc: HawkularReporterConfigDocument) -> Result<Self, Self::Error> {
        let mut config = HawkularReporterConfig::new();

        let settings = config.settings_mut();
        if let Some(period) = doc.period {
            settings.set_period(period);
        }
        if let Some(unit) = doc.timeunit {
            settings.set_time_unit(unit);
        }
        if let Some(unit) = doc.rateunit {
            settings.set_rate_unit(unit);
        }
        if let Some(unit) = doc.durationunit {
            settings.set_duration_unit(unit);
        }
        if let Some(prefix) = &doc.prefix {
            settings.set_prefix(prefix)?;
        }
        settings.set_predicate(doc.predicate);

        config.uri = doc.uri;
        config.tenant = doc.tenant;
        config.username = doc.username;
        config.password = doc.password;
        config.bearer_token = doc.bearer_token;
        config.headers = doc.headers;
        config.merge_global_tags(doc.global_tags);
        config.per_metric_tags = doc.per_metric_tags;
        config.auto_tagging = doc.auto_tagging;
        config.failover_cache_max_size = doc.failover_cache_max_size;
        config.failover_cache_duration = doc.failover_cache_duration;
        if let Some(enable) = doc.enable_hostname_tag {
            config.set_enable_hostname_tag(enable)?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry_sdk::metrics::SdkMeterProvider;

    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_deserialize_hawkular_config() {
        let yaml_str = r#"
          uri: "http://localhost:8080"
          tenant: "acme"
          bearerToken: "t0k3n"
          period: 10
          timeunit: MILLISECONDS
          headers:
            X-Custom: "1"
          globalTags:
            tag1: v1
          perMetricTags:
            sample.metric:
              tag2: v2
          autoTagging: false
          cacheMaxSize: 100
          failoverCacheDuration: 3000
        "#;
        let config: HawkularReporterConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(config.uri(), Some("http://localhost:8080"));
        assert_eq!(config.tenant(), Some("acme"));
        assert_eq!(config.bearer_token(), Some("t0k3n"));
        assert_eq!(config.settings().period(), 10);
        assert_eq!(config.settings().time_unit(), TimeUnit::Milliseconds);
        assert_eq!(config.headers().unwrap().get("X-Custom").unwrap(), "1");
        assert_eq!(config.global_tags().get("tag1").unwrap(), "v1");
        assert_eq!(config.per_metric_tags().unwrap().len(), 1);
        assert_eq!(config.auto_tagging(), Some(false));
        assert_eq!(config.failover_cache_max_size(), Some(100));
        assert_eq!(config.failover_cache_duration(), Some(3000));
        assert!(config.reporter().is_none());
    }

    #[test]
    fn test_deserialize_unknown_field() {
        let yaml_str = r#"
          tenant: "acme"
          tennant: "typo"
        "#;
        let result: Result<HawkularReporterConfig, _> = serde_yaml::from_str(yaml_str);
        if let Err(e) = result {
            assert!(e.to_string().contains("unknown field `tennant`"));
        } else {
            panic!("Expected error due to unknown field, but got Ok");
        }
    }

    #[test]
    fn test_global_tags_default_empty() {
        let config = HawkularReporterConfig::new();
        assert!(config.global_tags().is_empty());
        assert!(!config.enable_hostname_tag());
    }

    #[test]
    fn test_merge_global_tags_last_write_wins() {
        let mut config = HawkularReporterConfig::new();
        config.merge_global_tags(tags(&[("a", "1"), ("b", "2")]));
        config.merge_global_tags(tags(&[("b", "3"), ("c", "4")]));
        assert_eq!(config.global_tags().len(), 3);
        assert_eq!(config.global_tags().get("a").unwrap(), "1");
        assert_eq!(config.global_tags().get("b").unwrap(), "3");
        assert_eq!(config.global_tags().get("c").unwrap(), "4");
    }

    #[test]
    fn test_replace_global_tags() {
        let mut config = HawkularReporterConfig::new();
        config.merge_global_tags(tags(&[("a", "1")]));
        config.replace_global_tags(tags(&[("b", "2")]));
        assert_eq!(config.global_tags(), &tags(&[("b", "2")]));
    }

    #[test]
    fn test_enable_hostname_tag() {
        let mut config = HawkularReporterConfig::new();
        config.set_enable_hostname_tag(true).unwrap();
        assert!(config.enable_hostname_tag());
        assert_eq!(
            config.global_tags().get("hostname").unwrap(),
            &host::local_hostname().unwrap()
        );

        config.set_enable_hostname_tag(false).unwrap();
        assert!(!config.enable_hostname_tag());
    }

    #[test]
    fn test_hostname_tag_is_derived_from_global_tags() {
        let mut config = HawkularReporterConfig::new();
        config.merge_global_tags(tags(&[("hostname", "manual")]));
        assert!(config.enable_hostname_tag());
    }

    #[test]
    fn test_disable_hostname_tag_keeps_user_tag() {
        let mut config = HawkularReporterConfig::new();
        config.merge_global_tags(tags(&[("hostname", "web1")]));
        config.set_enable_hostname_tag(false).unwrap();
        assert_eq!(config.global_tags().get("hostname").unwrap(), "web1");

        // A user value merged over the inserted one is no longer removed.
        config.set_enable_hostname_tag(true).unwrap();
        config.merge_global_tags(tags(&[("hostname", "web2")]));
        config.set_enable_hostname_tag(false).unwrap();
        assert_eq!(config.global_tags().get("hostname").unwrap(), "web2");
    }

    #[test]
    fn test_deserialize_disabled_hostname_tag_keeps_global_tag() {
        let yaml_str = r#"
          tenant: "acme"
          enableHostnameTag: false
          globalTags:
            hostname: web1
        "#;
        let config: HawkularReporterConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(config.global_tags().get("hostname").unwrap(), "web1");
        assert!(config.enable_hostname_tag());
    }

    #[test]
    fn test_deserialize_hostname_tag_merges_with_global_tags() {
        let yaml_str = r#"
          tenant: "acme"
          enableHostnameTag: true
          globalTags:
            tag1: v1
        "#;
        let config: HawkularReporterConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(config.global_tags().len(), 2);
        assert!(config.enable_hostname_tag());
    }

    #[test]
    fn test_use_plain_prefix() {
        let mut config = HawkularReporterConfig::new();
        config.set_prefix("test").unwrap();
        assert_eq!(config.prefix(), Some("test"));
    }

    #[test]
    fn test_use_hostname_prefix() {
        let mut config = HawkularReporterConfig::new();
        config.set_prefix("${host.name}").unwrap();
        let prefix = config.prefix().unwrap();
        assert_eq!(prefix, host::sanitize(&host::local_hostname().unwrap()));
        assert!(prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn test_enable_without_tenant() {
        let mut config = HawkularReporterConfig::new();
        assert!(!config.enable(SdkMeterProvider::builder()));
        assert!(config.reporter().is_none());
        assert!(config.enable_and_get(SdkMeterProvider::builder()).is_none());
        // No reporter, so this is a no-op.
        config.report();
    }

    #[test]
    fn test_enable_with_empty_tenant() {
        let mut config = HawkularReporterConfig::new();
        config.set_tenant("");
        assert!(!config.enable(SdkMeterProvider::builder()));
        assert!(config.reporter().is_none());
    }

    #[cfg(feature = "hawkular")]
    #[test]
    fn test_enable_is_resolved_once() {
        let mut config = HawkularReporterConfig::new();
        config.set_tenant("acme");
        config.set_uri("http://localhost:8080/hawkular/metrics");
        assert!(config.enable(SdkMeterProvider::builder()));
        assert!(config.enable(SdkMeterProvider::builder()));
        let reporter = config.reporter().unwrap();
        assert!(reporter.is_started());
        config.report();
    }
}
