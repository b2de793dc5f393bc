//! Settings shared by every reporter backend.

use std::time::Duration;

use serde::Deserialize;

use crate::{host, model::predicate::PredicateConfig, ConfigError, Result};

/// Default reporting period, in [`ReporterSettings::time_unit`] units.
pub const DEFAULT_PERIOD: u64 = 60;

/// Time unit names as they appear in the configuration document.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Converts `amount` of this unit into a [`Duration`], saturating on overflow.
    pub fn to_duration(self, amount: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(amount),
            TimeUnit::Microseconds => Duration::from_micros(amount),
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(amount.saturating_mul(60 * 60)),
            TimeUnit::Days => Duration::from_secs(amount.saturating_mul(24 * 60 * 60)),
        }
    }
}

/// Reporting period, unit conversions, prefix and metric filter of a reporter.
#[derive(Debug, Clone)]
pub struct ReporterSettings {
    period: u64,
    time_unit: TimeUnit,
    rate_unit: TimeUnit,
    duration_unit: TimeUnit,
    prefix: Option<String>,
    predicate: Option<PredicateConfig>,
}

impl ReporterSettings {
    pub fn new() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            time_unit: TimeUnit::Seconds,
            rate_unit: TimeUnit::Seconds,
            duration_unit: TimeUnit::Milliseconds,
            prefix: None,
            predicate: None,
        }
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    pub fn set_period(&mut self, period: u64) {
        self.period = period;
    }

    pub fn time_unit(&self) -> TimeUnit {
        self.time_unit
    }

    pub fn set_time_unit(&mut self, time_unit: TimeUnit) {
        self.time_unit = time_unit;
    }

    pub fn rate_unit(&self) -> TimeUnit {
        self.rate_unit
    }

    pub fn set_rate_unit(&mut self, rate_unit: TimeUnit) {
        self.rate_unit = rate_unit;
    }

    pub fn duration_unit(&self) -> TimeUnit {
        self.duration_unit
    }

    pub fn set_duration_unit(&mut self, duration_unit: TimeUnit) {
        self.duration_unit = duration_unit;
    }

    /// The prefix after placeholder resolution.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Stores `raw`, substituting the host name placeholder if present.
    pub fn set_prefix(&mut self, raw: &str) -> Result<()> {
        self.prefix = Some(host::resolve_prefix(raw)?);
        Ok(())
    }

    pub fn predicate(&self) -> Option<&PredicateConfig> {
        self.predicate.as_ref()
    }

    pub fn set_predicate(&mut self, predicate: Option<PredicateConfig>) {
        self.predicate = predicate;
    }

    /// Interval between two scheduled reports.
    pub fn interval(&self) -> Result<Duration> {
        if self.period == 0 {
            return Err(ConfigError::InvalidField {
                field: "period",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(self.time_unit.to_duration(self.period))
    }
}

impl Default for ReporterSettings {
    fn default() -> Self {
        Self::new()
    }
}
