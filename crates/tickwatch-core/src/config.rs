//! Runtime settings.
//!
//! Settings come from three layers, later ones winning: an optional JSON
//! settings file, `TICKWATCH_*` environment variables (plus
//! `CHECK_INTERVAL_MINUTES`), then command-line flags applied by the binary.
//! Every field has a default, so an empty file or no file at all is valid.
//!
//! ```json
//! {"watchlist": "config/stocks.json", "check_interval_minutes": 15, "pacing_secs": 3}
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pacing::PacingScope;
use crate::retry::RetryPolicy;
use crate::routing::SourceStrategy;
use crate::{ConfigError, ProviderId};

/// One week.
pub const MAX_CHECK_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
pub const MAX_CYCLE_TIMEOUT_SECS: u64 = MAX_CHECK_INTERVAL_MINUTES * 60;
pub const MAX_PACING_SECS: u64 = 3_600;
pub const MAX_REQUEST_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Watchlist file (`{"stocks": [...]}`).
    pub watchlist: PathBuf,
    pub check_interval_minutes: u64,
    /// Ceiling for one cycle; defaults to the check interval.
    pub cycle_timeout_secs: Option<u64>,
    /// Minimum gap between network operations. `0` disables pacing.
    pub pacing_secs: u64,
    pub request_timeout_ms: u64,
    /// Symbols fetched in parallel. `1` keeps the batch strictly sequential.
    pub concurrency: usize,
    /// Source priority. Empty means the default order.
    pub sources: Vec<ProviderId>,
    /// Exchange assumed by Google Finance for bare tickers.
    pub google_exchange: String,
    pub retry_max_attempts: u32,
    pub retry_base_ms: u64,
    pub retry_jitter: bool,
    pub provider_quotas: bool,
    pub log_level: String,
    /// `json` for JSON lines, anything else for the human formatter.
    pub log_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            watchlist: PathBuf::from("config/stocks.json"),
            check_interval_minutes: 15,
            cycle_timeout_secs: None,
            pacing_secs: 3,
            request_timeout_ms: 10_000,
            concurrency: 1,
            sources: Vec::new(),
            google_exchange: String::from("NASDAQ"),
            retry_max_attempts: 3,
            retry_base_ms: 1_000,
            retry_jitter: false,
            provider_quotas: true,
            log_level: String::from("info"),
            log_format: String::from("pretty"),
        }
    }
}

impl Settings {
    /// Load settings from `path` (if any), apply process environment
    /// overrides, and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|error| ConfigError::Malformed {
            path: path.to_path_buf(),
            message: error.to_string(),
        })
    }

    /// Override fields from environment variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = var("TICKWATCH_WATCHLIST") {
            self.watchlist = PathBuf::from(value);
        }
        if let Some(value) = var("TICKWATCH_CHECK_INTERVAL_MINUTES").or_else(|| var("CHECK_INTERVAL_MINUTES")) {
            self.check_interval_minutes = parse_env("check_interval_minutes", &value)?;
        }
        if let Some(value) = var("TICKWATCH_CYCLE_TIMEOUT_SECS") {
            self.cycle_timeout_secs = Some(parse_env("cycle_timeout_secs", &value)?);
        }
        if let Some(value) = var("TICKWATCH_PACING_SECS") {
            self.pacing_secs = parse_env("pacing_secs", &value)?;
        }
        if let Some(value) = var("TICKWATCH_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_env("request_timeout_ms", &value)?;
        }
        if let Some(value) = var("TICKWATCH_CONCURRENCY") {
            self.concurrency = parse_env("concurrency", &value)?;
        }
        if let Some(value) = var("TICKWATCH_SOURCES") {
            self.sources = parse_sources(&value)?;
        }
        if let Some(value) = var("TICKWATCH_GOOGLE_EXCHANGE") {
            self.google_exchange = value.to_ascii_uppercase();
        }
        if let Some(value) = var("TICKWATCH_RETRY_MAX_ATTEMPTS") {
            self.retry_max_attempts = parse_env("retry_max_attempts", &value)?;
        }
        if let Some(value) = var("TICKWATCH_RETRY_BASE_MS") {
            self.retry_base_ms = parse_env("retry_base_ms", &value)?;
        }
        if let Some(value) = var("TICKWATCH_RETRY_JITTER") {
            self.retry_jitter = parse_env("retry_jitter", &value)?;
        }
        if let Some(value) = var("TICKWATCH_PROVIDER_QUOTAS") {
            self.provider_quotas = parse_env("provider_quotas", &value)?;
        }
        if let Some(value) = var("TICKWATCH_LOG_LEVEL") {
            self.log_level = value;
        }
        if let Some(value) = var("TICKWATCH_LOG_FORMAT") {
            self.log_format = value;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "check_interval_minutes",
            self.check_interval_minutes,
            MAX_CHECK_INTERVAL_MINUTES,
        )?;
        if let Some(secs) = self.cycle_timeout_secs {
            check_range("cycle_timeout_secs", secs, MAX_CYCLE_TIMEOUT_SECS)?;
        }
        if self.pacing_secs > MAX_PACING_SECS {
            return Err(ConfigError::invalid_setting(
                "pacing_secs",
                format!("must be at most {MAX_PACING_SECS}"),
            ));
        }
        check_range("request_timeout_ms", self.request_timeout_ms, MAX_REQUEST_TIMEOUT_MS)?;
        if self.concurrency == 0 {
            return Err(ConfigError::invalid_setting("concurrency", "must be at least 1"));
        }
        if self.retry_max_attempts == 0 {
            return Err(ConfigError::invalid_setting(
                "retry_max_attempts",
                "must be at least 1",
            ));
        }
        if self.google_exchange.trim().is_empty() {
            return Err(ConfigError::invalid_setting("google_exchange", "must not be empty"));
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_minutes.saturating_mul(60))
    }

    pub fn cycle_timeout(&self) -> Duration {
        self.cycle_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.check_interval())
    }

    pub fn pacing_interval(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }

    /// Sequential batches share one pacing gap; parallel ones pace per provider.
    pub fn pacing_scope(&self) -> PacingScope {
        if self.concurrency > 1 {
            PacingScope::PerProvider
        } else {
            PacingScope::Global
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_base_ms),
            self.retry_jitter,
        )
    }

    pub fn strategy(&self) -> SourceStrategy {
        if self.sources.is_empty() {
            SourceStrategy::Auto
        } else {
            SourceStrategy::Priority(self.sources.clone())
        }
    }
}

/// `value` must lie in `1..=max`.
pub fn check_range(field: &'static str, value: u64, max: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid_setting(field, "must be greater than 0"));
    }
    if value > max {
        return Err(ConfigError::invalid_setting(
            field,
            format!("must be at most {max}"),
        ));
    }
    Ok(())
}

fn parse_env<T: FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::invalid_setting(field, format!("cannot parse '{value}'")))
}

/// Comma separated provider names, e.g. `google,yahoo`.
pub fn parse_sources(value: &str) -> Result<Vec<ProviderId>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.parse::<ProviderId>()
                .map_err(|error| ConfigError::invalid_setting("sources", error.to_string()))
        })
        .collect()
}
