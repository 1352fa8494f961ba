//! Configuration module for statsgate.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! Configuration is read once at startup; nothing here is hot-reloaded.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::domain::{
    budget::{
        DEFAULT_BURST, DEFAULT_MAX_429_RETRIES, DEFAULT_MAX_CONCURRENCY, DEFAULT_QUEUE_LIMIT,
        DEFAULT_REQUESTS_PER_SECOND,
    },
    CachePolicy, DomainError, RateBudget, RetryBackoff,
};

/// Environment variable overriding `api.api_key`.
pub const ENV_API_KEY: &str = "STATSGATE_API_KEY";
/// Environment variable overriding `api.base_url`.
pub const ENV_BASE_URL: &str = "STATSGATE_BASE_URL";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for statsgate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub rate_limiting: RateLimitingConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Upstream API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every request path is appended to.
    pub base_url: String,
    /// Trial-tier API key. `None` until configured or supplied via environment.
    pub api_key: Option<String>,
    /// Per-attempt network timeout in seconds.
    pub timeout_secs: u64,
}

/// Client-side quota governance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitingConfig {
    pub requests_per_second: f64,
    pub burst: u32,
    pub max_concurrency: usize,
    pub max_429_retries: u32,
    /// Maximum queued plus in-flight requests; excess callers are rejected.
    pub queue_limit: usize,
    /// Backoff used when a 429 carries no usable `Retry-After`.
    pub default_retry_after_ms: u64,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
}

/// Response cache lifetimes, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Lifetime of absent/empty results.
    pub negative_ttl_secs: u64,
    pub schedule_ttl_secs: u64,
    pub event_summary_ttl_secs: u64,
    pub rankings_ttl_secs: u64,
    pub profile_ttl_secs: u64,
    pub head_to_head_ttl_secs: u64,
    pub season_ttl_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/statsgate/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("statsgate")
            .join("config.yaml")
    }

    /// Apply overrides for the API key and base URL.
    ///
    /// `None` leaves the corresponding value untouched.
    pub fn apply_overrides(&mut self, api_key: Option<String>, base_url: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.api.api_key = Some(key);
        }
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.api.base_url = url;
        }
    }

    /// Apply [`ENV_API_KEY`] and [`ENV_BASE_URL`] from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_API_KEY).ok(),
            std::env::var(ENV_BASE_URL).ok(),
        );
    }

    // --- conversions into domain values ---

    /// Immutable request budget built from `rate_limiting`.
    pub fn rate_budget(&self) -> Result<RateBudget, DomainError> {
        let rl = &self.rate_limiting;
        RateBudget::new(
            rl.requests_per_second,
            rl.burst,
            rl.max_concurrency,
            rl.queue_limit,
            rl.max_429_retries,
        )
    }

    /// Retry backoff built from `rate_limiting`.
    pub fn retry_backoff(&self) -> Result<RetryBackoff, DomainError> {
        let rl = &self.rate_limiting;
        RetryBackoff::new(
            Duration::from_millis(rl.default_retry_after_ms),
            Duration::from_millis(rl.jitter_min_ms),
            Duration::from_millis(rl.jitter_max_ms),
        )
    }

    /// Cache policy built from `cache`.
    pub fn cache_policy(&self) -> CachePolicy {
        let c = &self.cache;
        CachePolicy {
            enabled: c.enabled,
            negative_ttl: Duration::from_secs(c.negative_ttl_secs),
            schedule: Duration::from_secs(c.schedule_ttl_secs),
            event_summary: Duration::from_secs(c.event_summary_ttl_secs),
            rankings: Duration::from_secs(c.rankings_ttl_secs),
            profile: Duration::from_secs(c.profile_ttl_secs),
            head_to_head: Duration::from_secs(c.head_to_head_ttl_secs),
            season_metadata: Duration::from_secs(c.season_ttl_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

// Config derives Default because all its fields implement Default.

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.sportradar.com/tennis/trial/v3/en".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            burst: DEFAULT_BURST,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_429_retries: DEFAULT_MAX_429_RETRIES,
            queue_limit: DEFAULT_QUEUE_LIMIT,
            default_retry_after_ms: 2000,
            jitter_min_ms: 100,
            jitter_max_ms: 400,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        let policy = CachePolicy::default();
        Self {
            enabled: policy.enabled,
            negative_ttl_secs: policy.negative_ttl.as_secs(),
            schedule_ttl_secs: policy.schedule.as_secs(),
            event_summary_ttl_secs: policy.event_summary.as_secs(),
            rankings_ttl_secs: policy.rankings.as_secs(),
            profile_ttl_secs: policy.profile.as_secs(),
            head_to_head_ttl_secs: policy.head_to_head.as_secs(),
            season_ttl_secs: policy.season_metadata.as_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"rate_limiting.burst"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut require = |ok: bool, field: &str, message: String| {
            if !ok {
                errors.push(ValidationError {
                    field: field.into(),
                    message,
                });
            }
        };

        // --- api ---
        let base = self.api.base_url.as_str();
        require(
            base.starts_with("https://") || base.starts_with("http://"),
            "api.base_url",
            format!("must be an http(s) URL, got '{}'", base),
        );
        require(
            self.api.timeout_secs > 0,
            "api.timeout_secs",
            "must be greater than 0".into(),
        );

        // --- rate_limiting ---
        let rl = &self.rate_limiting;
        require(
            rl.requests_per_second.is_finite() && rl.requests_per_second > 0.0,
            "rate_limiting.requests_per_second",
            "must be greater than 0".into(),
        );
        require(rl.burst > 0, "rate_limiting.burst", "must be greater than 0".into());
        require(
            rl.max_concurrency > 0,
            "rate_limiting.max_concurrency",
            "must be greater than 0".into(),
        );
        require(
            rl.queue_limit > 0,
            "rate_limiting.queue_limit",
            "must be greater than 0".into(),
        );
        require(
            rl.jitter_min_ms <= rl.jitter_max_ms,
            "rate_limiting.jitter_min_ms",
            format!(
                "jitter_min_ms ({}) must not exceed jitter_max_ms ({})",
                rl.jitter_min_ms, rl.jitter_max_ms
            ),
        );

        // --- cache ---
        let c = &self.cache;
        for (field, value) in [
            ("cache.negative_ttl_secs", c.negative_ttl_secs),
            ("cache.schedule_ttl_secs", c.schedule_ttl_secs),
            ("cache.event_summary_ttl_secs", c.event_summary_ttl_secs),
            ("cache.rankings_ttl_secs", c.rankings_ttl_secs),
            ("cache.profile_ttl_secs", c.profile_ttl_secs),
            ("cache.head_to_head_ttl_secs", c.head_to_head_ttl_secs),
            ("cache.season_ttl_secs", c.season_ttl_secs),
        ] {
            require(value > 0, field, "must be greater than 0".into());
        }

        // --- logging ---
        require(
            VALID_LOG_LEVELS.contains(&self.logging.level.as_str()),
            "logging.level",
            format!(
                "invalid level '{}'; valid options: {}",
                self.logging.level,
                VALID_LOG_LEVELS.join(", ")
            ),
        );

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use statsgate_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .api_key("trial-key")
///     .requests_per_second(1.0)
///     .logging_level("debug")
///     .build();
/// assert_eq!(config.rate_limiting.requests_per_second, 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- api ---

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api.api_key = Some(key.into());
        self
    }

    pub fn timeout_secs(mut self, seconds: u64) -> Self {
        self.config.api.timeout_secs = seconds;
        self
    }

    // --- rate_limiting ---

    pub fn requests_per_second(mut self, rps: f64) -> Self {
        self.config.rate_limiting.requests_per_second = rps;
        self
    }

    pub fn burst(mut self, burst: u32) -> Self {
        self.config.rate_limiting.burst = burst;
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config.rate_limiting.max_concurrency = n;
        self
    }

    pub fn max_429_retries(mut self, n: u32) -> Self {
        self.config.rate_limiting.max_429_retries = n;
        self
    }

    pub fn queue_limit(mut self, n: usize) -> Self {
        self.config.rate_limiting.queue_limit = n;
        self
    }

    pub fn default_retry_after_ms(mut self, ms: u64) -> Self {
        self.config.rate_limiting.default_retry_after_ms = ms;
        self
    }

    pub fn jitter_ms(mut self, min: u64, max: u64) -> Self {
        self.config.rate_limiting.jitter_min_ms = min;
        self.config.rate_limiting.jitter_max_ms = max;
        self
    }

    // --- cache ---

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache.enabled = enabled;
        self
    }

    pub fn negative_ttl_secs(mut self, seconds: u64) -> Self {
        self.config.cache.negative_ttl_secs = seconds;
        self
    }

    pub fn rankings_ttl_secs(mut self, seconds: u64) -> Self {
        self.config.cache.rankings_ttl_secs = seconds;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
