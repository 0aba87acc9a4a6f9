//! Global configuration parsing, environment overrides, validation, and
//! credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::evaluator::Thresholds;
use crate::upstream::auth::Credentials;
use crate::{AppError, Result};

/// Keyring service name used for upstream secrets.
pub const KEYRING_SERVICE: &str = "trio-monitor";

/// Connection settings for the Trio Enterprise API.
///
/// Secrets are loaded at runtime via OS keychain or environment variables,
/// never from the TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct UpstreamConfig {
    /// Base URL, e.g. `https://api.trio-enterprise.com`.
    #[serde(default)]
    pub base_url: String,
    /// Contact-center identifier used in every resource path.
    #[serde(default = "default_contact_center_id")]
    pub contact_center_id: String,
    /// Login name for password authentication.
    #[serde(default)]
    pub username: Option<String>,
    /// Password (populated at runtime).
    #[serde(skip)]
    pub password: Option<String>,
    /// Static API token (populated at runtime); preferred over the password.
    #[serde(skip)]
    pub token: Option<String>,
    /// Per-request timeout bound.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            contact_center_id: default_contact_center_id(),
            username: None,
            password: None,
            token: None,
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

fn default_contact_center_id() -> String {
    "default".into()
}

fn default_request_timeout_seconds() -> u64 {
    10
}

/// Poll cadence, retry, and circuit-breaker settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PollerConfig {
    /// Fixed wall-clock interval between cycles.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Upstream attempts per cycle before the cycle counts as failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each further retry.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Upper bound for a single retry delay.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// Failed cycles in a row before the breaker opens.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    /// While open, only every Nth tick probes upstream.
    #[serde(default = "default_breaker_probe_every")]
    pub breaker_probe_every: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
            breaker_probe_every: default_breaker_probe_every(),
        }
    }
}

fn default_interval_seconds() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    4000
}

fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_breaker_probe_every() -> u32 {
    10
}

/// Storage bounds enforced by the hourly purge.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RetentionConfig {
    /// Days of queue history and snapshots to keep.
    #[serde(default = "default_history_days")]
    pub history_days: u32,
    /// Days an acknowledged alert survives after acknowledgement.
    #[serde(default = "default_acknowledged_alert_days")]
    pub acknowledged_alert_days: u32,
    /// Hard cap on stored alerts; the oldest beyond it are dropped.
    #[serde(default = "default_max_alerts")]
    pub max_alerts: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            history_days: default_history_days(),
            acknowledged_alert_days: default_acknowledged_alert_days(),
            max_alerts: default_max_alerts(),
        }
    }
}

fn default_history_days() -> u32 {
    30
}

fn default_acknowledged_alert_days() -> u32 {
    7
}

fn default_max_alerts() -> u32 {
    1000
}

fn default_database_path() -> PathBuf {
    PathBuf::from("trio_monitor.db")
}

fn default_http_host() -> String {
    "127.0.0.1".into()
}

fn default_http_port() -> u16 {
    8000
}

fn default_frontend_url() -> String {
    "http://localhost:3000".into()
}

/// Global configuration parsed from `config.toml` and the environment.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Upstream API connectivity.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Queue status and service-level thresholds.
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Poll cadence and failure handling.
    #[serde(default)]
    pub poller: PollerConfig,
    /// History and alert retention bounds.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// `SQLite` database file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Interface the HTTP API binds to.
    #[serde(default = "default_http_host")]
    pub http_host: String,
    /// HTTP API port.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Dashboard origin allowed by CORS.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

impl GlobalConfig {
    /// Load configuration from an optional TOML file, apply environment
    /// overrides, and validate.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read, contains
    /// invalid TOML, an override cannot be parsed, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let raw = match path {
            Some(path) => fs::read_to_string(path)
                .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?,
            None => String::new(),
        };
        let mut config: Self = toml::from_str(&raw)?;
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string, without
    /// consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TRIO_*` and threshold overrides resolved through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a numeric override does not parse.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("TRIO_API_BASE_URL") {
            self.upstream.base_url = url;
        }
        if let Some(cc) = lookup("TRIO_CONTACT_CENTER_ID") {
            self.upstream.contact_center_id = cc;
        }
        if let Some(user) = lookup("TRIO_API_USERNAME") {
            self.upstream.username = Some(user);
        }
        override_parsed(&lookup, "POLLING_INTERVAL", &mut self.poller.interval_seconds)?;
        override_parsed(&lookup, "QUEUE_TIME_LIMIT", &mut self.thresholds.critical_seconds)?;
        override_parsed(&lookup, "WARNING_THRESHOLD", &mut self.thresholds.warning_seconds)?;
        override_parsed(
            &lookup,
            "SERVICE_LEVEL_TARGET",
            &mut self.thresholds.service_level_target_percent,
        )?;
        override_parsed(
            &lookup,
            "SERVICE_LEVEL_WINDOW",
            &mut self.thresholds.service_level_target_seconds,
        )?;
        override_parsed(
            &lookup,
            "DAILY_QUEUE_TIME_LIMIT",
            &mut self.thresholds.daily_queue_time_limit_seconds,
        )?;
        if let Some(path) = lookup("DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        override_parsed(&lookup, "HTTP_PORT", &mut self.http_port)?;
        if let Some(origin) = lookup("FRONTEND_URL") {
            self.frontend_url = origin;
        }
        Ok(())
    }

    /// Load upstream secrets from OS keychain with env-var fallback.
    ///
    /// Both secrets are optional at this stage; [`credentials`](Self::credentials)
    /// decides whether what was found is usable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the keychain task panics.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.upstream.token = load_credential("trio_api_token", "TRIO_API_TOKEN").await?;
        self.upstream.password = load_credential("trio_api_password", "TRIO_API_PASSWORD").await?;
        Ok(())
    }

    /// Resolve the credentials used to open an upstream auth session.
    ///
    /// A static token wins over username and password.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if neither a token nor a complete
    /// username/password pair is available.
    pub fn credentials(&self) -> Result<Credentials> {
        if let Some(token) = self.upstream.token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(Credentials::Token(token.clone()));
        }
        match (&self.upstream.username, &self.upstream.password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Ok(Credentials::Password {
                    username: username.clone(),
                    password: password.clone(),
                })
            }
            _ => Err(AppError::Config(
                "either TRIO_API_TOKEN or TRIO_API_USERNAME/TRIO_API_PASSWORD must be provided"
                    .into(),
            )),
        }
    }

    /// Socket address string the HTTP API binds to.
    #[must_use]
    pub fn http_bind(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.upstream.base_url.is_empty() {
            return Err(AppError::Config(
                "upstream.base_url (TRIO_API_BASE_URL) must be set".into(),
            ));
        }
        reqwest::Url::parse(&self.upstream.base_url)
            .map_err(|err| AppError::Config(format!("upstream.base_url invalid: {err}")))?;

        if self.upstream.request_timeout_seconds == 0 {
            return Err(AppError::Config(
                "upstream.request_timeout_seconds must be greater than zero".into(),
            ));
        }

        if !(5..=60).contains(&self.poller.interval_seconds) {
            return Err(AppError::Config(format!(
                "poller.interval_seconds must be between 5 and 60, got {}",
                self.poller.interval_seconds
            )));
        }

        if self.poller.max_attempts == 0 {
            return Err(AppError::Config(
                "poller.max_attempts must be greater than zero".into(),
            ));
        }

        if self.poller.max_consecutive_failures == 0 || self.poller.breaker_probe_every == 0 {
            return Err(AppError::Config(
                "poller breaker settings must be greater than zero".into(),
            ));
        }

        let t = &self.thresholds;
        if t.warning_seconds >= t.critical_seconds {
            return Err(AppError::Config(format!(
                "warning threshold ({}) must be less than queue time limit ({})",
                t.warning_seconds, t.critical_seconds
            )));
        }

        if !(t.service_level_target_percent > 0.0 && t.service_level_target_percent <= 100.0) {
            return Err(AppError::Config(format!(
                "service level target must be in (0, 100], got {}",
                t.service_level_target_percent
            )));
        }

        if self.retention.history_days == 0 || self.retention.max_alerts == 0 {
            return Err(AppError::Config(
                "retention bounds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

fn override_parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> Result<()>
where
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|err| AppError::Config(format!("{key}={raw:?} is invalid: {err}")))?;
    }
    Ok(())
}

/// Load a single secret from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<Option<String>> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(Some(value)),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(keyring::Error::NoEntry) => {
            debug!(key = keyring_key, "no keychain entry, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    Ok(env::var(env_key).ok().filter(|v| !v.is_empty()))
}
