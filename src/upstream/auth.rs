//! Bearer-token session against the upstream auth endpoints.

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::{AppError, Result};

/// Seconds shaved off the advertised token lifetime.
const EXPIRY_MARGIN_SECONDS: i64 = 60;

/// Lifetime assumed when the auth response does not state one.
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Longest lifetime honored, whatever upstream advertises.
const MAX_EXPIRES_IN: i64 = 86_400;

/// How the session authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Static API token exchanged via `/auth/validate`.
    Token(String),
    /// Username and password exchanged via `/auth/login`.
    Password {
        /// Login name.
        username: String,
        /// Password.
        password: String,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Credentials::Token(***)"),
            Self::Password { username, .. } => f
                .debug_struct("Credentials::Password")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// An issued bearer token.
#[derive(Clone)]
struct BearerToken {
    /// Token value sent in `Authorization`.
    value: String,
    /// Instant after which the token must be refreshed.
    expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(alias = "accessToken", alias = "token")]
    access_token: String,
    #[serde(default, alias = "expiresIn")]
    expires_in: Option<i64>,
}

/// Owned auth state: credentials, the base the session talks to, and the
/// current token if any.
#[derive(Debug, Clone)]
pub struct AuthSession {
    credentials: Credentials,
    base_url: String,
    token: Option<BearerToken>,
}

impl AuthSession {
    /// New session with no token yet.
    #[must_use]
    pub fn new(credentials: Credentials, base_url: impl Into<String>) -> Self {
        Self {
            credentials,
            base_url: trim_base(base_url.into()),
            token: None,
        }
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the session holds a token usable at `now`.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.token.as_ref().is_some_and(|t| now < t.expires_at)
    }

    /// Drop the current token so the next request re-authenticates.
    pub fn invalidate(&mut self) {
        self.token = None;
    }

    /// Switch to a failover origin. The token is kept; upstream decides
    /// whether it is honored there.
    pub fn redirect_to(&mut self, origin: impl Into<String>) {
        let origin = trim_base(origin.into());
        info!(from = %self.base_url, to = %origin, "upstream failover, adopting new base url");
        self.base_url = origin;
    }

    /// Return a valid bearer value, authenticating first when needed.
    ///
    /// # Errors
    ///
    /// See [`refresh`](Self::refresh).
    pub async fn bearer(&mut self, http: &reqwest::Client, now: DateTime<Utc>) -> Result<String> {
        if !self.is_valid(now) {
            self.refresh(http, now).await?;
        }
        self.token
            .as_ref()
            .map(|t| t.value.clone())
            .ok_or_else(|| AppError::Fatal("auth session holds no token".into()))
    }

    /// Exchange credentials for a fresh token.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Fatal` when upstream rejects the credentials or
    /// another 4xx, and `AppError::Transient` on network failure, 5xx, 429
    /// or an unreadable response.
    pub async fn refresh(&mut self, http: &reqwest::Client, now: DateTime<Utc>) -> Result<()> {
        let request = match &self.credentials {
            Credentials::Password { username, password } => http
                .post(format!("{}/auth/login", self.base_url))
                .json(&json!({
                    "username": username,
                    "password": password,
                    "grant_type": "password",
                })),
            Credentials::Token(token) => http
                .post(format!("{}/auth/validate", self.base_url))
                .bearer_auth(token),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_auth_status(status));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|err| AppError::Transient(format!("unreadable auth response: {err}")))?;
        let expires_at = token_expiry(now, body.expires_in)?;
        debug!(%expires_at, "upstream token issued");
        self.token = Some(BearerToken {
            value: body.access_token,
            expires_at,
        });
        Ok(())
    }
}

/// Expiry for a token issued at `now` with the advertised lifetime.
///
/// The lifetime is clamped to `0..=86_400` seconds and shortened by the
/// expiry margin, so a token may already be expired when issued.
///
/// # Errors
///
/// Returns `AppError::Transient` if the expiry is not representable.
pub fn token_expiry(now: DateTime<Utc>, expires_in: Option<i64>) -> Result<DateTime<Utc>> {
    let lifetime = expires_in
        .unwrap_or(DEFAULT_EXPIRES_IN)
        .clamp(0, MAX_EXPIRES_IN)
        .saturating_sub(EXPIRY_MARGIN_SECONDS);
    TimeDelta::try_seconds(lifetime)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| {
            AppError::Transient(format!("unreadable auth response: expires_in {expires_in:?}"))
        })
}

/// Map a non-success auth status to the error taxonomy.
#[must_use]
pub fn classify_auth_status(status: StatusCode) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AppError::Fatal(format!("upstream rejected credentials ({status})"))
        }
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            AppError::Transient(format!("upstream auth unavailable ({status})"))
        }
        _ => AppError::Fatal(format!("upstream auth failed ({status})")),
    }
}

fn trim_base(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}
