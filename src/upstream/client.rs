//! HTTP client for the contact-center resources.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::LOCATION;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};

use crate::config::UpstreamConfig;
use crate::{AppError, Result};

use super::auth::{AuthSession, Credentials};
use super::wire;
use super::{UpstreamBatch, UpstreamSource};

/// Authenticated client for one contact center.
///
/// Redirects are not followed automatically: a `307` means upstream failed
/// over, and the new origin is adopted for the rest of the session.
#[derive(Debug)]
pub struct TrioClient {
    http: reqwest::Client,
    session: AuthSession,
    contact_center_id: String,
}

impl TrioClient {
    /// Build a client from upstream settings and resolved credentials.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(config: &UpstreamConfig, credentials: Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("trio-monitor/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            session: AuthSession::new(credentials, config.base_url.clone()),
            contact_center_id: config.contact_center_id.clone(),
        })
    }

    /// Base URL currently in use; changes after a failover redirect.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.session.base_url()
    }

    /// Fetch agents, queues and today's calls.
    ///
    /// # Errors
    ///
    /// Propagates the first failing request's error.
    pub async fn fetch_all(&mut self) -> Result<UpstreamBatch> {
        let now = Utc::now();
        let cc = self.contact_center_id.clone();

        let agents = self.get_json(&format!("/cc/{cc}/agents/state")).await?;
        let queues = self.get_json(&format!("/cc/{cc}/services/state")).await?;
        let cases = self.get_json(&format!("/cc/{cc}/services/cases")).await?;

        let batch = UpstreamBatch {
            agents: wire::agents_from_payload(&agents, now),
            queues: wire::queues_from_payload(&queues),
            calls: wire::calls_from_payload(&cases),
        };
        debug!(
            agents = batch.agents.len(),
            queues = batch.queues.len(),
            calls = batch.calls.len(),
            "upstream batch fetched"
        );
        Ok(batch)
    }

    /// GET a resource path as JSON.
    ///
    /// Re-authenticates once on 401/403 and follows one failover redirect.
    ///
    /// # Errors
    ///
    /// `AppError::Fatal` when credentials are rejected twice or upstream
    /// answers with another 4xx; `AppError::Transient` for network errors,
    /// 5xx, 429, repeated redirects and undecodable bodies.
    pub async fn get_json(&mut self, path: &str) -> Result<Value> {
        let mut reauthenticated = false;
        let mut redirected = false;

        loop {
            let bearer = self.session.bearer(&self.http, Utc::now()).await?;
            let url = format!("{}{path}", self.session.base_url());
            let response = self.http.get(&url).bearer_auth(bearer).send().await?;
            let status = response.status();

            if status.is_success() {
                return response
                    .json::<Value>()
                    .await
                    .map_err(|err| AppError::Transient(format!("malformed payload from {path}: {err}")));
            }

            match status {
                StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT if !redirected => {
                    let location = response
                        .headers()
                        .get(LOCATION)
                        .and_then(|v| v.to_str().ok())
                        .ok_or_else(|| {
                            AppError::Transient(format!("redirect from {path} without location"))
                        })?;
                    let origin = failover_origin(&url, location)?;
                    self.session.redirect_to(origin);
                    redirected = true;
                }
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN if !reauthenticated => {
                    warn!(%status, path, "upstream rejected token, re-authenticating");
                    self.session.invalidate();
                    reauthenticated = true;
                }
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(AppError::Fatal(format!(
                        "upstream rejected credentials after re-authentication ({status})"
                    )));
                }
                s if s.is_redirection() => {
                    return Err(AppError::Transient(format!(
                        "upstream kept redirecting {path} ({status})"
                    )));
                }
                s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                    return Err(AppError::Transient(format!("upstream {path} returned {status}")));
                }
                _ => {
                    return Err(AppError::Fatal(format!("upstream {path} returned {status}")));
                }
            }
        }
    }
}

impl UpstreamSource for TrioClient {
    fn fetch(&mut self) -> Pin<Box<dyn Future<Output = Result<UpstreamBatch>> + Send + '_>> {
        let span = info_span!("upstream_fetch", base = %self.session.base_url());
        Box::pin(self.fetch_all().instrument(span))
    }
}

/// Origin (`scheme://host[:port]`) of a redirect target, resolved against
/// the request URL when relative.
fn failover_origin(request_url: &str, location: &str) -> Result<String> {
    let base = Url::parse(request_url)
        .map_err(|err| AppError::Transient(format!("bad request url {request_url}: {err}")))?;
    let target = base
        .join(location)
        .map_err(|err| AppError::Transient(format!("bad redirect location {location}: {err}")))?;
    Ok(target.origin().ascii_serialization())
}
