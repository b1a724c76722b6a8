//! Resilient request execution against the hosting API.
//!
//! Every outbound call goes through [`Executor::execute`], which wraps a single GET in
//! [`seatbelt`] retry and timeout middleware. Rate limiting, server errors and transport
//! failures (including a body that cannot be read in full) are waited out and retried;
//! any other unsuccessful status is final. Callers never retry on their own, they decide
//! what a [`RequestFailure`] means for the unit of work at hand.

use core::fmt::{Display, Formatter};
use core::time::Duration;
use layered::{Execute, Service, Stack};
use ohno::IntoAppError;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::StatusCode;
use seatbelt::retry::{Backoff, Retry};
use seatbelt::timeout::Timeout;
use seatbelt::{RecoveryInfo, ResilienceContext};
use serde::de::DeserializeOwned;
use tick::Clock;
use url::Url;

const LOG_TARGET: &str = "      http";
const USER_AGENT: &str = "repo-census";
const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// How hard the executor tries before giving up on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Wait after a rate-limit response that carries no usable `Retry-After` header.
    pub rate_limit_wait: Duration,

    /// Upper bound for a server-requested `Retry-After` wait.
    pub max_rate_limit_wait: Duration,

    /// Wait after a 5xx response.
    pub server_error_wait: Duration,

    /// Wait after a connection, DNS, timeout or body read failure.
    pub transport_error_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_wait: Duration::from_secs(60),
            max_rate_limit_wait: Duration::from_hours(1),
            server_error_wait: Duration::from_secs(5),
            transport_error_wait: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Wait before retrying a rate-limited request.
    ///
    /// A server-requested `Retry-After` is honored up to `max_rate_limit_wait`.
    #[must_use]
    pub fn rate_limit_delay(&self, retry_after_secs: Option<u64>) -> Duration {
        retry_after_secs.map_or(self.rate_limit_wait, |secs| Duration::from_secs(secs).min(self.max_rate_limit_wait))
    }

    /// Wait before the next attempt, or `None` when the outcome is final.
    const fn retry_delay(&self, outcome: &Result<ApiResponse, AttemptError>) -> Option<Duration> {
        match outcome {
            Ok(_) | Err(AttemptError::Rejected(_)) => None,
            Err(AttemptError::RateLimited(wait)) => Some(*wait),
            Err(AttemptError::ServerError(_)) => Some(self.server_error_wait),
            Err(AttemptError::Transport(_)) => Some(self.transport_error_wait),
        }
    }

    fn recovery(&self, outcome: &Result<ApiResponse, AttemptError>) -> RecoveryInfo {
        self.retry_delay(outcome)
            .map_or_else(RecoveryInfo::never, |delay| RecoveryInfo::retry().delay(delay))
    }
}

/// Why a request produced no usable response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    /// The server answered with a status that is never retried.
    Rejected { url: String, status: StatusCode },

    /// Every attempt ended in a transient failure.
    Exhausted { url: String, attempts: u32, last_error: String },

    /// The endpoint could not be turned into a URL.
    InvalidEndpoint { endpoint: String, reason: String },
}

impl RequestFailure {
    /// Returns `true` when the failure came from a status that is never retried.
    #[must_use]
    pub const fn is_definitive(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::InvalidEndpoint { .. })
    }
}

impl Display for RequestFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Rejected { url, status } => write!(f, "request to '{url}' was rejected with HTTP {status}"),
            Self::Exhausted { url, attempts, last_error } => {
                write!(f, "request to '{url}' failed after {attempts} attempt(s): {last_error}")
            }
            Self::InvalidEndpoint { endpoint, reason } => write!(f, "invalid endpoint '{endpoint}': {reason}"),
        }
    }
}

impl core::error::Error for RequestFailure {}

/// A successful response whose body has been read in full.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl ApiResponse {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }
}

/// Why a single attempt did not produce a response.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AttemptError {
    RateLimited(Duration),
    ServerError(StatusCode),
    Transport(String),
    Rejected(StatusCode),
}

impl Display for AttemptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::RateLimited(_) => write!(f, "rate limit exceeded"),
            Self::ServerError(status) => write!(f, "server error {status}"),
            Self::Transport(e) => write!(f, "{e}"),
            Self::Rejected(status) => write!(f, "rejected with HTTP {status}"),
        }
    }
}

/// Issues GET requests against a hosting API with bounded retry.
#[derive(Debug, Clone)]
pub struct Executor {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    policy: RetryPolicy,
}

impl Executor {
    /// Create an executor for the API rooted at `base_url`.
    ///
    /// `request_timeout` bounds each attempt, including reading the body.
    pub fn new(base_url: impl Into<String>, token: Option<&str>, request_timeout: Duration, policy: RetryPolicy) -> crate::Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));

        if let Some(t) = token {
            let mut auth_val = HeaderValue::from_str(&format!("token {t}")).into_app_err("invalid characters in API token")?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .into_app_err("unable to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            request_timeout,
            policy,
        })
    }

    /// Perform a GET of `endpoint` (relative to the base URL) with the given query parameters.
    ///
    /// Rate-limit waits consume an attempt just like server and transport errors, so a
    /// request always terminates after at most [`RetryPolicy::max_attempts`] tries.
    pub async fn execute(&self, endpoint: &str, query: &[(&str, String)]) -> Result<ApiResponse, RequestFailure> {
        let mut url = self.endpoint_url(endpoint)?;
        if !query.is_empty() {
            let _ = url.query_pairs_mut().extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let policy = self.policy;
        let client = self.client.clone();
        let retry_url = url.to_string();

        let clock = Clock::new_tokio();
        let context = ResilienceContext::new(&clock).name("api_get");

        let service = (
            Retry::layer("retry", &context)
                .clone_input()
                .recovery_with(move |outcome: &Result<ApiResponse, AttemptError>, _| policy.recovery(outcome))
                .max_retry_attempts(max_attempts - 1)
                .base_delay(policy.transport_error_wait)
                .backoff(Backoff::Constant)
                .on_retry(move |_output, args| {
                    log::debug!(
                        target: LOG_TARGET,
                        "Retrying '{retry_url}' (attempt {}/{max_attempts}, delay {}ms)",
                        args.attempt().index() + 1,
                        args.retry_delay().as_millis(),
                    );
                }),
            Timeout::layer("timeout", &context)
                .timeout_error(|_| AttemptError::Transport("request timed out".into()))
                .timeout(self.request_timeout),
            Execute::new(move |url: Url| {
                let client = client.clone();
                async move { attempt(&client, &policy, url).await }
            }),
        )
            .into_service();

        match service.execute(url.clone()).await {
            Ok(response) => Ok(response),
            Err(AttemptError::Rejected(status)) => {
                log::debug!(target: LOG_TARGET, "'{url}' rejected with HTTP {status}, not retrying");
                Err(RequestFailure::Rejected {
                    url: url.to_string(),
                    status,
                })
            }
            Err(e) => {
                log::error!(target: LOG_TARGET, "All {max_attempts} attempt(s) for '{url}' failed");
                Err(RequestFailure::Exhausted {
                    url: url.to_string(),
                    attempts: max_attempts,
                    last_error: e.to_string(),
                })
            }
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, RequestFailure> {
        let joined = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint.trim_start_matches('/'));
        Url::parse(&joined).map_err(|e| RequestFailure::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}

/// One GET, classified. A successful response is only returned once its body is in hand.
async fn attempt(client: &reqwest::Client, policy: &RetryPolicy, url: Url) -> Result<ApiResponse, AttemptError> {
    let response = client.get(url.clone()).send().await.map_err(|e| {
        log::warn!(target: LOG_TARGET, "Could not reach '{url}': {e:#}");
        AttemptError::Transport(format!("{e:#}"))
    })?;

    let status = response.status();
    let headers = response.headers().clone();

    if status.is_success() {
        let body = response.text().await.map_err(|e| {
            log::warn!(target: LOG_TARGET, "Could not read the response body of '{url}': {e:#}");
            AttemptError::Transport(format!("could not read response body: {e:#}"))
        })?;

        return Ok(ApiResponse { status, headers, body });
    }

    if status.is_server_error() {
        log::warn!(target: LOG_TARGET, "Server error {status} on '{url}'");
        return Err(AttemptError::ServerError(status));
    }

    let wait = policy.rate_limit_delay(parse_retry_after(&headers));
    let rate_limited = || {
        log::warn!(target: LOG_TARGET, "Rate limited on '{url}', waiting {}s", wait.as_secs());
        AttemptError::RateLimited(wait)
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(rate_limited());
    }

    if status == StatusCode::FORBIDDEN {
        if quota_exhausted(&headers) {
            return Err(rate_limited());
        }

        return match response.text().await {
            Ok(body) if mentions_rate_limit(&body) => Err(rate_limited()),
            Ok(_) => Err(AttemptError::Rejected(status)),
            Err(e) => Err(AttemptError::Transport(format!("could not read response body: {e:#}"))),
        };
    }

    Err(AttemptError::Rejected(status))
}

/// Parse the `Retry-After` header value as seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()
}

/// GitHub reports an exhausted primary quota with `x-ratelimit-remaining: 0`.
fn quota_exhausted(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|h| h.to_str().ok())
        .is_some_and(|v| v.trim() == "0")
}

fn mentions_rate_limit(body: &str) -> bool {
    body.to_lowercase().contains("rate limit")
}
