//! Resilient HTTP GET for JSON metadata and binary blobs.
//!
//! Every request is retried on rate limiting, transient gateway errors and
//! transport failures, sleeping `base * 2^(attempt - 1) + jitter` between
//! attempts. Any other non-success status fails immediately.

use std::{
    error::Error as StdError,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use rand::Rng;
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Client, StatusCode,
};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// HTTP statuses that indicate the server may answer differently next time.
const RETRY_STATUSES: &[u16] = &[429, 500, 502, 503, 504, 520, 522, 524];

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub attempts: u32,
    pub base: Duration,
    /// Upper bound of the uniform jitter added to each delay.
    pub jitter: Duration,
}

impl RetryPolicy {
    pub const JSON: RetryPolicy = RetryPolicy {
        attempts: 6,
        base: Duration::from_millis(700),
        jitter: Duration::from_millis(500),
    };

    pub const BYTES: RetryPolicy = RetryPolicy {
        attempts: 5,
        base: Duration::from_millis(500),
        jitter: Duration::from_millis(400),
    };

    /// Delay after the given failed attempt (1-indexed), before jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.base * 2u32.pow(attempt.saturating_sub(1))
    }

    fn delay(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.0..=self.jitter.as_secs_f64());
        self.base_delay(attempt) + Duration::from_secs_f64(jitter)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: StatusCode },

    #[error("request to {url} failed")]
    Transport {
        url: String,
        source: reqwest::Error,
    },

    #[error("malformed JSON from {url}")]
    BadJson {
        url: String,
        source: serde_json::Error,
    },

    #[error("giving up on {url} after {attempts} attempts")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => RETRY_STATUSES.contains(&status.as_u16()),
            FetchError::Transport { .. } => true,
            FetchError::BadJson { .. } | FetchError::Exhausted { .. } => false,
        }
    }
}

/// Renders an error and its causes on one line, like `outer: inner`.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut rendered = err.to_string();
    let mut cause = err.source();

    while let Some(inner) = cause {
        rendered.push_str(": ");
        rendered.push_str(&inner.to_string());
        cause = inner.source();
    }

    rendered
}

/// Something that can wait between attempts. Swapped out in tests so that
/// backoff delays can be observed without actually sleeping.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Owns the HTTP connection pool for one run. Stateless across calls apart
/// from that pool.
pub struct Fetcher {
    client: Client,
    timeout: Duration,
    sleeper: Arc<dyn Sleeper>,
    json_policy: RetryPolicy,
    bytes_policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            timeout,
            sleeper: Arc::new(TokioSleeper),
            json_policy: RetryPolicy::JSON,
            bytes_policy: RetryPolicy::BYTES,
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Fetches and deserializes a JSON document. A `_ts` query parameter is
    /// added to every attempt so intermediary caches never answer for us.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let body = self.get_with_retry(url, self.json_policy, true).await?;

        serde_json::from_slice(&body).map_err(|source| FetchError::BadJson {
            url: url.to_owned(),
            source,
        })
    }

    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.get_with_retry(url, self.bytes_policy, false).await
    }

    async fn get_with_retry(
        &self,
        url: &str,
        policy: RetryPolicy,
        cache_bust: bool,
    ) -> Result<Vec<u8>, FetchError> {
        let mut attempt = 1;

        loop {
            let err = match self.get_once(url, cache_bust).await {
                Ok(body) => return Ok(body),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            if attempt >= policy.attempts {
                return Err(FetchError::Exhausted {
                    url: url.to_owned(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = policy.delay(attempt);
            log::debug!(
                "attempt {}/{} failed ({}), retrying in {:.2}s",
                attempt,
                policy.attempts,
                error_chain(&err),
                delay.as_secs_f64()
            );

            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }

    async fn get_once(&self, url: &str, cache_bust: bool) -> Result<Vec<u8>, FetchError> {
        let transport = |source: reqwest::Error| FetchError::Transport {
            url: url.to_owned(),
            source,
        };

        let mut request = self.client.get(url).timeout(self.timeout);
        if cache_bust {
            request = request.query(&[("_ts", timestamp_millis())]);
        }

        let response = request.send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_owned(),
                status,
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        Ok(body.to_vec())
    }
}

fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
