//! Outbound HTTP with an explicit, injectable retry policy.
//!
//! Every provider and the document store go through [`HttpClient`]. Retries
//! for transient statuses (429/5xx by default) and transport failures happen
//! here, transparently to callers; anything else is returned as an
//! [`HttpError`] for the caller to classify.

use std::time::Duration;

use anyhow::Context;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::HttpConfig;

const USER_AGENT: &str = concat!("pricesync/", env!("CARGO_PKG_VERSION"));

/// When and how often a failed request is re-sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; 1 disables retries.
    pub max_attempts: u32,
    /// Delay before the first retry, doubled for each subsequent one.
    pub backoff: Duration,
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
            retry_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
            retry_statuses: Vec::new(),
        }
    }

    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff,
            retry_statuses: config.retry_statuses.clone(),
        }
    }

    pub fn is_retryable(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status.as_u16())
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.backoff.saturating_mul(factor)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} rejected: {status} {body}")]
    Rejected {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A request description, rebuilt for every attempt.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub method: &'a Method,
    pub url: &'a str,
    pub headers: Option<&'a HeaderMap>,
    pub query: &'a [(&'a str, &'a str)],
    pub body: Option<&'a Value>,
}

impl<'a> Request<'a> {
    pub fn new(method: &'a Method, url: &'a str) -> Self {
        Self {
            method,
            url,
            headers: None,
            query: &[],
            body: None,
        }
    }

    pub fn headers(mut self, headers: &'a HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn query(mut self, query: &'a [(&'a str, &'a str)]) -> Self {
        self.query = query;
        self
    }

    pub fn json(mut self, body: &'a Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Build a client with a fixed per-request timeout.
    pub fn new(timeout: Duration, retry: RetryPolicy) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, retry })
    }

    pub fn from_config(config: &HttpConfig) -> anyhow::Result<Self> {
        Self::new(config.timeout, RetryPolicy::from_config(config))
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Send a request, retrying per policy. Returns the JSON body, or `None`
    /// for an empty successful response.
    pub async fn send(&self, request: Request<'_>) -> Result<Option<Value>, HttpError> {
        let mut attempt = 1u32;
        loop {
            let retries_left = attempt < self.retry.max_attempts;

            let mut builder = self.client.request(request.method.clone(), request.url);
            if let Some(headers) = request.headers {
                builder = builder.headers(headers.clone());
            }
            if !request.query.is_empty() {
                builder = builder.query(request.query);
            }
            if let Some(body) = request.body {
                builder = builder.json(body);
            }

            let response = match builder.send().await {
                Ok(response) => response,
                Err(source) if retries_left => {
                    debug!(
                        url = request.url,
                        attempt,
                        error = %source.without_url(),
                        "transport error, retrying"
                    );
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    attempt += 1;
                    continue;
                }
                Err(source) => {
                    return Err(HttpError::Transport {
                        url: request.url.to_string(),
                        source: source.without_url(),
                    })
                }
            };

            let status = response.status();
            if retries_left && self.retry.is_retryable(status) {
                debug!(url = request.url, attempt, status = %status, "retryable status, retrying");
                tokio::time::sleep(self.retry.delay_for(attempt)).await;
                attempt += 1;
                continue;
            }

            if status.is_client_error() || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                return Err(HttpError::Rejected {
                    url: request.url.to_string(),
                    status,
                    body,
                });
            }

            let bytes = response.bytes().await.map_err(|source| HttpError::Transport {
                url: request.url.to_string(),
                source: source.without_url(),
            })?;
            if bytes.is_empty() {
                return Ok(None);
            }
            return serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| HttpError::Decode {
                    url: request.url.to_string(),
                    source,
                });
        }
    }

    /// Like [`Self::send`], but logs failures and maps them to `None`.
    pub async fn request_json(&self, request: Request<'_>) -> Option<Value> {
        match self.send(request).await {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "request failed");
                None
            }
        }
    }
}
