//! HTTP fetching
//!
//! The [`PageFetcher`] trait is the crawl's seam to the network: the
//! production implementation wraps a shared reqwest client, and tests
//! substitute a deterministic fixture. The fetcher classifies responses;
//! retry policy lives with the rate limiter, not here.

use crate::config::CacheMode;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CACHE_CONTROL};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Classified result of one fetch attempt
#[derive(Debug)]
pub enum FetchResponse {
    /// 2xx response with a body
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status: u16,
        /// Content-Type header value (empty if absent)
        content_type: String,
        /// Response body
        body: String,
    },

    /// The server signaled rate limiting (HTTP 429)
    Throttled,

    /// Any other non-success HTTP status
    HttpError { status: u16 },

    /// Connection, TLS, timeout, or body-read failure
    NetworkError { error: String },
}

/// Network seam for the crawl
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches one URL, threading the cache directive through unchanged
    async fn fetch(&self, url: &Url, cache_mode: CacheMode) -> FetchResponse;
}

/// Builds the shared HTTP client
///
/// One client for the whole crawl: connection pooling across tasks is the
/// point. Compressed transfer is negotiated; redirects are followed by
/// reqwest's default policy.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let user_agent = format!("fathom/{}", env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Production fetcher over reqwest
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client()?,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, cache_mode: CacheMode) -> FetchResponse {
        let mut request = self.client.get(url.clone());

        request = match cache_mode {
            CacheMode::Enabled => request,
            CacheMode::Bypass => {
                request.header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            }
            CacheMode::Refresh => request.header(
                CACHE_CONTROL,
                HeaderValue::from_static("no-cache, must-revalidate"),
            ),
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let error = if e.is_timeout() {
                    "request timeout".to_string()
                } else if e.is_connect() {
                    "connection failed".to_string()
                } else {
                    e.to_string()
                };
                return FetchResponse::NetworkError { error };
            }
        };

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return FetchResponse::Throttled;
        }

        if !status.is_success() {
            return FetchResponse::HttpError {
                status: status.as_u16(),
            };
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        match response.text().await {
            Ok(body) => FetchResponse::Success {
                final_url,
                status: status.as_u16(),
                content_type,
                body,
            },
            Err(e) => FetchResponse::NetworkError {
                error: format!("body read failed: {}", e),
            },
        }
    }
}
