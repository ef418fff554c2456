//! Async HTTP client wrapping reqwest.
//!
//! Single GET requests with a hard timeout and a desktop browser user-agent.
//! No retries: a failed request is reported once and the caller gives up.

use std::time::{Duration, Instant};

use serde_json::Value;

use crate::types::{FetchError, FetchResult};

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects.
    pub final_url: String,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Parse the body as JSON.
    pub fn json(&self) -> FetchResult<Value> {
        serde_json::from_slice(&self.body).map_err(|e| {
            FetchError::Network(format!("response from {} is not JSON: {e}", self.final_url))
        })
    }
}

/// HTTP client for the fetch routines.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client whose requests give up after `timeout_ms`.
    pub fn new(timeout_ms: u64, user_agent: &str) -> FetchResult<Self> {
        let timeout = Duration::from_millis(timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client, timeout })
    }

    /// Perform a single GET request. Any non-2xx status is an error.
    pub async fn get(&self, url: &str) -> FetchResult<HttpResponse> {
        let started = Instant::now();
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FetchError::Network(format!("GET {url} failed: {e}")))?;

        let status = resp.status();
        let final_url = resp.url().to_string();
        if !status.is_success() {
            return Err(FetchError::Network(format!("GET {url} returned {status}")));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Network(format!("reading body of {url} failed: {e}")))?;

        tracing::debug!(
            "GET {url}: {status}, {} bytes in {:?}",
            body.len(),
            started.elapsed()
        );

        Ok(HttpResponse {
            final_url,
            body: body.to_vec(),
        })
    }

    /// GET a URL and parse the body as JSON.
    pub async fn get_json(&self, url: &str) -> FetchResult<Value> {
        self.get(url).await?.json()
    }
}
