//! Blocking HTTP client with a minimum delay between requests and retries for transient failures.

use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; fanfic2ebook/",
    env!("CARGO_PKG_VERSION"),
    ")"
);
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DELAY_SECS: u64 = 2;
const MAX_REDIRECTS: usize = 10;

/// Attempts per request, the first one included.
const DEFAULT_RETRY_COUNT: u32 = 3;
const DEFAULT_BACKOFF_SECS: [u64; 2] = [1, 2];
/// HTTP 429 gets a longer wait so the server can recover.
const BACKOFF_429_SECS: [u64; 4] = [30, 60, 90, 120];

#[derive(Debug)]
pub struct PoliteClient {
    inner: reqwest::blocking::Client,
    delay: Duration,
    last_request: Option<Instant>,
    retry_count: u32,
    backoff_secs: Vec<u64>,
}

impl PoliteClient {
    pub fn builder() -> PoliteClientBuilder {
        PoliteClientBuilder::default()
    }

    /// GET with retries on timeouts, connection errors, HTTP 5xx and HTTP 429.
    ///
    /// Other failures return immediately. When the attempts run out on a retryable status the
    /// last response is returned as-is; the caller decides what a non-success status means.
    pub fn get_with_retry(
        &mut self,
        url: &str,
    ) -> Result<reqwest::blocking::Response, reqwest::Error> {
        let mut attempt: u32 = 0;
        loop {
            self.wait_delay();
            debug!("GET {} (attempt {}/{})", url, attempt + 1, self.retry_count);
            let result = self.inner.get(url).send();
            self.last_request = Some(Instant::now());
            let out_of_attempts = attempt + 1 >= self.retry_count;

            let backoff = match result {
                Ok(response) => {
                    let status = response.status();
                    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS;
                    if out_of_attempts || !(status.is_server_error() || rate_limited) {
                        return Ok(response);
                    }
                    warn!("HTTP {} from {}; retrying", status.as_u16(), url);
                    self.backoff(attempt, rate_limited)
                }
                Err(e) => {
                    if out_of_attempts || !(e.is_timeout() || e.is_connect()) {
                        return Err(e);
                    }
                    warn!("request to {} failed ({}); retrying", url, e);
                    self.backoff(attempt, false)
                }
            };
            std::thread::sleep(backoff);
            attempt += 1;
        }
    }

    fn backoff(&self, attempt: u32, rate_limited: bool) -> Duration {
        let table: &[u64] = if rate_limited {
            &BACKOFF_429_SECS
        } else {
            &self.backoff_secs
        };
        let secs = table
            .get(attempt as usize)
            .or_else(|| table.last())
            .copied()
            .unwrap_or(1);
        Duration::from_secs(secs)
    }

    fn wait_delay(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
    }
}

#[derive(Debug)]
pub struct PoliteClientBuilder {
    user_agent: Option<String>,
    delay_secs: u64,
    timeout_secs: u64,
    retry_count: u32,
    retry_backoff_secs: Vec<u64>,
}

impl Default for PoliteClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            delay_secs: DEFAULT_DELAY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_backoff_secs: DEFAULT_BACKOFF_SECS.to_vec(),
        }
    }
}

impl PoliteClientBuilder {
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Minimum seconds between the end of one request and the start of the next. Default 2.
    pub fn delay_secs(mut self, secs: u64) -> Self {
        self.delay_secs = secs;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Attempts per request, at least 1. Default 3.
    pub fn retry_count(mut self, n: u32) -> Self {
        self.retry_count = n.max(1);
        self
    }

    /// Seconds to wait before each retry; the last value is reused when the list runs out.
    pub fn retry_backoff_secs(mut self, secs: Vec<u64>) -> Self {
        self.retry_backoff_secs = secs;
        self
    }

    pub fn build(self) -> Result<PoliteClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        let backoff_secs = if self.retry_backoff_secs.is_empty() {
            // 1, 2, 4, ... for each retry
            let n = self.retry_count.saturating_sub(1) as usize;
            (0..n).map(|i| 1u64 << i.min(4)).collect::<Vec<_>>()
        } else {
            self.retry_backoff_secs
        };
        Ok(PoliteClient {
            inner,
            delay: Duration::from_secs(self.delay_secs),
            last_request: None,
            retry_count: self.retry_count,
            backoff_secs,
        })
    }
}
