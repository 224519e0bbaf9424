//! Page fetching with exponential backoff.
//!
//! - [`FetchAsync`]: fetch a URL and return its body as text
//! - [`HttpFetcher`]: the `reqwest` implementation
//! - [`RetryFetch`]: decorator retrying any [`FetchAsync`] with backoff and jitter
//!
//! The delay before retry `n` is
//! ```text
//! delay = min(base_delay * 2^(n-1), max_delay) + random_jitter(0..250ms)
//! ```

use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

use crate::config::FetchSettings;
use crate::error::{FeedError, Result};

/// Fetches a document body. Implemented by the HTTP client and by test fakes.
pub trait FetchAsync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Plain HTTP GET with a configured user agent and timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build the client from the configured user agent and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] when the TLS backend cannot be initialized.
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(StdDuration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

impl FetchAsync for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String> {
        let t0 = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched document"
        );
        Ok(body)
    }
}

/// Adds retries with exponential backoff to an inner fetcher.
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryFetch<T>
where
    T: FetchAsync,
{
    /// Wrap `inner` with retry logic.
    ///
    /// # Arguments
    ///
    /// * `inner` - The fetcher to retry
    /// * `max_retries` - Retries after the first attempt
    /// * `base_delay` - Delay before the first retry; doubles each time up to 30s
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    /// Wrap `inner` using the `fetch` section of the config.
    pub fn from_settings(inner: T, settings: &FetchSettings) -> Self {
        Self::new(
            inner,
            settings.max_retries,
            StdDuration::from_millis(settings.base_delay_ms),
        )
    }

    fn delay_for(&self, attempt: usize) -> StdDuration {
        let shift = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + StdDuration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> FetchAsync for RetryFetch<T>
where
    T: FetchAsync,
{
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    // a 4xx will not get better by asking again
                    let retryable = !matches!(e, FeedError::Status { status, .. } if (400..500).contains(&status));
                    if !retryable || attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "fetch() giving up"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "fetch() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Fails `failures` times with the given status, then succeeds.
    struct Flaky {
        failures: usize,
        status: u16,
        calls: Cell<usize>,
    }

    impl FetchAsync for Flaky {
        async fn fetch(&self, url: &str) -> Result<String> {
            let n = self.calls.get();
            self.calls.set(n + 1);
            if n < self.failures {
                Err(FeedError::Status {
                    url: url.to_string(),
                    status: self.status,
                })
            } else {
                Ok("<html></html>".to_string())
            }
        }
    }

    fn flaky(failures: usize, status: u16) -> Flaky {
        Flaky {
            failures,
            status,
            calls: Cell::new(0),
        }
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let api = RetryFetch::new(flaky(2, 503), 3, StdDuration::from_millis(10));
        let body = api.fetch("https://example.com/a1").await.unwrap();
        assert_eq!(body, "<html></html>");
        assert_eq!(api.inner.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let api = RetryFetch::new(flaky(10, 500), 2, StdDuration::from_millis(10));
        let err = api.fetch("https://example.com/a1").await.unwrap_err();
        assert!(matches!(err, FeedError::Status { status: 500, .. }));
        assert_eq!(api.inner.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_client_errors_not_retried() {
        let api = RetryFetch::new(flaky(10, 404), 5, StdDuration::from_millis(10));
        assert!(api.fetch("https://example.com/missing").await.is_err());
        assert_eq!(api.inner.calls.get(), 1);
    }

    #[test]
    fn test_delay_is_capped() {
        let api = RetryFetch::new(flaky(0, 500), 50, StdDuration::from_secs(1));
        assert!(api.delay_for(1) >= StdDuration::from_secs(1));
        assert!(api.delay_for(1) <= StdDuration::from_millis(1250));
        assert!(api.delay_for(40) <= StdDuration::from_millis(30_250));
    }
}
