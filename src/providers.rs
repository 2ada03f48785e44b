//! Shared plumbing for external service providers
//!
//! Classification and embedding lookups go through the same HTTP client
//! shape: bounded timeout, a small fixed number of retries with backoff, and
//! a per-provider circuit breaker so a dead service degrades to an explicit
//! unavailable result instead of stalling every batch.

use crate::error::{Error, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

/// JSON-over-HTTP backend client with retry support
pub struct BackendClient {
    client: Client,
    base_url: Url,
    retries: usize,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout_secs: u64, retries: usize) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url,
            retries,
        })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid backend URL: {}", e)))
    }

    /// POST a JSON body and deserialize the JSON response, retrying on failure
    pub async fn post_json<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        let request = self.client.post(url).json(body);
        self.send_with_retry(request).await
    }

    async fn send_with_retry<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let mut last_err: Option<Error> = None;
        for attempt in 0..=self.retries {
            let req = request
                .try_clone()
                .ok_or_else(|| Error::Unavailable("Failed to clone backend request".to_string()))?;
            match req.send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(ok) => return Ok(ok.json::<T>().await?),
                    Err(e) => last_err = Some(Error::Unavailable(e.to_string())),
                },
                Err(e) => last_err = Some(Error::Unavailable(e.to_string())),
            }

            if attempt < self.retries {
                tokio::time::sleep(Duration::from_millis(200 * (attempt + 1) as u64)).await;
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Unavailable("Backend request failed".to_string())))
    }
}

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Requests flow normally
    Closed,
    /// Requests are rejected without touching the provider
    Open,
    /// A trial request is allowed to probe recovery
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Per-provider circuit breaker
///
/// Opens after `failure_threshold` consecutive failures; after `reset`
/// elapses a single trial request is admitted, and one success closes the
/// circuit again.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset: Duration,
    inner: Arc<RwLock<BreakerInner>>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset: Duration) -> Self {
        Self {
            failure_threshold,
            reset,
            inner: Arc::new(RwLock::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure: None,
            })),
        }
    }

    /// Whether a request should be attempted right now
    pub async fn allow_request(&self) -> bool {
        let mut inner = self.inner.write().await;
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|t| t.elapsed() >= self.reset)
                    .unwrap_or(true);
                if elapsed {
                    debug!("Circuit breaker transitioning to half-open");
                    inner.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call; closes the circuit
    pub async fn record_success(&self) {
        let mut inner = self.inner.write().await;
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.last_failure = None;
    }

    /// Record a failed call; may open the circuit
    pub async fn record_failure(&self) {
        let mut inner = self.inner.write().await;
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());
        if inner.state == BreakerState::HalfOpen
            || inner.failure_count >= self.failure_threshold
        {
            if inner.state != BreakerState::Open {
                warn!(
                    "Circuit breaker opened after {} consecutive failures",
                    inner.failure_count
                );
            }
            inner.state = BreakerState::Open;
        }
    }

    pub async fn state(&self) -> BreakerState {
        self.inner.read().await.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_breaker_opens_after_threshold() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        assert!(breaker.allow_request().await);

        for _ in 0..3 {
            breaker.record_failure().await;
        }
        assert_eq!(breaker.state().await, BreakerState::Open);
        assert!(!breaker.allow_request().await);
    }

    #[tokio::test]
    async fn test_breaker_success_resets_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.record_success().await;
        breaker.record_failure().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_breaker_half_open_after_reset() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(breaker.allow_request().await);
        assert_eq!(breaker.state().await, BreakerState::HalfOpen);

        // A failure while half-open re-opens immediately
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, BreakerState::Open);
    }

    #[tokio::test]
    async fn test_breaker_closes_on_half_open_success() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.record_failure().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(breaker.allow_request().await);
        breaker.record_success().await;
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[test]
    fn test_backend_client_rejects_bad_url() {
        assert!(BackendClient::new("not a url", 30, 2).is_err());
    }
}
