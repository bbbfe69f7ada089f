//! Adaptive pacing for upstream calls.
//!
//! Every upstream request goes through [`Gateway::call`], which waits before
//! dispatching (until the quota window resets when it is exhausted, otherwise
//! for the current adaptive delay), feeds the response's quota back into the
//! delay, and retries rate-limited calls with exponential backoff.

use std::time::Duration;

use serde::Deserialize;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, warn};

use crate::webflow::{Error, Paced, Quota};

/// Quota assumed before the first response reports one.
const INITIAL_QUOTA: u32 = 60;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PacingConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_retries: u32,
    pub reset_buffer_ms: u64,
    /// Fixed delay between consecutive pages of one listing.
    pub page_delay_ms: u64,
    /// Fixed delay between consecutive pages or collections of a sync run.
    pub unit_delay_ms: u64,
    pub low_quota: u32,
    pub high_quota: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 500,
            max_delay_ms: 5000,
            backoff_multiplier: 1.5,
            max_retries: 3,
            reset_buffer_ms: 1000,
            page_delay_ms: 500,
            unit_delay_ms: 500,
            low_quota: 10,
            high_quota: 30,
        }
    }
}

impl PacingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(format!(
                "min_delay_ms ({}) exceeds max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            ));
        }
        if self.backoff_multiplier <= 1.0 {
            return Err(format!(
                "backoff_multiplier must be greater than 1, got {}",
                self.backoff_multiplier
            ));
        }
        if self.low_quota > self.high_quota {
            return Err(format!(
                "low_quota ({}) exceeds high_quota ({})",
                self.low_quota, self.high_quota
            ));
        }
        Ok(())
    }

    fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug)]
struct State {
    remaining: u32,
    reset_at: Option<Instant>,
    delay: Duration,
}

pub struct Gateway {
    config: PacingConfig,
    state: Mutex<State>,
}

impl Gateway {
    pub fn new(config: PacingConfig) -> Self {
        let delay = config.min_delay();
        Self {
            config,
            state: Mutex::new(State {
                remaining: INITIAL_QUOTA,
                reset_at: None,
                delay,
            }),
        }
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.config.page_delay_ms)
    }

    pub fn unit_delay(&self) -> Duration {
        Duration::from_millis(self.config.unit_delay_ms)
    }

    pub async fn current_delay(&self) -> Duration {
        self.state.lock().await.delay
    }

    async fn wait_time(&self) -> Duration {
        let state = self.state.lock().await;
        let now = Instant::now();
        match state.reset_at {
            Some(reset_at) if state.remaining == 0 && reset_at > now => {
                reset_at - now + Duration::from_millis(self.config.reset_buffer_ms)
            }
            _ => state.delay,
        }
    }

    /// Feeds a response's quota back into the pacing state.
    pub async fn observe(&self, quota: Quota) {
        let mut state = self.state.lock().await;
        if let Some(reset_after) = quota.reset_after {
            state.reset_at = Some(Instant::now() + reset_after);
        }
        let Some(remaining) = quota.remaining else {
            return;
        };
        state.remaining = remaining;
        if remaining < self.config.low_quota {
            state.delay = state
                .delay
                .mul_f64(self.config.backoff_multiplier)
                .min(self.config.max_delay());
            debug!(remaining, delay = ?state.delay, "tightening request pacing");
        } else if remaining > self.config.high_quota {
            state.delay = state
                .delay
                .div_f64(self.config.backoff_multiplier)
                .max(self.config.min_delay());
        }
    }

    async fn backoff(&self, retry: u32) -> Duration {
        let delay = self.state.lock().await.delay;
        delay
            .mul_f64(self.config.backoff_multiplier.powi(retry as i32 + 1))
            .min(self.config.max_delay())
    }

    /// Runs `request` under the pacing policy. Only rate-limit errors are retried.
    pub async fn call<T, F, Fut>(&self, mut request: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Paced<T>, Error>>,
    {
        let mut retry = 0;
        loop {
            let wait = self.wait_time().await;
            tokio::time::sleep(wait).await;
            match request().await {
                Ok(Paced { body, quota }) => {
                    if let Some(quota) = quota {
                        self.observe(quota).await;
                    }
                    return Ok(body);
                }
                Err(error) if error.is_rate_limited() && retry < self.config.max_retries => {
                    if let Some(quota) = error.quota() {
                        self.observe(quota).await;
                    }
                    let backoff = self.backoff(retry).await;
                    retry += 1;
                    warn!(retry, ?backoff, "rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn ok(quota: Option<Quota>) -> Result<Paced<()>, Error> {
        Ok(Paced { body: (), quota })
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_reset_when_quota_is_exhausted() {
        let gateway = Gateway::new(PacingConfig::default());
        gateway
            .observe(Quota {
                remaining: Some(0),
                reset_after: Some(Duration::from_millis(2000)),
            })
            .await;
        let started = Instant::now();
        gateway.call(|| async { ok(None) }).await.unwrap();
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(2000), "waited {waited:?}");
        assert!(waited <= Duration::from_millis(3100), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_retried_then_propagated() {
        let gateway = Gateway::new(PacingConfig::default());
        let calls = AtomicUsize::new(0);
        let result = gateway
            .call(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<Paced<()>, _>(Error::RateLimited(None)) }
            })
            .await;
        assert!(matches!(result, Err(Error::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_recovers() {
        let gateway = Gateway::new(PacingConfig::default());
        let calls = AtomicUsize::new(0);
        let result = gateway
            .call(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(Error::RateLimited(None))
                    } else {
                        Ok(Paced::new(attempt))
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_response_quota_is_observed() {
        let gateway = Gateway::new(PacingConfig::default());
        let calls = AtomicUsize::new(0);
        let started = Instant::now();
        gateway
            .call(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(Error::RateLimited(Some(Quota {
                            remaining: Some(0),
                            reset_after: Some(Duration::from_secs(3)),
                        })))
                    } else {
                        ok(None)
                    }
                }
            })
            .await
            .unwrap();
        // First dispatch at 500ms, then held until the reset plus its buffer.
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(4500), "waited {waited:?}");
        assert!(gateway.current_delay().await > Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let gateway = Gateway::new(PacingConfig::default());
        let calls = AtomicUsize::new(0);
        let result = gateway
            .call(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<Paced<()>, _>(Error::Status {
                        status: reqwest::StatusCode::NOT_FOUND,
                        body: String::new(),
                    })
                }
            })
            .await;
        assert!(matches!(result, Err(Error::Status { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_adapts_within_bounds() {
        let gateway = Gateway::new(PacingConfig::default());
        let low = Quota {
            remaining: Some(3),
            reset_after: None,
        };
        for _ in 0..20 {
            gateway.call(|| async { ok(Some(low)) }).await.unwrap();
        }
        assert_eq!(gateway.current_delay().await, Duration::from_millis(5000));

        let high = Quota {
            remaining: Some(50),
            reset_after: None,
        };
        for _ in 0..20 {
            gateway.call(|| async { ok(Some(high)) }).await.unwrap();
        }
        assert_eq!(gateway.current_delay().await, Duration::from_millis(500));
    }

    #[test]
    fn test_validate() {
        assert!(PacingConfig::default().validate().is_ok());
        let inverted = PacingConfig {
            min_delay_ms: 6000,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
        let flat = PacingConfig {
            backoff_multiplier: 1.0,
            ..Default::default()
        };
        assert!(flat.validate().is_err());
    }
}
