//! Connection retry with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::broker::{Broker, BrokerConnector};

/// Backoff schedule for broker connection attempts.
///
/// Defaults: 10 attempts, 2s initial delay doubling up to 30s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total connection attempts before giving up.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Growth factor applied after each failure.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (0-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Connects through `connector`, retrying per `policy`.
///
/// Returns `None` once the attempts are exhausted or `cancel` fires; callers
/// continue in a degraded mode without a broker.
pub async fn connect_with_backoff(
    connector: &dyn BrokerConnector,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Option<Arc<dyn Broker>> {
    for attempt in 0..policy.max_attempts {
        match connector.connect().await {
            Ok(broker) => {
                if attempt > 0 {
                    info!(attempt = attempt + 1, "broker connected after retry");
                }
                return Some(broker);
            }
            Err(err) => {
                if attempt + 1 >= policy.max_attempts {
                    error!(
                        attempts = policy.max_attempts,
                        error = %err,
                        "broker unreachable, giving up"
                    );
                    return None;
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "broker connection failed, retrying"
                );
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("broker connection abandoned on shutdown");
                        return None;
                    }
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
    None
}
