use rand::Rng;
use std::{future::Future, time::Duration};
use tracing::debug;

/// Exponential backoff delay with ±30% jitter: `base * 2^attempt`.
pub fn calculate_backoff_delay(attempt: u32, base: Duration) -> Duration {
    // 2^10 is plenty; keeps the multiplication from overflowing
    let capped_attempt = attempt.min(10);
    let base_ms = base.as_millis() as u64;
    let delay_ms = base_ms.saturating_mul(2_u64.saturating_pow(capped_attempt));

    let jitter_factor = rand::thread_rng().gen_range(0.7..1.3);
    Duration::from_millis((delay_ms as f64 * jitter_factor).round() as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Exponential,
        }
    }

    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            backoff: Backoff::Fixed,
        }
    }

    /// A single attempt and no waiting.
    pub const fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Delay to wait after the failed attempt numbered `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential => calculate_backoff_delay(attempt, self.base_delay),
        }
    }
}

/// Runs `op` up to `policy.max_attempts` times, retrying only errors for
/// which `is_transient` holds.
pub async fn with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    mut op: F,
    is_transient: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts || !is_transient(&err) {
                    return Err(err);
                }

                let delay = policy.delay_for(attempt - 1);
                debug!(attempt, max_attempts, delay_ms = delay.as_millis() as u64, error = %err, "Retrying after transient failure");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
