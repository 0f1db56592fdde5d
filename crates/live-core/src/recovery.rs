//! Bounded retry with exponential backoff
//!
//! Used for operations whose failure is local to one piece of the session, such
//! as subscribing to a single remote track. Credential fetches and hub connects
//! are never retried here: a failed join is retried by the caller with a fresh
//! `join()`.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::SubscribeError;

/// Retry policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after `delay`, capped at `max_delay`
    fn next_delay(&self, delay: Duration) -> Duration {
        let next_ms = (delay.as_millis() as f64 * self.backoff_multiplier) as u64;
        Duration::from_millis(next_ms).min(self.max_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.use_jitter {
            return delay;
        }
        let jitter = (rand::random::<f64>() - 0.5) * 0.2;
        let millis = delay.as_millis() as f64;
        Duration::from_millis((millis * (1.0 + jitter)) as u64)
    }
}

/// Errors that can say whether another attempt is worthwhile
pub trait Recoverable {
    /// `true` if retrying could succeed
    fn is_recoverable(&self) -> bool;
}

impl Recoverable for SubscribeError {
    fn is_recoverable(&self) -> bool {
        SubscribeError::is_recoverable(self)
    }
}

/// Outcome of [`retry_with_backoff`]
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    /// The operation succeeded
    Succeeded { value: T, attempts: u32 },
    /// The operation failed for good
    Failed { error: E, attempts: u32 },
    /// `should_stop` asked to give up before the next attempt
    Stopped { attempts: u32 },
}

/// Run `operation` until it succeeds, fails unrecoverably, runs out of attempts,
/// or `should_stop` returns `true` before a retry
pub async fn retry_with_backoff<T, E, F, Fut, S>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
    should_stop: S,
) -> RetryOutcome<T, E>
where
    E: Recoverable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    S: Fn() -> bool,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;
        debug!(
            operation = operation_name,
            attempt = attempt,
            max_attempts = config.max_attempts,
            "Attempting operation"
        );

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retries"
                    );
                }
                return RetryOutcome::Succeeded {
                    value,
                    attempts: attempt,
                };
            }
            Err(e) if e.is_recoverable() && attempt < config.max_attempts => {
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %e,
                    next_delay_ms = delay.as_millis() as u64,
                    "Recoverable error, will retry"
                );

                sleep(config.jittered(delay)).await;
                delay = config.next_delay(delay);

                if should_stop() {
                    debug!(operation = operation_name, attempt = attempt, "Retry abandoned");
                    return RetryOutcome::Stopped { attempts: attempt };
                }
            }
            Err(error) => {
                return RetryOutcome::Failed {
                    error,
                    attempts: attempt,
                };
            }
        }
    }
}
