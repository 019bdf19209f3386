//! Retry mechanisms for adapter calls.
//!
//! This module provides bounded retry with:
//! - Exponential backoff with a configurable base and multiplier
//! - Jitter support (full or equal) to prevent thundering herd
//! - Retry only for errors classified as transient
//! - A fixed attempt ceiling, so retries never loop forever
//!
//! # Example
//!
//! ```rust,ignore
//! use gcprov::retry::{RetryPolicy, JitterStrategy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_attempts(4)
//!     .initial_delay(Duration::from_secs(1))
//!     .jitter(JitterStrategy::Full)
//!     .max_delay(Duration::from_secs(30))
//!     .build();
//!
//! let result = policy.execute(|| adapter.create_bucket(name, params)).await;
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff strategy for calculating delay between retries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Constant delay between retries.
    Constant,

    /// Exponential backoff: delay = initial_delay * multiplier^attempt
    Exponential {
        /// Multiplier for exponential growth (default: 2.0)
        multiplier: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential { multiplier: 2.0 }
    }
}

impl BackoffStrategy {
    /// Calculate the delay for a given retry number (0-indexed).
    pub fn calculate_delay(&self, attempt: u32, initial_delay: Duration) -> Duration {
        let base_millis = initial_delay.as_millis() as f64;

        let delay_millis = match self {
            Self::Constant => base_millis,
            Self::Exponential { multiplier } => base_millis * multiplier.powf(attempt as f64),
        };

        Duration::from_millis(delay_millis.min(u64::MAX as f64) as u64)
    }
}

/// Jitter strategy for adding randomness to delays.
///
/// Jitter helps prevent the "thundering herd" problem where many
/// clients retry at exactly the same time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter - use exact calculated delay.
    None,

    /// Full jitter: random value between 0 and calculated delay.
    #[default]
    Full,

    /// Equal jitter: half the delay plus random jitter.
    /// delay = calculated_delay/2 + random(0, calculated_delay/2)
    Equal,
}

impl JitterStrategy {
    /// Apply jitter to a calculated delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let delay_millis = delay.as_millis() as f64;

        let jittered_millis = match self {
            Self::None => delay_millis,
            Self::Full => {
                if delay_millis > 0.0 {
                    rng.gen_range(0.0..delay_millis)
                } else {
                    0.0
                }
            }
            Self::Equal => {
                let half = delay_millis / 2.0;
                if half > 0.0 {
                    half + rng.gen_range(0.0..half)
                } else {
                    0.0
                }
            }
        };

        Duration::from_millis(jittered_millis.max(0.0) as u64)
    }
}

/// Helper trait for transient error classification.
pub trait TransientError {
    /// Returns true if this error is transient and should be retried.
    fn is_transient(&self) -> bool;
}

/// Retry policy configuration.
///
/// Defines how retries should be performed:
/// - Total number of attempts (first call included)
/// - Delay between retries
/// - Backoff and jitter strategies
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one. Never below 1.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries (caps exponential growth).
    pub max_delay: Duration,

    /// Backoff strategy for calculating delays.
    pub backoff: BackoffStrategy,

    /// Jitter strategy for adding randomness.
    pub jitter: JitterStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff: BackoffStrategy::default(),
            jitter: JitterStrategy::default(),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy builder.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Create a policy with simple constant delay retries.
    pub fn constant(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: delay,
            max_delay: delay,
            backoff: BackoffStrategy::Constant,
            jitter: JitterStrategy::None,
        }
    }

    /// Calculate the delay before retry number `retry` (0-indexed).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let base_delay = self.backoff.calculate_delay(retry, self.initial_delay);
        let capped_delay = base_delay.min(self.max_delay);
        self.jitter.apply(capped_delay)
    }

    /// Execute an async operation, retrying transient errors.
    ///
    /// Permanent errors are returned after the attempt that produced them.
    /// Transient errors are retried until `max_attempts` calls have been
    /// made in total.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: TransientError + std::fmt::Debug,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!("Attempt {} of {}", attempt, max_attempts);

            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!("Operation succeeded after {} attempts", attempt);
                    }
                    return Ok(result);
                }
                Err(e) if !e.is_transient() => {
                    return Err(RetryError::Permanent {
                        attempts: attempt,
                        error: e,
                    });
                }
                Err(e) => {
                    if attempt >= max_attempts {
                        warn!("Giving up after {} attempts: {:?}", attempt, e);
                        return Err(RetryError::MaxAttemptsExceeded {
                            attempts: attempt,
                            last_error: e,
                        });
                    }

                    let delay = self.delay_for_retry(attempt - 1);
                    warn!(
                        "Attempt {} failed with transient error, retrying in {:?}: {:?}",
                        attempt, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Builder for constructing RetryPolicy instances.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
        }
    }

    /// Set the maximum number of attempts (values below 1 become 1).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.policy.max_attempts = n.max(1);
        self
    }

    /// Set the initial delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Set the backoff strategy.
    pub fn backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.policy.backoff = strategy;
        self
    }

    /// Set the jitter strategy.
    pub fn jitter(mut self, strategy: JitterStrategy) -> Self {
        self.policy.jitter = strategy;
        self
    }

    /// Build the RetryPolicy.
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// Error type for retry operations.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The operation failed with an error that must not be retried.
    Permanent {
        /// Number of attempts made.
        attempts: u32,
        /// The error.
        error: E,
    },

    /// Transient failures persisted through every allowed attempt.
    MaxAttemptsExceeded {
        /// Number of attempts made.
        attempts: u32,
        /// The last error encountered.
        last_error: E,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Permanent { attempts, .. }
            | RetryError::MaxAttemptsExceeded { attempts, .. } => *attempts,
        }
    }

    /// The final error.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Permanent { error, .. } => error,
            RetryError::MaxAttemptsExceeded { last_error, .. } => last_error,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::Permanent { error, .. } => write!(f, "{}", error),
            RetryError::MaxAttemptsExceeded {
                attempts,
                last_error,
            } => {
                write!(
                    f,
                    "Max attempts exceeded after {} attempts. Last error: {}",
                    attempts, last_error
                )
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetryError::Permanent { error, .. } => Some(error),
            RetryError::MaxAttemptsExceeded { last_error, .. } => Some(last_error),
        }
    }
}

/// Common patterns for identifying transient errors.
pub fn is_transient_error_message(msg: &str) -> bool {
    let transient_patterns = [
        "timeout",
        "timed out",
        "deadline exceeded",
        "deadline_exceeded",
        "connection refused",
        "connection reset",
        "connection closed",
        "temporary failure",
        "temporarily unavailable",
        "try again",
        "service unavailable",
        "unavailable",
        "too many requests",
        "rate limit",
        "ratelimit",
        "network unreachable",
        "broken pipe",
        "econnreset",
        "econnrefused",
        "etimedout",
    ];

    let msg_lower = msg.to_lowercase();
    transient_patterns
        .iter()
        .any(|pattern| msg_lower.contains(pattern))
}
