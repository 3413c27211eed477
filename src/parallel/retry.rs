//! Retry wrapper for item transforms
//!
//! The engine never retries on its own; a transform that should survive
//! transient failures is wrapped before it is handed to `process()`:
//!
//! ```rust
//! use parbatch::parallel::{Backoff, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(3)?
//!     .backoff(Backoff::Fixed(Duration::from_millis(10)))
//!     .abort_on_type::<std::num::ParseIntError>();
//!
//! let parse = policy.wrap(|s: &String| s.parse::<u32>());
//! assert_eq!(parse(&"7".to_string())?, 7);
//! # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
//! ```

use crate::error::ConfigError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type ErrorPredicate = Arc<dyn Fn(&anyhow::Error) -> bool + Send + Sync>;

/// Delay between attempts
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    None,
    Fixed(Duration),
    /// `base * attempt`
    Linear { base: Duration },
    /// `base * multiplier^(attempt - 1)`, capped at `max`
    Exponential {
        base: Duration,
        multiplier: f64,
        max: Duration,
    },
}

impl Backoff {
    /// Delay after the `attempt`-th failure (1-based)
    pub fn delay(&self, attempt: usize) -> Duration {
        let attempt = attempt.max(1);
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => *delay,
            Backoff::Linear { base } => base.saturating_mul(attempt as u32),
            Backoff::Exponential {
                base,
                multiplier,
                max,
            } => {
                let factor = multiplier.max(1.0).powi(attempt as i32 - 1);
                let secs = base.as_secs_f64() * factor;
                if !secs.is_finite() || secs >= max.as_secs_f64() {
                    *max
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        }
    }
}

/// Bounded retry policy with optional allow/deny error classification
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff: Backoff,
    retry_on: Option<ErrorPredicate>,
    abort_on: Option<ErrorPredicate>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("retry_on", &self.retry_on.is_some())
            .field("abort_on", &self.abort_on.is_some())
            .finish()
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first call, so 1 means "never retry"
    pub fn new(max_attempts: usize) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::InvalidRetryAttempts(max_attempts));
        }
        Ok(Self {
            max_attempts,
            backoff: Backoff::None,
            retry_on: None,
            abort_on: None,
        })
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Only retry errors matching `predicate`
    pub fn retry_on(mut self, predicate: impl Fn(&anyhow::Error) -> bool + Send + Sync + 'static) -> Self {
        self.retry_on = Some(Arc::new(predicate));
        self
    }

    /// Never retry errors matching `predicate`; takes precedence over `retry_on`
    pub fn abort_on(mut self, predicate: impl Fn(&anyhow::Error) -> bool + Send + Sync + 'static) -> Self {
        self.abort_on = Some(Arc::new(predicate));
        self
    }

    /// Only retry errors of type `E`
    pub fn retry_on_type<E>(self) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.retry_on(|err| err.downcast_ref::<E>().is_some())
    }

    /// Never retry errors of type `E`
    pub fn abort_on_type<E>(self) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.abort_on(|err| err.downcast_ref::<E>().is_some())
    }

    pub fn should_retry(&self, err: &anyhow::Error) -> bool {
        if self.abort_on.as_ref().is_some_and(|abort| abort(err)) {
            return false;
        }
        self.retry_on.as_ref().is_none_or(|allow| allow(err))
    }

    /// Call `f` on `item` until it succeeds, the error is not retryable, or
    /// attempts run out. The last error is returned unchanged.
    pub fn call<T, R, E, F>(&self, item: &T, f: &F) -> anyhow::Result<R>
    where
        E: Into<anyhow::Error>,
        F: Fn(&T) -> Result<R, E>,
    {
        let mut attempt = 1;
        loop {
            let err = match f(item) {
                Ok(result) => return Ok(result),
                Err(e) => e.into(),
            };

            if attempt >= self.max_attempts || !self.should_retry(&err) {
                return Err(err);
            }

            let delay = self.backoff.delay(attempt);
            tracing::debug!(
                "Attempt {}/{} failed: {:#}, retrying in {:?}",
                attempt,
                self.max_attempts,
                err,
                delay
            );
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            attempt += 1;
        }
    }

    /// Wrap `f` so every call goes through this policy
    pub fn wrap<T, R, E, F>(self, f: F) -> impl Fn(&T) -> anyhow::Result<R> + Send + Sync + 'static
    where
        E: Into<anyhow::Error>,
        F: Fn(&T) -> Result<R, E> + Send + Sync + 'static,
    {
        move |item: &T| self.call(item, &f)
    }
}
