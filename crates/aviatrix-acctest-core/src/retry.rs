//! Bounded retry with interruptible backoff.
//!
//! Backoff sleeps wait on a [`CancellationToken`], so a long retry can be cut
//! short from another thread (for example a test-timeout watchdog).

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::TestConfiguration;

// ── Cancellation ────────────────────────────────────────────────────────

/// Shared cancel flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every sleeper.
    pub fn cancel(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if the token was
    /// (or already had been) cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let deadline = Instant::now().checked_add(duration);
        let mut cancelled = flag.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if *cancelled {
                return false;
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            };
            if remaining.is_zero() {
                return true;
            }
            cancelled = cvar
                .wait_timeout(cancelled, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

// ── Policy ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base * 2^i`
    Exponential,
    /// `base * (i + 1)`
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls, including the first. Zero is treated as one.
    pub attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    #[must_use]
    pub const fn exponential(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
            backoff: Backoff::Exponential,
        }
    }

    #[must_use]
    pub const fn linear(attempts: u32, step: Duration) -> Self {
        Self {
            attempts,
            base_delay: step,
            backoff: Backoff::Linear,
        }
    }

    /// Exponential, using `max_retries` and `retry_delay`.
    #[must_use]
    pub fn from_config(config: &TestConfiguration) -> Self {
        Self::exponential(config.max_retries, config.retry_delay)
    }

    /// Delay after the failed attempt with zero-based index `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = match self.backoff {
            Backoff::Exponential => 1u32.checked_shl(attempt).unwrap_or(u32::MAX),
            Backoff::Linear => attempt.saturating_add(1),
        };
        self.base_delay.saturating_mul(factor)
    }

    const fn total_attempts(&self) -> u32 {
        if self.attempts == 0 { 1 } else { self.attempts }
    }
}

// ── Errors ──────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("operation failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("retry cancelled after {attempts} attempts: {last}")]
    Cancelled { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub fn into_last(self) -> E {
        match self {
            Self::Exhausted { last, .. } | Self::Cancelled { last, .. } => last,
        }
    }
}

// ── Drivers ─────────────────────────────────────────────────────────────

/// Call `op` until it succeeds or the policy runs out of attempts.
///
/// `op` receives the zero-based attempt index. No sleep follows the final
/// attempt.
pub fn retry<T, E, F>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Result<T, E>,
    E: fmt::Display,
{
    let total = policy.total_attempts();
    let mut attempt = 0;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(last) => {
                let made = attempt + 1;
                if made >= total {
                    return Err(RetryError::Exhausted {
                        attempts: made,
                        last,
                    });
                }
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = made,
                    of = total,
                    delay = %humantime::format_duration(delay),
                    error = %last,
                    "attempt failed; retrying"
                );
                if !cancel.sleep(delay) {
                    return Err(RetryError::Cancelled {
                        attempts: made,
                        last,
                    });
                }
                attempt = made;
            }
        }
    }
}

/// Re-run a state check with linear backoff of `step * (i + 1)`.
pub fn retry_check<E, F>(
    max_retries: u32,
    step: Duration,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<(), RetryError<E>>
where
    F: FnMut() -> Result<(), E>,
    E: fmt::Display,
{
    retry(&RetryPolicy::linear(max_retries, step), cancel, |_| check())
}
