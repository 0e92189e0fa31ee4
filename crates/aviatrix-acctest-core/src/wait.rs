//! Polling a resource until it reaches a target state.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::retry::CancellationToken;

pub const DEFAULT_WAIT_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum WaitError<E> {
    #[error("unexpected state '{state}', wanted one of {expected:?}")]
    UnexpectedState { state: String, expected: Vec<String> },

    #[error("timeout after {timeout:?} waiting for {expected:?} (last state: {last_state:?})")]
    Timeout {
        timeout: Duration,
        expected: Vec<String>,
        last_state: Option<String>,
    },

    #[error("refresh failed: {0}")]
    Refresh(E),

    #[error("wait cancelled")]
    Cancelled,
}

/// Poll configuration for one state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateWaiter {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub timeout: Duration,
    /// Initial wait before the first refresh.
    pub delay: Duration,
    pub poll_interval: Duration,
}

impl StateWaiter {
    #[must_use]
    pub fn new<P, T>(pending: P, target: T, timeout: Duration) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            timeout,
            delay: DEFAULT_WAIT_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Call `refresh` until it reports a target state.
    ///
    /// `refresh` returns the current value and its state label. A state in
    /// neither `pending` nor `target` ends the wait immediately.
    pub fn wait<T, E, F>(&self, cancel: &CancellationToken, mut refresh: F) -> Result<T, WaitError<E>>
    where
        F: FnMut() -> Result<(T, String), E>,
    {
        let started = Instant::now();
        let remaining = |now: Instant| self.timeout.saturating_sub(now.duration_since(started));

        if !cancel.sleep(self.delay.min(self.timeout)) {
            return Err(WaitError::Cancelled);
        }

        loop {
            let (value, state) = refresh().map_err(WaitError::Refresh)?;
            if self.target.contains(&state) {
                tracing::debug!(%state, elapsed = ?started.elapsed(), "reached target state");
                return Ok(value);
            }
            if !self.pending.contains(&state) {
                return Err(WaitError::UnexpectedState {
                    state,
                    expected: self.target.clone(),
                });
            }
            tracing::trace!(%state, "still pending");

            let left = remaining(Instant::now());
            if left.is_zero() {
                return Err(WaitError::Timeout {
                    timeout: self.timeout,
                    expected: self.target.clone(),
                    last_state: Some(state),
                });
            }
            if !cancel.sleep(self.poll_interval.min(left)) {
                return Err(WaitError::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast(pending: &[&str], target: &[&str], timeout: Duration) -> StateWaiter {
        StateWaiter::new(pending.iter().copied(), target.iter().copied(), timeout)
            .delay(Duration::ZERO)
            .poll_interval(Duration::from_millis(1))
    }

    #[test]
    fn reaches_target_after_pending_states() {
        let calls = Cell::new(0);
        let waiter = fast(&["creating"], &["up"], Duration::from_secs(5));
        let value = waiter
            .wait(&CancellationToken::new(), || {
                calls.set(calls.get() + 1);
                let state = if calls.get() < 3 { "creating" } else { "up" };
                Ok::<_, String>((calls.get(), state.to_string()))
            })
            .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn unexpected_state_fails_fast() {
        let waiter = fast(&["creating"], &["up"], Duration::from_secs(5));
        let err = waiter
            .wait(&CancellationToken::new(), || Ok::<_, String>(((), "failed".to_string())))
            .unwrap_err();
        assert!(matches!(err, WaitError::UnexpectedState { ref state, .. } if state == "failed"));
    }

    #[test]
    fn times_out_while_pending() {
        let waiter = fast(&["creating"], &["up"], Duration::from_millis(20));
        let err = waiter
            .wait(&CancellationToken::new(), || Ok::<_, String>(((), "creating".to_string())))
            .unwrap_err();
        match err {
            WaitError::Timeout { last_state, .. } => assert_eq!(last_state.as_deref(), Some("creating")),
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[test]
    fn refresh_error_propagates() {
        let waiter = fast(&["creating"], &["up"], Duration::from_secs(1));
        let err = waiter
            .wait(&CancellationToken::new(), || Err::<((), String), _>("403 Forbidden"))
            .unwrap_err();
        assert_eq!(err.to_string(), "refresh failed: 403 Forbidden");
    }

    #[test]
    fn cancelled_token_stops_wait() {
        let token = CancellationToken::new();
        token.cancel();
        let waiter = StateWaiter::new(["creating"], ["up"], Duration::from_secs(60));
        let err = waiter
            .wait(&token, || Ok::<_, String>(((), "creating".to_string())))
            .unwrap_err();
        assert!(matches!(err, WaitError::Cancelled));
    }
}
