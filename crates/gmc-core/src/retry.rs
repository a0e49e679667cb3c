//! Caller-side retry policy
//!
//! The exchange engine never retries internally; transient failures
//! (timeouts, short reads) surface immediately and the caller decides
//! what to do. This module is the one retry loop shared by setup and
//! steady-state polling, parameterized by attempt count and backoff.

use std::time::Duration;

use tracing::warn;

use crate::protocol::ProtocolError;

/// Retry an operation a fixed number of times with a flat backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Treated as at least 1.
    pub attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds or the attempt budget is exhausted,
    /// returning the final error in the latter case.
    pub fn run<T, F>(&self, mut op: F) -> Result<T, ProtocolError>
    where
        F: FnMut() -> Result<T, ProtocolError>,
    {
        let attempts = self.attempts.max(1);
        for attempt in 1..attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(
                        attempt,
                        attempts,
                        error = %err,
                        "operation failed, retrying"
                    );
                    std::thread::sleep(self.backoff);
                }
            }
        }
        op()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeds_first_try() {
        let policy = RetryPolicy::default();
        let mut calls = 0;
        let result = policy.run(|| {
            calls += 1;
            Ok(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 1);
    }

    #[test]
    fn retries_until_success() {
        let policy = RetryPolicy {
            attempts: 3,
            backoff: Duration::ZERO,
        };
        let mut calls = 0;
        let result = policy.run(|| {
            calls += 1;
            if calls < 3 {
                Err(ProtocolError::Timeout)
            } else {
                Ok("up")
            }
        });
        assert_eq!(result.unwrap(), "up");
        assert_eq!(calls, 3);
    }

    #[test]
    fn exhausts_budget_and_returns_last_error() {
        let policy = RetryPolicy {
            attempts: 2,
            backoff: Duration::ZERO,
        };
        let mut calls = 0;
        let result: Result<(), _> = policy.run(|| {
            calls += 1;
            Err(ProtocolError::Timeout)
        });
        assert!(matches!(result, Err(ProtocolError::Timeout)));
        assert_eq!(calls, 2);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let policy = RetryPolicy {
            attempts: 0,
            backoff: Duration::ZERO,
        };
        let mut calls = 0;
        let _: Result<(), _> = policy.run(|| {
            calls += 1;
            Err(ProtocolError::Timeout)
        });
        assert_eq!(calls, 1);
    }
}
