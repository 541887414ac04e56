// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bounded execution of blocking store and cache calls.
//!
//! redb and the token cache are synchronous. Async callers hand the call to
//! tokio's blocking pool and wait at most `timeout` for it. On expiry the
//! blocking call keeps running to completion, so a timed-out write may still
//! commit; callers must treat the outcome as unknown.

use std::time::Duration;

/// Why a bounded call produced no result.
#[derive(Debug, thiserror::Error)]
pub enum DeadlineError {
    #[error("{op} timed out after {}ms", .timeout.as_millis())]
    TimedOut { op: &'static str, timeout: Duration },

    #[error("{op} worker failed: {reason}")]
    Worker { op: &'static str, reason: String },
}

/// Run `f` on the blocking pool, bounded by `timeout`.
pub async fn run_blocking<T, F>(timeout: Duration, op: &'static str, f: F) -> Result<T, DeadlineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_error)) => Err(DeadlineError::Worker {
            op,
            reason: join_error.to_string(),
        }),
        Err(_) => {
            tracing::warn!(op, timeout_ms = timeout.as_millis() as u64, "Blocking call timed out");
            Err(DeadlineError::TimedOut { op, timeout })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_value_within_deadline() {
        let value = run_blocking(Duration::from_secs(1), "add", || 2 + 2)
            .await
            .unwrap();
        assert_eq!(value, 4);
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let result = run_blocking(Duration::from_millis(10), "sleep", || {
            std::thread::sleep(Duration::from_millis(200));
        })
        .await;
        assert!(matches!(result, Err(DeadlineError::TimedOut { op: "sleep", .. })));
    }

    #[tokio::test]
    async fn panicking_call_is_reported() {
        let result: Result<(), _> = run_blocking(Duration::from_secs(1), "boom", || panic!("boom")).await;
        assert!(matches!(result, Err(DeadlineError::Worker { op: "boom", .. })));
    }
}
