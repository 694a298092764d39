//! Bounded retry loop used around every remote catalog call.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::RetrySettings;
use crate::error::{FetchFailure, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub rate_limit_backoff: Duration,
    pub transient_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            rate_limit_backoff: Duration::from_secs(2),
            transient_backoff: Duration::from_secs(3),
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(value: &RetrySettings) -> Self {
        Self {
            max_attempts: value.max_attempts,
            rate_limit_backoff: Duration::from_millis(value.rate_limit_backoff_ms),
            transient_backoff: Duration::from_millis(value.transient_backoff_ms),
        }
    }
}

impl RetryPolicy {
    pub fn backoff_for(&self, failure: &FetchFailure) -> Duration {
        if failure.is_rate_limited() {
            self.rate_limit_backoff
        } else {
            self.transient_backoff
        }
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Run `attempt` until it succeeds or `policy.max_attempts` attempts have
/// failed. No sleep follows the final failure.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    url: &str,
    mut attempt: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchFailure>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();
    for n in 1..=max_attempts {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(failure) => {
                let backoff = policy.backoff_for(&failure);
                warn!(
                    url,
                    attempt = n,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %failure,
                    "remote catalog call failed"
                );
                last_error = failure.to_string();
                if n < max_attempts {
                    sleeper.sleep(backoff).await;
                }
            }
        }
    }
    Err(SyncError::RemoteUnavailable {
        url: url.to_string(),
        attempts: max_attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn status(code: u16) -> FetchFailure {
        FetchFailure::Status {
            status: reqwest::StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        }
    }

    async fn run(
        outcomes: Vec<Result<u32, FetchFailure>>,
        sleeper: &RecordingSleeper,
    ) -> (Result<u32, SyncError>, usize) {
        let queue = Arc::new(Mutex::new(VecDeque::from(outcomes)));
        let calls = Arc::new(Mutex::new(0usize));
        let result = with_retry(&RetryPolicy::default(), sleeper, "http://remote/x", || {
            let queue = queue.clone();
            let calls = calls.clone();
            async move {
                *calls.lock().unwrap() += 1;
                queue.lock().unwrap().pop_front().unwrap_or(Ok(0))
            }
        })
        .await;
        let n = *calls.lock().unwrap();
        (result, n)
    }

    #[tokio::test]
    async fn first_success_does_not_sleep() {
        let sleeper = RecordingSleeper::default();
        let (result, calls) = run(vec![Ok(7)], &sleeper).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 1);
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn backoff_depends_on_failure_kind() {
        let sleeper = RecordingSleeper::default();
        let (result, calls) = run(
            vec![Err(FetchFailure::RateLimited), Err(status(503)), Ok(1)],
            &sleeper,
        )
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls, 3);
        assert_eq!(
            *sleeper.sleeps.lock().unwrap(),
            vec![Duration::from_secs(2), Duration::from_secs(3)]
        );
    }

    #[tokio::test]
    async fn five_failures_exhaust_the_budget() {
        let sleeper = RecordingSleeper::default();
        let outcomes = (0..6).map(|_| Err(status(500))).collect();
        let (result, calls) = run(outcomes, &sleeper).await;
        assert_eq!(calls, 5);
        assert_eq!(sleeper.sleeps.lock().unwrap().len(), 4);
        match result {
            Err(SyncError::RemoteUnavailable {
                attempts, last_error, ..
            }) => {
                assert_eq!(attempts, 5);
                assert!(last_error.contains("500"));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn rate_limits_share_the_same_budget() {
        let sleeper = RecordingSleeper::default();
        let outcomes = (0..5).map(|_| Err(FetchFailure::RateLimited)).collect();
        let (result, calls) = run(outcomes, &sleeper).await;
        assert_eq!(calls, 5);
        assert!(matches!(result, Err(SyncError::RemoteUnavailable { .. })));
    }
}
