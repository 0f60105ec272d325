use std::time::Duration;

use super::types::LlmClient;
use super::StructuringError;
use crate::config::ServiceConfig;

/// Exponential backoff for extraction-service calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ServiceConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    /// No waiting between attempts.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

/// Call the service, retrying transient failures with backoff. Blocks the
/// calling thread while waiting. Non-retryable errors are returned at once;
/// transient ones become `RetriesExhausted` once the policy runs out.
pub fn generate_with_retry(
    llm: &dyn LlmClient,
    policy: &RetryPolicy,
    model: &str,
    prompt: &str,
    system: &str,
    segment_id: &str,
) -> Result<String, StructuringError> {
    let mut attempt = 0;
    loop {
        match llm.generate(model, prompt, system) {
            Ok(response) => return Ok(response),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    segment_id = %segment_id,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Extraction service call failed, retrying"
                );
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                attempt += 1;
            }
            Err(e) if e.is_retryable() => {
                return Err(StructuringError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Fails with a transient error `failures` times, then succeeds.
    struct FailThenSucceed {
        failures: usize,
        calls: AtomicUsize,
    }

    impl FailThenSucceed {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl LlmClient for FailThenSucceed {
        fn generate(&self, _: &str, _: &str, _: &str) -> Result<String, StructuringError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(StructuringError::ServiceStatus {
                    status: 503,
                    body: "busy".into(),
                })
            } else {
                Ok("ok".into())
            }
        }
    }

    struct Unauthorized {
        calls: AtomicUsize,
    }

    impl LlmClient for Unauthorized {
        fn generate(&self, _: &str, _: &str, _: &str) -> Result<String, StructuringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StructuringError::ServiceStatus {
                status: 401,
                body: "bad key".into(),
            })
        }
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn default_policy_follows_service_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn transient_failures_are_retried() {
        let llm = FailThenSucceed::new(2);
        let out = generate_with_retry(&llm, &RetryPolicy::immediate(3), "m", "p", "s", "seg").unwrap();
        assert_eq!(out, "ok");
        assert_eq!(llm.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn retries_exhausted_after_ceiling() {
        let llm = FailThenSucceed::new(10);
        let err = generate_with_retry(&llm, &RetryPolicy::immediate(2), "m", "p", "s", "seg").unwrap_err();
        assert!(matches!(err, StructuringError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let llm = Unauthorized {
            calls: AtomicUsize::new(0),
        };
        let err = generate_with_retry(&llm, &RetryPolicy::immediate(3), "m", "p", "s", "seg").unwrap_err();
        assert!(matches!(err, StructuringError::ServiceStatus { status: 401, .. }));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }
}
