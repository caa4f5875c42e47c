// Durable Step Wrapper (spec §4.3): wraps an async thunk as a named,
// retried, timed checkpoint. Transparent (direct call, in-process retry only)
// when no durable runtime was supplied to the factory.
//
// Grounded on `durable/src/activity/definition.rs`'s Activity trait (retry/
// timeout contract) and `activity/context.rs`'s cancellation idiom, collapsed
// into a single wrapper function since this crate has no persisted activity
// queue to schedule onto.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout as tokio_timeout;
use tracing::{info, warn};

use crate::durable::retry::RetryPolicy;
use crate::durable::runtime::RuntimeDetector;
use crate::durable::timeout::TimeoutConfig;
use crate::error::{AgentLoopError, Result};

/// Whether sibling steps may run concurrently with this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduling {
    Sequential,
    Independent,
}

/// Configuration for one durable-step invocation.
#[derive(Debug, Clone)]
pub struct StepConfig {
    pub name: String,
    pub retry: RetryPolicy,
    pub timeout: TimeoutConfig,
    pub scheduling: Scheduling,
}

impl StepConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            retry: RetryPolicy::default(),
            timeout: TimeoutConfig::default(),
            scheduling: Scheduling::Sequential,
        }
    }

    pub fn tool_exec(tool_name: &str) -> Self {
        Self::new(format!("tool-exec-{tool_name}"))
    }

    pub fn independent(mut self) -> Self {
        self.scheduling = Scheduling::Independent;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: TimeoutConfig) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Runs `thunk` under the durable-step contract described in spec §4.3.
///
/// Does not alter the thunk's input or output; only interposes retry and
/// timeout behavior around it. When `detector` reports no runtime, this
/// degrades to in-process retry with no crash-recovery guarantee.
pub async fn run_step<F, Fut, T>(detector: &RuntimeDetector, config: &StepConfig, thunk: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let runtime = detector.detect();
    if let Some(runtime) = &runtime {
        info!(step = %config.name, runtime = runtime.name(), "running durable step");
    }

    let mut attempt: u32 = 1;
    loop {
        let delay = config.retry.delay_for_attempt(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let call = thunk();
        let outcome = match tokio_timeout(config.timeout.start_to_close, call).await {
            Ok(result) => result,
            Err(_) => Err(AgentLoopError::Timeout(config.timeout.start_to_close)),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = err.is_retryable() && config.retry.should_retry(Some(err.code()));
                if !retryable || !config.retry.has_attempts_remaining(attempt) {
                    warn!(step = %config.name, attempt, error = %err, "durable step failed, no more retries");
                    return Err(err);
                }
                warn!(step = %config.name, attempt, error = %err, "durable step failed, retrying");
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn transparent_without_runtime_runs_once_on_success() {
        let detector = RuntimeDetector::new();
        let calls = AtomicU32::new(0);
        let config = StepConfig::new("test-step");

        let result = run_step(&detector, &config, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AgentLoopError>(42)
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_retryable_errors_up_to_max_attempts() {
        let detector = RuntimeDetector::new();
        let calls = AtomicU32::new(0);
        let config = StepConfig::new("flaky").with_retry(
            RetryPolicy::exponential()
                .with_max_attempts(3)
                .with_initial_interval(Duration::from_millis(1))
                .with_jitter(0.0),
        );

        let result: Result<u32> = run_step(&detector, &config, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(AgentLoopError::tool_execution("transient", true))
            } else {
                Ok(99)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let detector = RuntimeDetector::new();
        let calls = AtomicU32::new(0);
        let config = StepConfig::new("doomed");

        let result: Result<u32> = run_step(&detector, &config, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AgentLoopError::fatal("unrecoverable"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
