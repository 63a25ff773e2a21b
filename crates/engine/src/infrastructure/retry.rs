//! Exponential backoff retry for activity calls.
//!
//! Every activity in a turn (analysis, reply generation, the scene-state
//! write, imaging) runs through [`with_backoff`]. Retries are invisible to the
//! orchestrator's state machine: a retried step never re-enters an earlier
//! state.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the initial one (1 = no retries).
    pub max_attempts: u32,
    /// Base delay in milliseconds before the first retry.
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps exponential growth).
    pub max_delay_ms: u64,
    /// Jitter factor (0.0-1.0) for randomizing delays to prevent thundering herd.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based), jitter applied.
    pub fn delay_for_retry(&self, retry: u32) -> u64 {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(retry.saturating_sub(1)));
        let capped = exponential.min(self.max_delay_ms);

        let jitter_range = (capped as f64 * self.jitter_factor) as i64;
        if jitter_range > 0 {
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped as i64 + jitter).max(0) as u64
        } else {
            capped
        }
    }
}

/// Run `operation` with retries per `config`.
///
/// `is_retryable` gates which errors are worth another attempt; a
/// non-retryable error returns immediately.
pub async fn with_backoff<T, E, F, Fut, R>(
    config: &RetryConfig,
    operation_name: &str,
    is_retryable: R,
    operation: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        attempt,
                        operation = operation_name,
                        "activity succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if !is_retryable(&e) {
                    tracing::error!(
                        error = %e,
                        operation = operation_name,
                        "activity failed with non-retryable error"
                    );
                    return Err(e);
                }

                if attempt >= max_attempts {
                    tracing::error!(
                        attempts = max_attempts,
                        error = %e,
                        operation = operation_name,
                        "activity failed after all retry attempts"
                    );
                    return Err(e);
                }

                let delay = config.delay_for_retry(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay,
                    error = %e,
                    operation = operation_name,
                    "activity failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
        }
    }
}

/// Retryability for LLM errors: auth and bad-request failures are permanent.
pub fn llm_error_is_retryable(error: &crate::infrastructure::ports::LlmError) -> bool {
    use crate::infrastructure::ports::LlmError;
    match error {
        LlmError::RequestFailed(msg) => {
            !msg.contains("401") && !msg.contains("403") && !msg.contains("400")
        }
        // A malformed or truncated response may be a network artifact
        LlmError::InvalidResponse(_) | LlmError::Stream(_) => true,
    }
}
