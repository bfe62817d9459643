//! Bounded retry for model calls.

use std::future::Future;

use thiserror::Error;
use tracing::warn;

use crate::error::OrchestratorError;

/// Why a retried operation gave up.
#[derive(Debug, Error)]
pub enum RetryError {
    /// A failure that retrying cannot fix. Returned after the first attempt.
    #[error("{0}")]
    Fatal(OrchestratorError),

    /// Every attempt failed.
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        last_error: OrchestratorError,
    },
}

impl RetryError {
    pub fn into_inner(self) -> OrchestratorError {
        match self {
            Self::Fatal(e) => e,
            Self::Exhausted { last_error, .. } => last_error,
        }
    }
}

/// Immediate retry up to a fixed number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// At least one attempt is always made.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds, fails fatally or runs out of attempts.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, OrchestratorError>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => {
                    warn!(operation = label, attempt, error = %e, "RETRY_ABORTED");
                    return Err(RetryError::Fatal(e));
                }
                Err(e) => {
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "RETRY_ATTEMPT_FAILED"
                    );
                    if attempt >= self.max_attempts {
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last_error: e,
                        });
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Like [`run`](Self::run), but any failure is swallowed and turned
    /// into a value by `fallback`.
    pub async fn run_or_fallback<T, F, Fut>(
        &self,
        label: &str,
        op: F,
        fallback: impl FnOnce(&RetryError) -> T,
    ) -> T
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, OrchestratorError>>,
    {
        match self.run(label, op).await {
            Ok(value) => value,
            Err(e) => {
                warn!(operation = label, error = %e, "RETRY_EXHAUSTED_FALLBACK");
                fallback(&e)
            }
        }
    }
}
