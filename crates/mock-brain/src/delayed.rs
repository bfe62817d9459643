//! Delayed brain implementation - wraps another backend with artificial delay.

use std::time::Duration;

use brain_core::{async_trait, BrainError, ChatTurn, FragmentStream, ModelBackend, ModelEndpoint};
use tokio::time::sleep;

/// A backend that wraps another backend and adds artificial delay.
///
/// Useful for testing timeout handling and simulating model latency.
pub struct DelayedBrain<B: ModelBackend> {
    inner: B,
    delay: Duration,
}

impl<B: ModelBackend> DelayedBrain<B> {
    /// Create a new DelayedBrain wrapping the given backend with the specified delay.
    pub fn new(inner: B, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// Create a backend with a delay in milliseconds.
    pub fn with_millis(inner: B, millis: u64) -> Self {
        Self::new(inner, Duration::from_millis(millis))
    }

    /// Create a backend with a delay in seconds.
    pub fn with_secs(inner: B, secs: u64) -> Self {
        Self::new(inner, Duration::from_secs(secs))
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: ModelBackend> ModelBackend for DelayedBrain<B> {
    async fn complete(
        &self,
        endpoint: &ModelEndpoint,
        system_prompt: &str,
        prior_turns: &[ChatTurn],
    ) -> Result<String, BrainError> {
        sleep(self.delay).await;
        self.inner.complete(endpoint, system_prompt, prior_turns).await
    }

    async fn complete_streaming(
        &self,
        endpoint: &ModelEndpoint,
        system_prompt: &str,
        prior_turns: &[ChatTurn],
    ) -> Result<FragmentStream, BrainError> {
        sleep(self.delay).await;
        self.inner
            .complete_streaming(endpoint, system_prompt, prior_turns)
            .await
    }

    fn name(&self) -> &str {
        "DelayedBrain"
    }

    async fn is_ready(&self) -> bool {
        self.inner.is_ready().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScriptedBrain;
    use brain_core::CapabilityClass;

    fn endpoint() -> ModelEndpoint {
        ModelEndpoint::new(
            "mock-1",
            CapabilityClass::Utility,
            "http://localhost",
            "key",
            "mock",
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_brain() {
        let brain = DelayedBrain::with_millis(ScriptedBrain::new().reply("test"), 100);

        let start = tokio::time::Instant::now();
        let response = brain.complete(&endpoint(), "p", &[]).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(response, "test");
        assert!(elapsed >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_exceeding_timeout() {
        let brain = DelayedBrain::with_secs(ScriptedBrain::new().reply("late"), 90);
        let result = tokio::time::timeout(
            Duration::from_secs(60),
            brain.complete(&endpoint(), "p", &[]),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(brain.inner().calls().len(), 0);
    }

    #[tokio::test]
    async fn test_brain_name() {
        let brain = DelayedBrain::with_millis(ScriptedBrain::new(), 0);
        assert_eq!(brain.name(), "DelayedBrain");
    }
}
