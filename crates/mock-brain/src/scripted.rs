//! Scripted brain implementation - plays back queued outcomes.

use std::collections::VecDeque;
use std::sync::Mutex;

use brain_core::{
    async_trait, BrainError, ChatTurn, FragmentStream, ModelBackend, ModelEndpoint, StreamChunk,
};

/// One queued outcome for a model call.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Answer with this text (a single finished chunk when streaming).
    Reply(String),
    /// Stream these fragments; the last one is flagged finished.
    Fragments(Vec<String>),
    /// Fail before any output.
    Fail(BrainError),
    /// Stream these fragments, then fail.
    FailMidStream(Vec<String>, BrainError),
    /// Never answer (for timeout tests).
    Stall,
}

/// Which trait method a call went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Complete,
    Stream,
}

/// A call observed by [`ScriptedBrain`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub endpoint_id: String,
    pub system_prompt: String,
    pub prior_turns: Vec<ChatTurn>,
}

/// A backend that answers from two queues: one for `complete`, one for
/// `complete_streaming`.
///
/// When a queue runs dry the call fails with `BrainError::Configuration`, so
/// a test that makes more calls than it scripted fails loudly.
#[derive(Debug, Default)]
pub struct ScriptedBrain {
    completions: Mutex<VecDeque<Scripted>>,
    streams: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBrain {
    /// Create a brain with empty scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a non-streaming reply.
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push_completion(Scripted::Reply(text.into()));
        self
    }

    /// Queue a non-streaming failure.
    pub fn fail(self, error: BrainError) -> Self {
        self.push_completion(Scripted::Fail(error));
        self
    }

    /// Queue a stalled non-streaming call.
    pub fn stall(self) -> Self {
        self.push_completion(Scripted::Stall);
        self
    }

    /// Queue a streamed response made of these fragments.
    pub fn stream<I, S>(self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_stream(Scripted::Fragments(
            fragments.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Queue a streaming call that fails before opening.
    pub fn stream_failure(self, error: BrainError) -> Self {
        self.push_stream(Scripted::Fail(error));
        self
    }

    /// Queue a stream that yields these fragments and then drops.
    pub fn stream_drop<I, S>(self, fragments: I, error: BrainError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_stream(Scripted::FailMidStream(
            fragments.into_iter().map(Into::into).collect(),
            error,
        ));
        self
    }

    /// Queue a streaming call that never opens.
    pub fn stream_stall(self) -> Self {
        self.push_stream(Scripted::Stall);
        self
    }

    /// Queue an outcome for `complete`.
    pub fn push_completion(&self, outcome: Scripted) {
        lock(&self.completions).push_back(outcome);
    }

    /// Queue an outcome for `complete_streaming`.
    pub fn push_stream(&self, outcome: Scripted) {
        lock(&self.streams).push_back(outcome);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Calls of one kind, in order.
    pub fn calls_of(&self, kind: CallKind) -> Vec<RecordedCall> {
        lock(&self.calls)
            .iter()
            .filter(|call| call.kind == kind)
            .cloned()
            .collect()
    }

    /// Outcomes not yet consumed, as `(completions, streams)`.
    pub fn remaining(&self) -> (usize, usize) {
        (lock(&self.completions).len(), lock(&self.streams).len())
    }

    fn record(
        &self,
        kind: CallKind,
        endpoint: &ModelEndpoint,
        system_prompt: &str,
        prior_turns: &[ChatTurn],
    ) {
        lock(&self.calls).push(RecordedCall {
            kind,
            endpoint_id: endpoint.id.clone(),
            system_prompt: system_prompt.to_string(),
            prior_turns: prior_turns.to_vec(),
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn exhausted(kind: &str) -> BrainError {
    BrainError::Configuration(format!("no scripted {} outcome left", kind))
}

fn fragment_chunks(fragments: Vec<String>) -> Vec<Result<StreamChunk, BrainError>> {
    let last = fragments.len().saturating_sub(1);
    fragments
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            Ok(if i == last {
                StreamChunk::finished(text)
            } else {
                StreamChunk::delta(text)
            })
        })
        .collect()
}

#[async_trait]
impl ModelBackend for ScriptedBrain {
    async fn complete(
        &self,
        endpoint: &ModelEndpoint,
        system_prompt: &str,
        prior_turns: &[ChatTurn],
    ) -> Result<String, BrainError> {
        self.record(CallKind::Complete, endpoint, system_prompt, prior_turns);
        let outcome = lock(&self.completions).pop_front();

        match outcome {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fragments(fragments)) => Ok(fragments.concat()),
            Some(Scripted::Fail(error)) | Some(Scripted::FailMidStream(_, error)) => Err(error),
            Some(Scripted::Stall) => std::future::pending().await,
            None => Err(exhausted("completion")),
        }
    }

    async fn complete_streaming(
        &self,
        endpoint: &ModelEndpoint,
        system_prompt: &str,
        prior_turns: &[ChatTurn],
    ) -> Result<FragmentStream, BrainError> {
        self.record(CallKind::Stream, endpoint, system_prompt, prior_turns);
        let outcome = lock(&self.streams).pop_front();

        let items = match outcome {
            Some(Scripted::Reply(text)) => vec![Ok(StreamChunk::finished(text))],
            Some(Scripted::Fragments(fragments)) => fragment_chunks(fragments),
            Some(Scripted::FailMidStream(fragments, error)) => {
                let mut items: Vec<_> = fragments
                    .into_iter()
                    .map(|text| Ok(StreamChunk::delta(text)))
                    .collect();
                items.push(Err(error));
                items
            }
            Some(Scripted::Fail(error)) => return Err(error),
            Some(Scripted::Stall) => std::future::pending().await,
            None => return Err(exhausted("stream")),
        };

        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn name(&self) -> &str {
        "ScriptedBrain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brain_core::CapabilityClass;
    use futures::StreamExt;
    use std::time::Duration;

    fn endpoint() -> ModelEndpoint {
        ModelEndpoint::new(
            "mock-1",
            CapabilityClass::Dialogue,
            "http://localhost",
            "key",
            "mock",
        )
    }

    #[tokio::test]
    async fn test_completions_play_in_order() {
        let brain = ScriptedBrain::new()
            .reply("first")
            .fail(BrainError::Timeout)
            .reply("third");

        assert_eq!(brain.complete(&endpoint(), "p", &[]).await.unwrap(), "first");
        assert!(matches!(
            brain.complete(&endpoint(), "p", &[]).await,
            Err(BrainError::Timeout)
        ));
        assert_eq!(brain.complete(&endpoint(), "p", &[]).await.unwrap(), "third");
        assert!(matches!(
            brain.complete(&endpoint(), "p", &[]).await,
            Err(BrainError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_fragments_mark_last_chunk_finished() {
        let brain = ScriptedBrain::new().stream(["Sure", ", let's", " go!"]);
        let stream = brain
            .complete_streaming(&endpoint(), "p", &[])
            .await
            .unwrap();
        let chunks: Vec<StreamChunk> = stream.map(|c| c.unwrap()).collect().await;

        assert_eq!(
            chunks,
            vec![
                StreamChunk::delta("Sure"),
                StreamChunk::delta(", let's"),
                StreamChunk::finished(" go!"),
            ]
        );
    }

    #[tokio::test]
    async fn test_mid_stream_drop_yields_error_last() {
        let brain = ScriptedBrain::new().stream_drop(["Once"], BrainError::Network("reset".into()));
        let stream = brain
            .complete_streaming(&endpoint(), "p", &[])
            .await
            .unwrap();
        let items: Vec<_> = stream.collect().await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(BrainError::Network(_))));
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let brain = ScriptedBrain::new().reply("ok").stream(["hi"]);
        let turns = vec![ChatTurn::user("hello")];

        brain.complete(&endpoint(), "select", &turns).await.unwrap();
        let _ = brain.complete_streaming(&endpoint(), "speak", &[]).await.unwrap();

        let calls = brain.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].kind, CallKind::Complete);
        assert_eq!(calls[0].system_prompt, "select");
        assert_eq!(calls[0].prior_turns, turns);
        assert_eq!(calls[1].endpoint_id, "mock-1");
        assert_eq!(brain.calls_of(CallKind::Stream).len(), 1);
        assert_eq!(brain.remaining(), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_never_resolves() {
        let brain = ScriptedBrain::new().stall();
        let result = tokio::time::timeout(
            Duration::from_secs(60),
            brain.complete(&endpoint(), "p", &[]),
        )
        .await;
        assert!(result.is_err());
    }
}
