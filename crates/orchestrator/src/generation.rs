//! Response generation: streams one character's reply.
//!
//! Opening the stream is retried; once fragments flow, a failure ends the
//! response and nothing is retried.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};
use std::task::{Context, Poll};
use std::time::Duration;

use brain_core::{BrainError, CapabilityClass, FragmentStream, ModelBackend};
use futures::Stream;
use regex::Regex;
use tokio::time::{Instant, Sleep};
use tracing::{debug, warn};

use crate::character::Character;
use crate::error::OrchestratorError;
use crate::history::generation_line;
use crate::pool::ModelPool;
use crate::retry::{RetryError, RetryPolicy};
use crate::transcript::Message;

static BRACKET_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("valid bracket tag regex"));

/// Remove `[...]` annotations from a fragment.
pub fn strip_tags(text: &str) -> String {
    BRACKET_TAG.replace_all(text, "").into_owned()
}

/// Build the system prompt for one character's reply.
pub fn build_generation_prompt(character: &Character, history: &[Message], latest: &str) -> String {
    let mut lines: Vec<String> = history.iter().map(generation_line).collect();
    lines.push(format!("User: {}", latest));

    let name = &character.name;
    format!(
        "{}\n\n# Conversation so far\n{}\n\n\
         You are {name}. Write only what {name} says next, replying to the user's latest line. \
         Address the user as \"you\". Do not output anything else, and do not start with \"{name}:\".",
        character.system_prompt,
        lines.join("\n"),
    )
}

/// Opens response streams for characters.
pub struct ResponseGenerator {
    pool: ModelPool,
    backend: Arc<dyn ModelBackend>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl ResponseGenerator {
    pub fn new(
        pool: ModelPool,
        backend: Arc<dyn ModelBackend>,
        retry: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            backend,
            retry,
            call_timeout,
        }
    }

    /// Start streaming `character`'s reply.
    ///
    /// Fails with `GenerationTransport` when no attempt could open a stream,
    /// or `NoEndpointAvailable` when the dialogue pool is empty.
    pub async fn generate_response(
        &self,
        character: &Character,
        history: &[Message],
        latest: &str,
    ) -> Result<ResponseStream, OrchestratorError> {
        let prompt = build_generation_prompt(character, history, latest);

        let opened = self
            .retry
            .run("generation", |_| self.open(&prompt))
            .await;

        match opened {
            Ok(inner) => {
                debug!(character = %character.name, "Response stream opened");
                Ok(ResponseStream::new(inner, character, self.call_timeout))
            }
            Err(RetryError::Fatal(e)) => Err(e),
            Err(RetryError::Exhausted {
                attempts,
                last_error: OrchestratorError::Brain(source),
            }) => Err(OrchestratorError::GenerationTransport { attempts, source }),
            Err(RetryError::Exhausted { last_error, .. }) => Err(last_error),
        }
    }

    async fn open(&self, prompt: &str) -> Result<FragmentStream, OrchestratorError> {
        let endpoint = self.pool.select_endpoint(CapabilityClass::Dialogue).await?;

        let result = tokio::time::timeout(
            self.call_timeout,
            self.backend.complete_streaming(&endpoint, prompt, &[]),
        )
        .await;
        self.pool.record_usage(&endpoint).await;

        match result {
            Ok(stream) => Ok(stream?),
            Err(_) => Err(OrchestratorError::Brain(BrainError::Timeout)),
        }
    }
}

impl std::fmt::Debug for ResponseGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseGenerator")
            .field("backend", &self.backend.name())
            .field("retry", &self.retry)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Streaming,
    /// Inner stream ended without a finish flag; the narrator's
    /// parentheses may still be owed.
    Closing,
    Finished,
    Failed,
}

/// Cleaned fragments of one character's reply.
///
/// Each item is a non-empty fragment ready for presentation. A narrator's
/// reply is wrapped in `(` and `)`. An `Err` item ends the stream.
pub struct ResponseStream {
    inner: FragmentStream,
    speaker: String,
    narrator: bool,
    opened: bool,
    idle_timeout: Duration,
    idle: Pin<Box<Sleep>>,
    text: String,
    state: StreamState,
}

impl ResponseStream {
    fn new(inner: FragmentStream, character: &Character, idle_timeout: Duration) -> Self {
        Self {
            inner,
            speaker: character.name.clone(),
            narrator: character.is_narrator(),
            opened: false,
            idle_timeout,
            idle: Box::pin(tokio::time::sleep(idle_timeout)),
            text: String::new(),
            state: StreamState::Streaming,
        }
    }

    pub fn speaker(&self) -> &str {
        &self.speaker
    }

    /// The full reply, once the stream has completed cleanly.
    pub fn completed_text(&self) -> Option<&str> {
        match self.state {
            StreamState::Finished => Some(&self.text),
            _ => None,
        }
    }

    pub fn into_completed_text(self) -> Option<String> {
        match self.state {
            StreamState::Finished => Some(self.text),
            _ => None,
        }
    }

    fn emit(&mut self, fragment: String) -> Poll<Option<Result<String, OrchestratorError>>> {
        self.text.push_str(&fragment);
        Poll::Ready(Some(Ok(fragment)))
    }

    fn fail(&mut self, error: BrainError) -> Poll<Option<Result<String, OrchestratorError>>> {
        warn!(speaker = %self.speaker, error = %error, "RESPONSE_STREAM_INTERRUPTED");
        self.state = StreamState::Failed;
        Poll::Ready(Some(Err(OrchestratorError::StreamInterrupted(error))))
    }
}

impl Stream for ResponseStream {
    type Item = Result<String, OrchestratorError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match this.state {
                StreamState::Finished | StreamState::Failed => return Poll::Ready(None),
                StreamState::Closing => {
                    if this.narrator && !this.opened {
                        this.opened = true;
                        return this.emit("(".to_string());
                    }
                    this.state = StreamState::Finished;
                    if this.narrator {
                        return this.emit(")".to_string());
                    }
                    return Poll::Ready(None);
                }
                StreamState::Streaming => {}
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let deadline = Instant::now() + this.idle_timeout;
                    this.idle.as_mut().reset(deadline);

                    let mut fragment = String::new();
                    if this.narrator && !this.opened {
                        this.opened = true;
                        fragment.push('(');
                    }
                    fragment.push_str(&strip_tags(&chunk.text));

                    if chunk.finished {
                        if this.narrator {
                            fragment.push(')');
                        }
                        this.state = StreamState::Finished;
                    }
                    if !fragment.is_empty() {
                        return this.emit(fragment);
                    }
                }
                Poll::Ready(Some(Err(e))) => return this.fail(e),
                Poll::Ready(None) => this.state = StreamState::Closing,
                Poll::Pending => {
                    if this.idle.as_mut().poll(cx).is_ready() {
                        return this.fail(BrainError::Timeout);
                    }
                    return Poll::Pending;
                }
            }
        }
    }
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("speaker", &self.speaker)
            .field("narrator", &self.narrator)
            .field("state", &self.state)
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::EmitterRole;
    use brain_core::StreamChunk;
    use chrono::Utc;
    use futures::StreamExt;

    fn stream_of(chunks: Vec<Result<StreamChunk, BrainError>>) -> FragmentStream {
        Box::pin(futures::stream::iter(chunks))
    }

    async fn collect(mut stream: ResponseStream) -> (Vec<String>, Option<String>) {
        let mut fragments = Vec::new();
        while let Some(item) = stream.next().await {
            fragments.push(item.unwrap());
        }
        (fragments, stream.into_completed_text())
    }

    fn alice() -> Character {
        Character::new("a", "Alice", "You are Alice.")
    }

    fn narrator() -> Character {
        Character::narrator("n", "Narrator", "Narrate.")
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("Hi [smiles] there"), "Hi  there");
        assert_eq!(strip_tags("[a][b]"), "");
        assert_eq!(strip_tags("no tags"), "no tags");
        assert_eq!(strip_tags("open [bracket"), "open [bracket");
    }

    #[test]
    fn test_prompt_layout() {
        let history = vec![
            Message {
                conversation_id: "c".into(),
                role: EmitterRole::Narrator,
                character_id: Some("n".into()),
                character_name: Some("Narrator".into()),
                content: "(A tavern.)".into(),
                sequence: 1,
                created_at: Utc::now(),
            },
            Message {
                conversation_id: "c".into(),
                role: EmitterRole::Character,
                character_id: Some("b".into()),
                character_name: Some("Bob".into()),
                content: "Welcome!".into(),
                sequence: 2,
                created_at: Utc::now(),
            },
        ];

        let prompt = build_generation_prompt(&alice(), &history, "hello");
        assert!(prompt.starts_with(
            "You are Alice.\n\n# Conversation so far\nNarrator: (A tavern.)\nBob: Welcome!\nUser: hello\n\n"
        ));
        assert!(prompt.ends_with("do not start with \"Alice:\"."));
    }

    #[tokio::test]
    async fn test_character_fragments_pass_through() {
        let inner = stream_of(vec![
            Ok(StreamChunk::delta("Sure")),
            Ok(StreamChunk::delta("")),
            Ok(StreamChunk::delta(", let's [grins]")),
            Ok(StreamChunk::finished(" go!")),
        ]);
        let stream = ResponseStream::new(inner, &alice(), Duration::from_secs(5));

        let (fragments, text) = collect(stream).await;
        assert_eq!(fragments, vec!["Sure", ", let's ", " go!"]);
        assert_eq!(text.as_deref(), Some("Sure, let's  go!"));
    }

    #[tokio::test]
    async fn test_narrator_wrapped() {
        let inner = stream_of(vec![
            Ok(StreamChunk::delta("The door")),
            Ok(StreamChunk::finished(" creaks.")),
        ]);
        let stream = ResponseStream::new(inner, &narrator(), Duration::from_secs(5));

        let (fragments, text) = collect(stream).await;
        assert_eq!(fragments, vec!["(The door", " creaks.)"]);
        assert_eq!(text.as_deref(), Some("(The door creaks.)"));
    }

    #[tokio::test]
    async fn test_narrator_single_finished_chunk() {
        let inner = stream_of(vec![Ok(StreamChunk::finished("Silence [pause]"))]);
        let stream = ResponseStream::new(inner, &narrator(), Duration::from_secs(5));

        let (fragments, text) = collect(stream).await;
        assert_eq!(fragments, vec!["(Silence )"]);
        assert_eq!(text.as_deref(), Some("(Silence )"));
    }

    #[tokio::test]
    async fn test_narrator_closes_on_clean_end_without_finish_flag() {
        let inner = stream_of(vec![Ok(StreamChunk::delta("Night falls."))]);
        let stream = ResponseStream::new(inner, &narrator(), Duration::from_secs(5));

        let (fragments, text) = collect(stream).await;
        assert_eq!(fragments, vec!["(Night falls.", ")"]);
        assert_eq!(text.as_deref(), Some("(Night falls.)"));
    }

    #[tokio::test]
    async fn test_empty_narrator_still_yields_parens() {
        let inner = stream_of(vec![]);
        let stream = ResponseStream::new(inner, &narrator(), Duration::from_secs(5));

        let (fragments, text) = collect(stream).await;
        assert_eq!(fragments, vec!["(", ")"]);
        assert_eq!(text.as_deref(), Some("()"));
    }

    #[tokio::test]
    async fn test_mid_stream_error_ends_stream() {
        let inner = stream_of(vec![
            Ok(StreamChunk::delta("Hel")),
            Err(BrainError::Network("reset".into())),
            Ok(StreamChunk::finished("lo")),
        ]);
        let mut stream = ResponseStream::new(inner, &alice(), Duration::from_secs(5));

        assert_eq!(stream.next().await.unwrap().unwrap(), "Hel");
        assert!(matches!(
            stream.next().await,
            Some(Err(OrchestratorError::StreamInterrupted(BrainError::Network(_))))
        ));
        assert!(stream.next().await.is_none());
        assert!(stream.completed_text().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_stream_times_out() {
        let inner: FragmentStream = Box::pin(
            futures::stream::iter(vec![Ok(StreamChunk::delta("Hi"))])
                .chain(futures::stream::pending()),
        );
        let mut stream = ResponseStream::new(inner, &alice(), Duration::from_secs(5));

        assert_eq!(stream.next().await.unwrap().unwrap(), "Hi");
        assert!(matches!(
            stream.next().await,
            Some(Err(OrchestratorError::StreamInterrupted(BrainError::Timeout)))
        ));
        assert!(stream.next().await.is_none());
    }
}
