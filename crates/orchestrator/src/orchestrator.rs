//! Main orchestrator that runs conversation turns.

use std::sync::Arc;

use brain_core::{BrainError, ModelBackend, PromptTemplate};
use futures::StreamExt;
use serde::Serialize;
use tracing::{info, warn};

use crate::character::{Character, Roster};
use crate::clock::{Clock, SystemClock};
use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::generation::ResponseGenerator;
use crate::pool::{policy_for, ModelPool, SelectionPolicy};
use crate::retry::RetryPolicy;
use crate::sequencer::TranscriptSequencer;
use crate::sink::TurnSink;
use crate::speaker::{load_selection_prompt, SpeakerSelector};
use crate::store::{EndpointStore, TranscriptStore};
use crate::transcript::{Conversation, Emitter, Message, NextActor};

/// What starts a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnInput {
    /// The user said something.
    User(String),
    /// The user asked the characters to carry on without new input.
    Continue,
}

/// Everything a completed turn produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    /// The persisted user message; `None` for continue turns.
    pub user_message: Option<Message>,
    /// Speakers in the order they were run.
    pub speakers: Vec<String>,
    /// Persisted replies, in speaking order.
    pub messages: Vec<Message>,
}

/// Runs turns: selects speakers, streams their replies to a sink and
/// persists them in order.
///
/// ```text
/// run_turn ──► TranscriptSequencer (append user line)
///          ──► SpeakerSelector ──► ModelPool (utility) ──► ModelBackend::complete
///          ──► for each speaker:
///                ResponseGenerator ──► ModelPool (dialogue) ──► ModelBackend::complete_streaming
///                ResponseStream ──► TurnSink::fragment
///                TranscriptSequencer (append reply) ──► TurnSink::message_persisted
/// ```
pub struct Orchestrator {
    config: OrchestratorConfig,
    selector: SpeakerSelector,
    generator: ResponseGenerator,
    sequencer: TranscriptSequencer,
}

impl Orchestrator {
    /// Start building an orchestrator over a backend and its two stores.
    pub fn builder(
        backend: Arc<dyn ModelBackend>,
        endpoints: Arc<dyn EndpointStore>,
        transcripts: Arc<dyn TranscriptStore>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            backend,
            endpoints,
            transcripts,
            config: OrchestratorConfig::default(),
            clock: None,
            policy: None,
            selection_prompt: None,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn sequencer(&self) -> &TranscriptSequencer {
        &self.sequencer
    }

    /// Run one turn of a conversation.
    ///
    /// Replies produced before a failure stay persisted. If the sink reports
    /// that the presentation side is gone, the reply in progress is dropped
    /// and `Cancelled` is returned.
    pub async fn run_turn(
        &self,
        conversation_id: &str,
        input: TurnInput,
        roster: &Roster,
        sink: &dyn TurnSink,
    ) -> Result<TurnOutcome, OrchestratorError> {
        let conversation = self.sequencer.conversation(conversation_id).await?;
        if conversation.is_archived() {
            return Err(OrchestratorError::ConversationArchived(
                conversation_id.to_string(),
            ));
        }

        let history = self
            .sequencer
            .history_window(conversation_id, self.config.history_length)
            .await?;

        let (latest, user_message) = match input {
            TurnInput::User(text) => {
                let message = self
                    .sequencer
                    .append(conversation_id, &Emitter::User, &text)
                    .await?;
                (text, Some(message))
            }
            TurnInput::Continue => (self.config.continue_placeholder.clone(), None),
        };

        info!(
            conversation_id,
            history = history.len(),
            continued = user_message.is_none(),
            "TURN_STARTED"
        );

        let candidates = roster.candidate_names();
        let narrator = roster.narrator().map(|c| c.name.as_str());
        let speakers = self
            .selector
            .select_next_speakers(&history, &latest, &candidates, narrator)
            .await;

        if sink.speakers_selected(&speakers).await.is_err() {
            return Err(self.cancelled(conversation_id, None));
        }

        let mut produced: Vec<Message> = Vec::with_capacity(speakers.len());
        for (index, speaker) in speakers.iter().enumerate() {
            let spoken = self
                .speak(conversation_id, speaker, roster, &history, &produced, &latest, sink)
                .await;

            match spoken {
                Ok(message) => produced.push(message),
                Err(OrchestratorError::Cancelled) => {
                    return Err(self.cancelled(conversation_id, Some(speaker.as_str())));
                }
                Err(e) => {
                    warn!(
                        conversation_id,
                        speaker = %speaker,
                        error = %e,
                        persisted = produced.len(),
                        "TURN_SPEAKER_FAILED"
                    );
                    for remaining in &speakers[index..] {
                        sink.speaker_failed(remaining, &e).await;
                    }
                    return Err(e);
                }
            }
        }

        info!(
            conversation_id,
            speakers = ?speakers,
            replies = produced.len(),
            "TURN_COMPLETED"
        );

        Ok(TurnOutcome {
            user_message,
            speakers,
            messages: produced,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn speak(
        &self,
        conversation_id: &str,
        speaker: &str,
        roster: &Roster,
        history: &[Message],
        produced: &[Message],
        latest: &str,
        sink: &dyn TurnSink,
    ) -> Result<Message, OrchestratorError> {
        let character: &Character = roster
            .get(speaker)
            .ok_or_else(|| OrchestratorError::UnknownCharacter(speaker.to_string()))?;

        let window = self.window_with(history, produced);
        let mut stream = self
            .generator
            .generate_response(character, &window, latest)
            .await?;

        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            sink.fragment(&character.name, &fragment)
                .await
                .map_err(|_| OrchestratorError::Cancelled)?;
        }

        let content = stream.into_completed_text().ok_or_else(|| {
            OrchestratorError::StreamInterrupted(BrainError::Network(
                "response stream ended without completing".to_string(),
            ))
        })?;

        let message = self
            .sequencer
            .append(conversation_id, &Emitter::from_character(character), &content)
            .await?;

        sink.message_persisted(&message)
            .await
            .map_err(|_| OrchestratorError::Cancelled)?;
        Ok(message)
    }

    /// Prior history plus this turn's replies, trimmed to the window size.
    fn window_with(&self, history: &[Message], produced: &[Message]) -> Vec<Message> {
        let limit = self.config.history_length;
        let combined: Vec<&Message> = history.iter().chain(produced.iter()).collect();
        let start = combined.len().saturating_sub(limit);
        combined[start..].iter().map(|m| (*m).clone()).collect()
    }

    fn cancelled(&self, conversation_id: &str, speaker: Option<&str>) -> OrchestratorError {
        warn!(conversation_id, speaker = ?speaker, "TURN_CANCELLED");
        OrchestratorError::Cancelled
    }

    /// Delete every message after `target_sequence`.
    pub async fn rollback(
        &self,
        conversation_id: &str,
        target_sequence: i64,
    ) -> Result<u64, OrchestratorError> {
        self.sequencer.rollback(conversation_id, target_sequence).await
    }

    /// Create a conversation seeded with its opening lines.
    pub async fn start_conversation(
        &self,
        user_id: &str,
        story_id: &str,
        opening: &[(Emitter, String)],
    ) -> Result<Conversation, OrchestratorError> {
        self.sequencer
            .start_conversation(user_id, story_id, opening)
            .await
    }

    pub async fn next_actor(&self, conversation_id: &str) -> Result<NextActor, OrchestratorError> {
        self.sequencer.next_actor(conversation_id).await
    }

    pub async fn find_active(
        &self,
        user_id: &str,
        story_id: &str,
    ) -> Result<Option<Conversation>, OrchestratorError> {
        self.sequencer.find_active(user_id, story_id).await
    }

    pub async fn archive(&self, conversation_id: &str) -> Result<(), OrchestratorError> {
        self.sequencer.archive(conversation_id).await
    }

    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, OrchestratorError> {
        self.sequencer.messages(conversation_id).await
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("selector", &self.selector)
            .field("generator", &self.generator)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    backend: Arc<dyn ModelBackend>,
    endpoints: Arc<dyn EndpointStore>,
    transcripts: Arc<dyn TranscriptStore>,
    config: OrchestratorConfig,
    clock: Option<Arc<dyn Clock>>,
    policy: Option<Arc<dyn SelectionPolicy>>,
    selection_prompt: Option<PromptTemplate>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Overrides the policy named by `config.pool_policy`.
    pub fn policy(mut self, policy: Arc<dyn SelectionPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Defaults to [`load_selection_prompt`].
    pub fn selection_prompt(mut self, prompt: impl Into<PromptTemplate>) -> Self {
        self.selection_prompt = Some(prompt.into());
        self
    }

    pub fn build(self) -> Orchestrator {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let policy = self
            .policy
            .unwrap_or_else(|| policy_for(self.config.pool_policy));
        let template = self
            .selection_prompt
            .unwrap_or_else(|| PromptTemplate::new(load_selection_prompt()));

        info!(
            backend = self.backend.name(),
            policy = policy.name(),
            history_length = self.config.history_length,
            "Building orchestrator"
        );

        let pool = ModelPool::new(self.endpoints, policy, clock.clone());
        let selector = SpeakerSelector::new(
            pool.clone(),
            self.backend.clone(),
            template,
            RetryPolicy::new(self.config.selection_attempts),
            self.config.call_timeout,
            self.config.fallback_speaker.clone(),
        );
        let generator = ResponseGenerator::new(
            pool,
            self.backend,
            RetryPolicy::new(self.config.generation_attempts),
            self.config.call_timeout,
        );
        let sequencer = TranscriptSequencer::new(self.transcripts, clock);

        Orchestrator {
            config: self.config,
            selector,
            generator,
            sequencer,
        }
    }
}
