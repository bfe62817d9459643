//! Turn orchestrator for multi-character conversations.
//!
//! This crate provides the [`Orchestrator`] type, which runs one turn of a
//! story conversation: it decides which characters speak, streams each
//! reply from a model backend and persists an ordered transcript.
//!
//! # Features
//!
//! - Speaker selection through a utility model, with a fallback speaker
//! - Streamed character replies with narrator wrapping and tag stripping
//! - Gap-tolerant transcript sequencing with rollback
//! - Endpoint pools with random, least-recently-used or least-used policies
//! - In-memory and SQLite stores
//!
//! # Architecture
//!
//! ```text
//! User message (from the presentation layer)
//!          ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ORCHESTRATOR                           │
//! │                                                             │
//! │  1. Read history window, append user message                │
//! │         ↓                                                   │
//! │  2. Select speakers (utility endpoint, retry + fallback)    │
//! │         ↓                                                   │
//! │  3. For each speaker in order:                              │
//! │     • open reply stream (dialogue endpoint, retry)          │
//! │     • forward cleaned fragments to the TurnSink             │
//! │     • append the finished reply to the transcript           │
//! │         ↓                                                   │
//! │  4. Return the persisted messages                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use orchestrator::{
//!     Character, LoggingSink, MemoryEndpointStore, MemoryTranscriptStore, Orchestrator,
//!     Roster, TurnInput,
//! };
//! use openai_brain::OpenAiBrain;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::builder(
//!         Arc::new(OpenAiBrain::from_env()?),
//!         Arc::new(MemoryEndpointStore::new()),
//!         Arc::new(MemoryTranscriptStore::new()),
//!     )
//!     .build();
//!
//!     let roster = Roster::new(vec![
//!         Character::narrator("narrator", "Narrator", "Describe the scene."),
//!         Character::new("alice", "Alice", "You are Alice, a cheerful innkeeper."),
//!     ])?;
//!
//!     let conversation = orchestrator.start_conversation("user-1", "inn", &[]).await?;
//!     let outcome = orchestrator
//!         .run_turn(&conversation.id, TurnInput::User("Hello!".into()), &roster, &LoggingSink)
//!         .await?;
//!
//!     for message in outcome.messages {
//!         println!("{}: {}", message.speaker_label(), message.content);
//!     }
//!     Ok(())
//! }
//! ```

mod character;
mod clock;
mod config;
mod error;
mod generation;
mod history;
mod orchestrator;
mod pool;
mod retry;
mod sequencer;
mod sink;
mod speaker;
mod store;
mod transcript;

pub use character::{Character, CharacterRole, Roster};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{OrchestratorConfig, OrchestratorConfigBuilder, PoolPolicyKind};
pub use error::OrchestratorError;
pub use generation::{build_generation_prompt, strip_tags, ResponseGenerator, ResponseStream};
pub use history::{generation_line, selection_line};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, TurnInput, TurnOutcome};
pub use pool::{
    policy_for, LeastRecentlyUsedPolicy, LeastUsedPolicy, ModelPool, RandomPolicy,
    SelectionPolicy,
};
pub use retry::{RetryError, RetryPolicy};
pub use sequencer::TranscriptSequencer;
pub use sink::{ChannelSink, LoggingSink, NoOpSink, TurnEvent, TurnSink};
pub use speaker::{
    load_selection_prompt, parse_selection, SpeakerSelector, DEFAULT_SELECTION_PROMPT,
    DEFAULT_SELECTION_PROMPT_FILE,
};
pub use store::{
    EndpointStore, MemoryEndpointStore, MemoryTranscriptStore, SqliteEndpointStore,
    SqliteTranscriptStore, TranscriptStore,
};
pub use transcript::{
    Conversation, ConversationStatus, Emitter, EmitterRole, Message, NextActor,
};

// Re-export commonly used types from the backend contract
pub use brain_core::{CapabilityClass, ModelBackend, ModelEndpoint};
