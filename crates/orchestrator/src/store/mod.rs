//! Persistence seams for transcripts and the model endpoint pool.

mod memory;
mod sqlite;

pub use memory::{MemoryEndpointStore, MemoryTranscriptStore};
pub use sqlite::{SqliteEndpointStore, SqliteTranscriptStore};

use async_trait::async_trait;
use brain_core::{CapabilityClass, ModelEndpoint};
use chrono::{DateTime, Utc};

use crate::error::OrchestratorError;
use crate::transcript::{Conversation, Emitter, Message};

/// Storage for conversations and their ordered messages.
///
/// `append` must be atomic: the sequence it assigns is `last_sequence + 1`
/// and both the counter and the message are written together or not at all.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn create_conversation(
        &self,
        id: &str,
        user_id: &str,
        story_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Conversation, OrchestratorError>;

    /// Fails with `ConversationNotFound` for unknown ids.
    async fn conversation(&self, id: &str) -> Result<Conversation, OrchestratorError>;

    async fn find_active(
        &self,
        user_id: &str,
        story_id: &str,
    ) -> Result<Option<Conversation>, OrchestratorError>;

    async fn set_archived(&self, id: &str, at: DateTime<Utc>) -> Result<(), OrchestratorError>;

    /// Append a message at the next sequence.
    async fn append(
        &self,
        conversation_id: &str,
        emitter: &Emitter,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Message, OrchestratorError>;

    /// The last `limit` messages, oldest first.
    async fn recent(&self, conversation_id: &str, limit: usize)
        -> Result<Vec<Message>, OrchestratorError>;

    /// Every message, oldest first.
    async fn all(&self, conversation_id: &str) -> Result<Vec<Message>, OrchestratorError>;

    /// Delete messages with a sequence above `target`. Returns how many went.
    async fn delete_after(&self, conversation_id: &str, target: i64)
        -> Result<u64, OrchestratorError>;
}

/// Read access to the endpoint pool plus usage accounting.
#[async_trait]
pub trait EndpointStore: Send + Sync {
    /// Active endpoints of a class, in a stable store order.
    async fn active_endpoints(
        &self,
        capability: CapabilityClass,
    ) -> Result<Vec<ModelEndpoint>, OrchestratorError>;

    /// Increment the usage counter and stamp `last_used`.
    async fn record_usage(&self, endpoint_id: &str, at: DateTime<Utc>)
        -> Result<(), OrchestratorError>;
}
