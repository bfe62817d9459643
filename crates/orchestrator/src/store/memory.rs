//! In-memory stores for tests and single-process use.

use std::collections::HashMap;

use async_trait::async_trait;
use brain_core::{CapabilityClass, EndpointStatus, ModelEndpoint};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use super::{EndpointStore, TranscriptStore};
use crate::error::OrchestratorError;
use crate::transcript::{Conversation, ConversationStatus, Emitter, Message};

#[derive(Debug, Default)]
struct TranscriptState {
    conversations: HashMap<String, Conversation>,
    messages: HashMap<String, Vec<Message>>,
}

/// Transcript store held in process memory.
///
/// A single mutex guards counters and messages together, so appends are
/// atomic.
#[derive(Debug, Default)]
pub struct MemoryTranscriptStore {
    state: Mutex<TranscriptState>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TranscriptStore for MemoryTranscriptStore {
    async fn create_conversation(
        &self,
        id: &str,
        user_id: &str,
        story_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Conversation, OrchestratorError> {
        let mut state = self.state.lock().await;
        if state.conversations.contains_key(id) {
            return Err(OrchestratorError::Store(format!(
                "conversation already exists: {}",
                id
            )));
        }

        let conversation = Conversation {
            id: id.to_string(),
            user_id: user_id.to_string(),
            story_id: story_id.to_string(),
            status: ConversationStatus::Active,
            last_sequence: 0,
            created_at: at,
            updated_at: at,
        };
        state
            .conversations
            .insert(id.to_string(), conversation.clone());
        state.messages.insert(id.to_string(), Vec::new());
        Ok(conversation)
    }

    async fn conversation(&self, id: &str) -> Result<Conversation, OrchestratorError> {
        let state = self.state.lock().await;
        state
            .conversations
            .get(id)
            .cloned()
            .ok_or_else(|| OrchestratorError::ConversationNotFound(id.to_string()))
    }

    async fn find_active(
        &self,
        user_id: &str,
        story_id: &str,
    ) -> Result<Option<Conversation>, OrchestratorError> {
        let state = self.state.lock().await;
        Ok(state
            .conversations
            .values()
            .filter(|c| {
                c.user_id == user_id
                    && c.story_id == story_id
                    && c.status == ConversationStatus::Active
            })
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn set_archived(&self, id: &str, at: DateTime<Utc>) -> Result<(), OrchestratorError> {
        let mut state = self.state.lock().await;
        let conversation = state
            .conversations
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::ConversationNotFound(id.to_string()))?;
        conversation.status = ConversationStatus::Archived;
        conversation.updated_at = at;
        Ok(())
    }

    async fn append(
        &self,
        conversation_id: &str,
        emitter: &Emitter,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Message, OrchestratorError> {
        let mut state = self.state.lock().await;
        let conversation = state
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| OrchestratorError::ConversationNotFound(conversation_id.to_string()))?;
        if conversation.is_archived() {
            return Err(OrchestratorError::ConversationArchived(
                conversation_id.to_string(),
            ));
        }

        conversation.last_sequence += 1;
        conversation.updated_at = at;
        let message = Message {
            conversation_id: conversation_id.to_string(),
            role: emitter.role(),
            character_id: emitter.character_id().map(str::to_string),
            character_name: emitter.name().map(str::to_string),
            content: content.to_string(),
            sequence: conversation.last_sequence,
            created_at: at,
        };

        state
            .messages
            .entry(conversation_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn recent(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, OrchestratorError> {
        let state = self.state.lock().await;
        let messages = state
            .messages
            .get(conversation_id)
            .ok_or_else(|| OrchestratorError::ConversationNotFound(conversation_id.to_string()))?;
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    async fn all(&self, conversation_id: &str) -> Result<Vec<Message>, OrchestratorError> {
        let state = self.state.lock().await;
        state
            .messages
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::ConversationNotFound(conversation_id.to_string()))
    }

    async fn delete_after(
        &self,
        conversation_id: &str,
        target: i64,
    ) -> Result<u64, OrchestratorError> {
        let mut state = self.state.lock().await;
        let messages = state
            .messages
            .get_mut(conversation_id)
            .ok_or_else(|| OrchestratorError::ConversationNotFound(conversation_id.to_string()))?;
        let before = messages.len();
        messages.retain(|m| m.sequence <= target);
        Ok((before - messages.len()) as u64)
    }
}

/// Endpoint pool held in process memory.
#[derive(Debug, Default)]
pub struct MemoryEndpointStore {
    endpoints: RwLock<Vec<ModelEndpoint>>,
}

impl MemoryEndpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the pool, keeping the given order as store order.
    pub fn with_endpoints(endpoints: Vec<ModelEndpoint>) -> Self {
        Self {
            endpoints: RwLock::new(endpoints),
        }
    }

    pub async fn insert(&self, endpoint: ModelEndpoint) {
        self.endpoints.write().await.push(endpoint);
    }

    /// Flip an endpoint's status, as an admin would.
    pub async fn set_status(&self, id: &str, status: EndpointStatus) -> bool {
        let mut endpoints = self.endpoints.write().await;
        match endpoints.iter_mut().find(|e| e.id == id) {
            Some(endpoint) => {
                endpoint.status = status;
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, id: &str) -> Option<ModelEndpoint> {
        self.endpoints
            .read()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    pub async fn snapshot(&self) -> Vec<ModelEndpoint> {
        self.endpoints.read().await.clone()
    }
}

#[async_trait]
impl EndpointStore for MemoryEndpointStore {
    async fn active_endpoints(
        &self,
        capability: CapabilityClass,
    ) -> Result<Vec<ModelEndpoint>, OrchestratorError> {
        Ok(self
            .endpoints
            .read()
            .await
            .iter()
            .filter(|e| e.capability == capability && e.is_active())
            .cloned()
            .collect())
    }

    async fn record_usage(
        &self,
        endpoint_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), OrchestratorError> {
        let mut endpoints = self.endpoints.write().await;
        let endpoint = endpoints
            .iter_mut()
            .find(|e| e.id == endpoint_id)
            .ok_or_else(|| OrchestratorError::Store(format!("unknown endpoint: {}", endpoint_id)))?;
        endpoint.usage_count += 1;
        endpoint.last_used = Some(at);
        Ok(())
    }
}
