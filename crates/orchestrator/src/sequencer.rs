//! Transcript sequencing: ordered appends, windows and rollback.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::OrchestratorError;
use crate::store::TranscriptStore;
use crate::transcript::{Conversation, Emitter, EmitterRole, Message, NextActor};

type ConversationLock = Arc<tokio::sync::Mutex<()>>;

/// Serializes writes per conversation on top of a [`TranscriptStore`].
///
/// Stores are atomic on their own; the per-conversation lock keeps
/// concurrent turns in this process from interleaving a read-modify-write.
pub struct TranscriptSequencer {
    store: Arc<dyn TranscriptStore>,
    clock: Arc<dyn Clock>,
    locks: Mutex<HashMap<String, ConversationLock>>,
}

impl TranscriptSequencer {
    pub fn new(store: Arc<dyn TranscriptStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lease<'a>(&'a self, conversation_id: &'a str) -> LockLease<'a> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        let lock = locks
            .entry(conversation_id.to_string())
            .or_default()
            .clone();
        LockLease {
            sequencer: self,
            conversation_id,
            lock,
        }
    }

    /// Append a message at the next sequence number.
    pub async fn append(
        &self,
        conversation_id: &str,
        emitter: &Emitter,
        content: &str,
    ) -> Result<Message, OrchestratorError> {
        let message = {
            let lease = self.lease(conversation_id);
            let _guard = lease.lock.lock().await;
            self.store
                .append(conversation_id, emitter, content, self.clock.now())
                .await?
        };
        debug!(
            conversation_id,
            sequence = message.sequence,
            role = message.role.as_str(),
            "Message appended"
        );
        Ok(message)
    }

    /// Delete every message after `target_sequence`. The sequence counter is
    /// kept, so later appends continue above the old high-water mark.
    pub async fn rollback(
        &self,
        conversation_id: &str,
        target_sequence: i64,
    ) -> Result<u64, OrchestratorError> {
        let removed = {
            let lease = self.lease(conversation_id);
            let _guard = lease.lock.lock().await;
            self.store.conversation(conversation_id).await?;
            self.store.delete_after(conversation_id, target_sequence).await?
        };
        info!(conversation_id, target_sequence, removed, "Transcript rolled back");
        Ok(removed)
    }

    /// The last `n` messages, oldest first.
    pub async fn history_window(
        &self,
        conversation_id: &str,
        n: usize,
    ) -> Result<Vec<Message>, OrchestratorError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        self.store.recent(conversation_id, n).await
    }

    /// Whether the conversation is waiting on the user or owes character replies.
    pub async fn next_actor(&self, conversation_id: &str) -> Result<NextActor, OrchestratorError> {
        self.store.conversation(conversation_id).await?;
        let last = self.store.recent(conversation_id, 1).await?;
        Ok(match last.last() {
            Some(message) if message.role == EmitterRole::User => NextActor::Characters,
            _ => NextActor::User,
        })
    }

    /// Create a conversation and append its opening lines as sequences `1..=n`.
    pub async fn start_conversation(
        &self,
        user_id: &str,
        story_id: &str,
        opening: &[(Emitter, String)],
    ) -> Result<Conversation, OrchestratorError> {
        let id = Uuid::new_v4().to_string();
        self.store
            .create_conversation(&id, user_id, story_id, self.clock.now())
            .await?;

        for (emitter, content) in opening {
            self.append(&id, emitter, content).await?;
        }

        info!(
            conversation_id = %id,
            user_id,
            story_id,
            opening_lines = opening.len(),
            "Conversation started"
        );
        self.store.conversation(&id).await
    }

    pub async fn conversation(&self, conversation_id: &str) -> Result<Conversation, OrchestratorError> {
        self.store.conversation(conversation_id).await
    }

    /// The active conversation for a user and story, if any.
    pub async fn find_active(
        &self,
        user_id: &str,
        story_id: &str,
    ) -> Result<Option<Conversation>, OrchestratorError> {
        self.store.find_active(user_id, story_id).await
    }

    /// Archive a conversation. It keeps its transcript but takes no new messages.
    pub async fn archive(&self, conversation_id: &str) -> Result<(), OrchestratorError> {
        self.store
            .set_archived(conversation_id, self.clock.now())
            .await?;
        info!(conversation_id, "Conversation archived");
        Ok(())
    }

    /// The full transcript, oldest first.
    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, OrchestratorError> {
        self.store.all(conversation_id).await
    }
}

/// A handle on one conversation's lock. Dropping it, including when the
/// owning future is cancelled mid-wait, removes the map entry once nobody
/// else holds it.
struct LockLease<'a> {
    sequencer: &'a TranscriptSequencer,
    conversation_id: &'a str,
    lock: ConversationLock,
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        let mut locks = self
            .sequencer
            .locks
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        // One reference in the map plus ours means nobody else is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(self.conversation_id);
        }
    }
}

impl std::fmt::Debug for TranscriptSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptSequencer").finish_non_exhaustive()
    }
}
