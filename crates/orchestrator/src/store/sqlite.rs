//! SQLite-backed stores over the `database` crate.

use async_trait::async_trait;
use brain_core::{CapabilityClass, EndpointStatus, ModelEndpoint, SamplingParams};
use chrono::{DateTime, SecondsFormat, Utc};
use troupe_database::{
    conversation, message, model_endpoint, ConversationMessage, Database, ModelEndpointRecord,
    NewMessage,
};

use super::{EndpointStore, TranscriptStore};
use crate::error::OrchestratorError;
use crate::transcript::{Conversation, ConversationStatus, Emitter, EmitterRole, Message};

fn format_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, OrchestratorError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| OrchestratorError::Store(format!("bad timestamp {:?}: {}", value, e)))
}

fn conversation_from_record(
    record: troupe_database::Conversation,
) -> Result<Conversation, OrchestratorError> {
    Ok(Conversation {
        status: ConversationStatus::parse(&record.status),
        last_sequence: record.last_sequence,
        created_at: parse_time(&record.created_at)?,
        updated_at: parse_time(&record.updated_at)?,
        id: record.id,
        user_id: record.user_id,
        story_id: record.story_id,
    })
}

fn message_from_record(record: ConversationMessage) -> Result<Message, OrchestratorError> {
    let role = EmitterRole::parse(&record.role).ok_or_else(|| {
        OrchestratorError::Store(format!("unknown message role: {}", record.role))
    })?;

    Ok(Message {
        role,
        created_at: parse_time(&record.created_at)?,
        conversation_id: record.conversation_id,
        character_id: record.character_id,
        character_name: record.character_name,
        content: record.content,
        sequence: record.sequence,
    })
}

/// Transcript store persisted in SQLite.
#[derive(Debug, Clone)]
pub struct SqliteTranscriptStore {
    db: Database,
}

impl SqliteTranscriptStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TranscriptStore for SqliteTranscriptStore {
    async fn create_conversation(
        &self,
        id: &str,
        user_id: &str,
        story_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Conversation, OrchestratorError> {
        let record =
            conversation::create_conversation(self.db.pool(), id, user_id, story_id, &format_time(at))
                .await?;
        conversation_from_record(record)
    }

    async fn conversation(&self, id: &str) -> Result<Conversation, OrchestratorError> {
        let record = conversation::get_conversation(self.db.pool(), id).await?;
        conversation_from_record(record)
    }

    async fn find_active(
        &self,
        user_id: &str,
        story_id: &str,
    ) -> Result<Option<Conversation>, OrchestratorError> {
        conversation::find_active_conversation(self.db.pool(), user_id, story_id)
            .await?
            .map(conversation_from_record)
            .transpose()
    }

    async fn set_archived(&self, id: &str, at: DateTime<Utc>) -> Result<(), OrchestratorError> {
        conversation::archive_conversation(self.db.pool(), id, &format_time(at)).await?;
        Ok(())
    }

    async fn append(
        &self,
        conversation_id: &str,
        emitter: &Emitter,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Message, OrchestratorError> {
        let new_message = NewMessage {
            role: emitter.role().as_str(),
            character_id: emitter.character_id(),
            character_name: emitter.name(),
            content,
        };
        let record =
            message::append_message(self.db.pool(), conversation_id, &new_message, &format_time(at))
                .await?;
        message_from_record(record)
    }

    async fn recent(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, OrchestratorError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        message::recent_messages(self.db.pool(), conversation_id, limit)
            .await?
            .into_iter()
            .map(message_from_record)
            .collect()
    }

    async fn all(&self, conversation_id: &str) -> Result<Vec<Message>, OrchestratorError> {
        message::list_messages(self.db.pool(), conversation_id)
            .await?
            .into_iter()
            .map(message_from_record)
            .collect()
    }

    async fn delete_after(
        &self,
        conversation_id: &str,
        target: i64,
    ) -> Result<u64, OrchestratorError> {
        Ok(message::delete_messages_after(self.db.pool(), conversation_id, target).await?)
    }
}

fn endpoint_from_record(record: ModelEndpointRecord) -> Result<ModelEndpoint, OrchestratorError> {
    let capability = CapabilityClass::parse(&record.capability).ok_or_else(|| {
        OrchestratorError::Store(format!(
            "endpoint {} has unknown capability {}",
            record.id, record.capability
        ))
    })?;
    let last_used = record.last_used.as_deref().map(parse_time).transpose()?;

    let sampling = SamplingParams {
        temperature: record.temperature.map(|v| v as f32),
        max_tokens: record.max_tokens.and_then(|v| u32::try_from(v).ok()),
        top_p: record.top_p.map(|v| v as f32),
        presence_penalty: record.presence_penalty.map(|v| v as f32),
        frequency_penalty: record.frequency_penalty.map(|v| v as f32),
    };

    Ok(ModelEndpoint {
        id: record.id,
        capability,
        base_url: record.base_url,
        api_key: record.api_key,
        model: record.model,
        sampling,
        usage_count: record.usage_count,
        last_used,
        status: EndpointStatus::parse(&record.status),
    })
}

fn endpoint_to_record(endpoint: &ModelEndpoint) -> ModelEndpointRecord {
    ModelEndpointRecord {
        id: endpoint.id.clone(),
        capability: endpoint.capability.as_str().to_string(),
        base_url: endpoint.base_url.clone(),
        api_key: endpoint.api_key.clone(),
        model: endpoint.model.clone(),
        temperature: endpoint.sampling.temperature.map(f64::from),
        max_tokens: endpoint.sampling.max_tokens.map(i64::from),
        top_p: endpoint.sampling.top_p.map(f64::from),
        presence_penalty: endpoint.sampling.presence_penalty.map(f64::from),
        frequency_penalty: endpoint.sampling.frequency_penalty.map(f64::from),
        usage_count: endpoint.usage_count,
        last_used: endpoint.last_used.map(format_time),
        status: endpoint.status.as_str().to_string(),
    }
}

/// Endpoint pool persisted in SQLite.
#[derive(Debug, Clone)]
pub struct SqliteEndpointStore {
    db: Database,
}

impl SqliteEndpointStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register an endpoint in the pool.
    pub async fn insert(&self, endpoint: &ModelEndpoint) -> Result<(), OrchestratorError> {
        model_endpoint::insert_endpoint(self.db.pool(), &endpoint_to_record(endpoint)).await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<ModelEndpoint, OrchestratorError> {
        let record = model_endpoint::get_endpoint(self.db.pool(), id).await?;
        endpoint_from_record(record)
    }

    pub async fn set_status(&self, id: &str, status: EndpointStatus) -> Result<(), OrchestratorError> {
        model_endpoint::set_endpoint_status(self.db.pool(), id, status.as_str()).await?;
        Ok(())
    }
}

#[async_trait]
impl EndpointStore for SqliteEndpointStore {
    async fn active_endpoints(
        &self,
        capability: CapabilityClass,
    ) -> Result<Vec<ModelEndpoint>, OrchestratorError> {
        model_endpoint::list_active_endpoints(self.db.pool(), capability.as_str())
            .await?
            .into_iter()
            .map(endpoint_from_record)
            .collect()
    }

    async fn record_usage(
        &self,
        endpoint_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), OrchestratorError> {
        model_endpoint::record_usage(self.db.pool(), endpoint_id, &format_time(at)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn test_db() -> Database {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_transcript_round_trip() {
        let store = SqliteTranscriptStore::new(test_db().await);
        let created = store.create_conversation("c1", "u1", "s1", at(0)).await.unwrap();
        assert_eq!(created.created_at, at(0));

        let alice = Emitter::Persona {
            character_id: "a".into(),
            name: "Alice".into(),
            role: crate::character::CharacterRole::Character,
        };
        store.append("c1", &Emitter::User, "hi", at(1)).await.unwrap();
        let reply = store.append("c1", &alice, "Hello!", at(2)).await.unwrap();

        assert_eq!(reply.sequence, 2);
        assert_eq!(reply.role, EmitterRole::Character);
        assert_eq!(reply.character_name.as_deref(), Some("Alice"));
        assert_eq!(reply.created_at, at(2));

        let all = store.all("c1").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].role, EmitterRole::User);
    }

    #[tokio::test]
    async fn test_errors_map_to_conversation_variants() {
        let store = SqliteTranscriptStore::new(test_db().await);

        let missing = store.append("ghost", &Emitter::User, "hi", at(0)).await;
        assert!(matches!(missing, Err(OrchestratorError::ConversationNotFound(_))));

        store.create_conversation("c1", "u1", "s1", at(0)).await.unwrap();
        store.set_archived("c1", at(1)).await.unwrap();
        let archived = store.append("c1", &Emitter::User, "hi", at(2)).await;
        assert!(matches!(archived, Err(OrchestratorError::ConversationArchived(_))));

        let lookup = store.conversation("nope").await;
        assert!(matches!(lookup, Err(OrchestratorError::ConversationNotFound(_))));
    }

    #[tokio::test]
    async fn test_endpoint_round_trip_and_usage() {
        let store = SqliteEndpointStore::new(test_db().await);
        let endpoint = ModelEndpoint::new(
            "chat-1",
            CapabilityClass::Dialogue,
            "https://api.example.com/v1",
            "sk-test",
            "deepseek-chat",
        )
        .with_sampling(SamplingParams {
            temperature: Some(0.5),
            max_tokens: Some(512),
            ..Default::default()
        });
        store.insert(&endpoint).await.unwrap();

        let active = store.active_endpoints(CapabilityClass::Dialogue).await.unwrap();
        assert_eq!(active, vec![endpoint.clone()]);

        store.record_usage("chat-1", at(5)).await.unwrap();
        let stored = store.get("chat-1").await.unwrap();
        assert_eq!(stored.usage_count, 1);
        assert_eq!(stored.last_used, Some(at(5)));

        store.set_status("chat-1", EndpointStatus::Inactive).await.unwrap();
        assert!(store
            .active_endpoints(CapabilityClass::Dialogue)
            .await
            .unwrap()
            .is_empty());
    }
}
