//! Database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Conversation status stored for an active session.
pub const STATUS_ACTIVE: &str = "active";
/// Conversation status stored once a session is archived.
pub const STATUS_ARCHIVED: &str = "archived";

/// A running session between one user and a story's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    /// Conversation UUID.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Story the roster comes from.
    pub story_id: String,
    /// "active" or "archived".
    pub status: String,
    /// Highest sequence ever assigned. Never decreases.
    pub last_sequence: i64,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last update timestamp (RFC 3339).
    pub updated_at: String,
}

/// A persisted transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ConversationMessage {
    /// Auto-incrementing ID.
    pub id: i64,
    /// Owning conversation.
    pub conversation_id: String,
    /// "user", "narrator" or "character".
    pub role: String,
    /// Character ID for narrator/character entries.
    pub character_id: Option<String>,
    /// Display name for narrator/character entries.
    pub character_name: Option<String>,
    /// Message text.
    pub content: String,
    /// Position in the conversation.
    pub sequence: i64,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
}

/// Fields of a message that the caller supplies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage<'a> {
    pub role: &'a str,
    pub character_id: Option<&'a str>,
    pub character_name: Option<&'a str>,
    pub content: &'a str,
}

/// A stored model endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ModelEndpointRecord {
    /// Endpoint identifier.
    pub id: String,
    /// Capability class ("dialogue", "utility", "t2i", "i2t").
    pub capability: String,
    /// API base URL.
    pub base_url: String,
    /// Bearer credential.
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Model name.
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub top_p: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub frequency_penalty: Option<f64>,
    /// Calls accounted against this endpoint.
    pub usage_count: i64,
    /// Last call timestamp (RFC 3339), if ever used.
    pub last_used: Option<String>,
    /// "active" or "inactive".
    pub status: String,
}
