//! Transcript types: who said what, in which position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::character::{Character, CharacterRole};

/// The kind of participant that produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitterRole {
    User,
    Narrator,
    Character,
}

impl EmitterRole {
    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Narrator => "narrator",
            Self::Character => "character",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "narrator" => Some(Self::Narrator),
            "character" => Some(Self::Character),
            _ => None,
        }
    }
}

/// The author of a message about to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emitter {
    User,
    Persona {
        character_id: String,
        name: String,
        role: CharacterRole,
    },
}

impl Emitter {
    pub fn from_character(character: &Character) -> Self {
        Self::Persona {
            character_id: character.id.clone(),
            name: character.name.clone(),
            role: character.role,
        }
    }

    pub fn role(&self) -> EmitterRole {
        match self {
            Self::User => EmitterRole::User,
            Self::Persona {
                role: CharacterRole::Narrator,
                ..
            } => EmitterRole::Narrator,
            Self::Persona { .. } => EmitterRole::Character,
        }
    }

    pub fn character_id(&self) -> Option<&str> {
        match self {
            Self::User => None,
            Self::Persona { character_id, .. } => Some(character_id),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::User => None,
            Self::Persona { name, .. } => Some(name),
        }
    }
}

/// A persisted transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub conversation_id: String,
    pub role: EmitterRole,
    /// Set for narrator and character entries.
    pub character_id: Option<String>,
    /// Set for narrator and character entries.
    pub character_name: Option<String>,
    pub content: String,
    /// Unique and strictly increasing within the conversation.
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Label used when rendering the message into a prompt.
    pub fn speaker_label(&self) -> &str {
        match self.role {
            EmitterRole::User => "User",
            EmitterRole::Narrator => self.character_name.as_deref().unwrap_or("Narrator"),
            EmitterRole::Character => self.character_name.as_deref().unwrap_or("Character"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Archived,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }

    /// Anything other than "archived" reads as active.
    pub fn parse(s: &str) -> Self {
        if s == "archived" {
            Self::Archived
        } else {
            Self::Active
        }
    }
}

/// A running session between one user and one story's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub story_id: String,
    pub status: ConversationStatus,
    /// Highest sequence ever assigned. Never decreases, even on rollback.
    pub last_sequence: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_archived(&self) -> bool {
        self.status == ConversationStatus::Archived
    }
}

/// Who acts next in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextActor {
    /// Waiting for the user.
    User,
    /// A user message is waiting for character replies.
    Characters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitter_role_from_character() {
        let narrator = Character::narrator("n", "Narrator", "p");
        let alice = Character::new("a", "Alice", "p");

        assert_eq!(Emitter::from_character(&narrator).role(), EmitterRole::Narrator);
        assert_eq!(Emitter::from_character(&alice).role(), EmitterRole::Character);
        assert_eq!(Emitter::User.role(), EmitterRole::User);
        assert_eq!(Emitter::from_character(&alice).name(), Some("Alice"));
        assert_eq!(Emitter::User.character_id(), None);
    }

    #[test]
    fn test_role_storage_form() {
        for role in [EmitterRole::User, EmitterRole::Narrator, EmitterRole::Character] {
            assert_eq!(EmitterRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(EmitterRole::parse("system"), None);
    }

    #[test]
    fn test_speaker_label() {
        let message = Message {
            conversation_id: "c".into(),
            role: EmitterRole::Character,
            character_id: Some("a".into()),
            character_name: Some("Alice".into()),
            content: "hi".into(),
            sequence: 1,
            created_at: Utc::now(),
        };
        assert_eq!(message.speaker_label(), "Alice");

        let user = Message {
            role: EmitterRole::User,
            character_id: None,
            character_name: None,
            ..message
        };
        assert_eq!(user.speaker_label(), "User");
    }
}
