//! Error types for orchestrator operations.

use brain_core::{BrainError, CapabilityClass};
use thiserror::Error;

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No active endpoint serves this capability class.
    #[error("no active endpoint for capability class {0}")]
    NoEndpointAvailable(CapabilityClass),

    /// The speaker selection reply had no bracketed list.
    #[error("speaker selection unparsable: {0}")]
    SelectionParse(String),

    /// The speaker selection reply named someone outside the roster.
    #[error("speaker selection named an invalid candidate: {0}")]
    InvalidCandidate(String),

    /// A single backend call failed.
    #[error("backend error: {0}")]
    Brain(#[from] BrainError),

    /// Generation could not be started within the attempt budget.
    #[error("generation failed after {attempts} attempts: {source}")]
    GenerationTransport {
        attempts: u32,
        #[source]
        source: BrainError,
    },

    /// The response stream broke after output had started.
    #[error("response stream interrupted: {0}")]
    StreamInterrupted(#[source] BrainError),

    /// A selected speaker is not in the roster.
    #[error("unknown character: {0}")]
    UnknownCharacter(String),

    /// The conversation does not exist.
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// The conversation is archived and takes no new messages.
    #[error("conversation archived: {0}")]
    ConversationArchived(String),

    /// Persistence failed.
    #[error("store error: {0}")]
    Store(String),

    /// Invalid configuration or roster.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The presentation side went away mid-turn.
    #[error("turn cancelled")]
    Cancelled,
}

impl OrchestratorError {
    /// Whether retrying the same operation could succeed.
    ///
    /// An empty pool, a bad configuration or a cancelled turn cannot recover
    /// within a turn.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::NoEndpointAvailable(_)
                | Self::Configuration(_)
                | Self::Cancelled
                | Self::ConversationNotFound(_)
                | Self::ConversationArchived(_)
        )
    }
}

impl From<troupe_database::DatabaseError> for OrchestratorError {
    fn from(err: troupe_database::DatabaseError) -> Self {
        use troupe_database::DatabaseError;

        match err {
            DatabaseError::NotFound {
                entity: "Conversation",
                id,
            } => Self::ConversationNotFound(id),
            DatabaseError::Archived(id) => Self::ConversationArchived(id),
            other => Self::Store(other.to_string()),
        }
    }
}
