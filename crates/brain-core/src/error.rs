//! Error types for backend operations.

use thiserror::Error;

/// Errors that can occur while talking to a model backend.
///
/// Transport conditions (`Network`, `Timeout`, `Api`) are kept distinct from
/// `MalformedResponse` so callers can tell a flaky endpoint from a model that
/// answered with something unusable.
#[derive(Debug, Clone, Error)]
pub enum BrainError {
    /// The request could not be sent or the connection dropped.
    #[error("network error: {0}")]
    Network(String),

    /// The call did not finish within its time budget.
    #[error("model call timed out")]
    Timeout,

    /// The endpoint answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message reported by the endpoint.
        message: String,
    },

    /// The endpoint answered, but the payload could not be understood.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The backend or endpoint is misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BrainError {
    /// Whether this error came from the transport rather than the payload.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout | Self::Api { .. })
    }
}
