//! The ModelBackend trait definition.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::endpoint::ModelEndpoint;
use crate::error::BrainError;
use crate::turn::ChatTurn;

/// One incremental piece of streamed model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    /// Text carried by this chunk (may be empty).
    pub text: String,
    /// True when the model reported the end of generation with this chunk.
    pub finished: bool,
}

impl StreamChunk {
    /// A chunk that continues the stream.
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finished: false,
        }
    }

    /// The last chunk of a stream.
    pub fn finished(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finished: true,
        }
    }
}

/// A boxed stream of chunks from a streaming completion.
///
/// An `Err` item means the stream was interrupted after it started.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, BrainError>> + Send>>;

/// A language-model backend that can be pointed at any [`ModelEndpoint`].
///
/// The endpoint carries the credential, model name and sampling parameters,
/// so one backend instance serves every endpoint in a pool.
/// This trait is object-safe and can be used with `Arc<dyn ModelBackend>`.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Run a non-streaming completion and return the full reply text.
    async fn complete(
        &self,
        endpoint: &ModelEndpoint,
        system_prompt: &str,
        prior_turns: &[ChatTurn],
    ) -> Result<String, BrainError>;

    /// Start a streaming completion.
    ///
    /// Errors returned here happen before any output was produced. Errors
    /// yielded by the stream happen after.
    async fn complete_streaming(
        &self,
        endpoint: &ModelEndpoint,
        system_prompt: &str,
        prior_turns: &[ChatTurn],
    ) -> Result<FragmentStream, BrainError>;

    /// Get a human-readable name for this backend.
    fn name(&self) -> &str;

    /// Check if the backend is ready to take calls.
    ///
    /// Default implementation always returns true.
    async fn is_ready(&self) -> bool {
        true
    }
}
