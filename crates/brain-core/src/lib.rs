//! Core trait and types for model backends.
//!
//! This crate provides the shared interface between the Troupe orchestrator
//! and the language-model backends it drives. It defines:
//!
//! - [`ModelBackend`] - The trait every backend implements
//! - [`ModelEndpoint`] / [`CapabilityClass`] - Credentialed endpoints grouped by purpose
//! - [`ChatTurn`] - Prior turns sent alongside a system prompt
//! - [`StreamChunk`] / [`FragmentStream`] - Incremental streaming output
//! - [`BrainError`] - Error types for backend operations
//!
//! # Example
//!
//! ```rust
//! use brain_core::{async_trait, BrainError, ChatTurn, FragmentStream, ModelBackend, ModelEndpoint, StreamChunk};
//!
//! struct ParrotBrain;
//!
//! #[async_trait]
//! impl ModelBackend for ParrotBrain {
//!     async fn complete(
//!         &self,
//!         _endpoint: &ModelEndpoint,
//!         system_prompt: &str,
//!         _prior_turns: &[ChatTurn],
//!     ) -> Result<String, BrainError> {
//!         Ok(system_prompt.to_string())
//!     }
//!
//!     async fn complete_streaming(
//!         &self,
//!         _endpoint: &ModelEndpoint,
//!         system_prompt: &str,
//!         _prior_turns: &[ChatTurn],
//!     ) -> Result<FragmentStream, BrainError> {
//!         let chunks: Vec<Result<StreamChunk, BrainError>> =
//!             vec![Ok(StreamChunk::finished(system_prompt))];
//!         Ok(Box::pin(futures::stream::iter(chunks)))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "ParrotBrain"
//!     }
//! }
//! ```

mod endpoint;
mod error;
mod prompt;
mod trait_def;
mod turn;

pub use endpoint::{CapabilityClass, EndpointStatus, ModelEndpoint, SamplingParams};
pub use error::BrainError;
pub use prompt::{hash_prompt, PromptTemplate};
pub use trait_def::{FragmentStream, ModelBackend, StreamChunk};
pub use turn::ChatTurn;

// Re-export async_trait for convenience
pub use async_trait::async_trait;
