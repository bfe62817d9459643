//! OpenAI-compatible backend implementation.
//!
//! This crate provides a [`ModelBackend`] that talks to any API exposing the
//! OpenAI `/chat/completions` shape (OpenAI, DeepSeek, OpenRouter, local
//! gateways). Endpoint credentials, model names and sampling parameters come
//! from the [`ModelEndpoint`] passed with each call, so one `OpenAiBrain`
//! serves a whole pool.
//!
//! # Features
//!
//! - Non-streaming completions for utility calls
//! - SSE streaming completions via `reqwest-eventsource`
//! - Transport failures reported distinctly from malformed payloads
//!
//! # Usage
//!
//! ```rust,no_run
//! use openai_brain::{CapabilityClass, ModelBackend, ModelEndpoint, OpenAiBrain};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let brain = OpenAiBrain::from_env()?;
//!     let endpoint = ModelEndpoint::new(
//!         "chat-1",
//!         CapabilityClass::Dialogue,
//!         "https://api.openai.com/v1",
//!         std::env::var("OPENAI_API_KEY")?,
//!         "gpt-4o-mini",
//!     );
//!     let reply = brain.complete(&endpoint, "Say hi.", &[]).await?;
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```

mod api_types;
mod brain;
mod config;
mod stream;

pub use brain::OpenAiBrain;
pub use config::{OpenAiBrainConfig, OpenAiBrainConfigBuilder};
pub use stream::ChunkStream;

// Re-export brain-core types for convenience
pub use brain_core::{
    async_trait, BrainError, CapabilityClass, ChatTurn, FragmentStream, ModelBackend,
    ModelEndpoint, SamplingParams, StreamChunk,
};
