//! Mock model backends for testing turn orchestration.
//!
//! This crate provides implementations of the `ModelBackend` trait for tests:
//! - `ScriptedBrain` - Plays back queued replies, failures and fragment scripts
//! - `DelayedBrain` - Wraps another backend with artificial delay
//!
//! For production calls, use the `openai-brain` crate instead.
//!
//! # Example
//!
//! ```rust
//! use mock_brain::{CapabilityClass, ModelBackend, ModelEndpoint, ScriptedBrain};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mock_brain::BrainError> {
//!     let brain = ScriptedBrain::new().reply("[Alice]");
//!     let endpoint = ModelEndpoint::new(
//!         "utility-1",
//!         CapabilityClass::Utility,
//!         "http://localhost",
//!         "key",
//!         "mock",
//!     );
//!
//!     let reply = brain.complete(&endpoint, "who speaks next?", &[]).await?;
//!     assert_eq!(reply, "[Alice]");
//!     assert_eq!(brain.calls().len(), 1);
//!     Ok(())
//! }
//! ```

mod delayed;
mod scripted;

// Re-export brain-core types for convenience
pub use brain_core::{
    async_trait, BrainError, CapabilityClass, ChatTurn, FragmentStream, ModelBackend,
    ModelEndpoint, StreamChunk,
};

pub use delayed::DelayedBrain;
pub use scripted::{CallKind, RecordedCall, ScriptedBrain, Scripted};
