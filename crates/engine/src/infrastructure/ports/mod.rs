//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete
//! types. Ports exist for:
//! - LLM calls (could swap Ollama -> another provider)
//! - Image generation (could swap ComfyUI -> other)
//! - Durable stores (could swap SQLite -> Postgres)
//! - Asset storage and Clock (for testing)

mod error;
mod external;
mod repos;
mod testing;

pub use error::{AssetError, ImageGenError, LlmError, RepoError};
pub use external::{
    AssetStorePort, ChatMessage, FinishReason, ImageGenPort, ImageRequest, ImageResult,
    LlmPort, LlmRequest, LlmResponse, MessageRole, TokenStream, TokenUsage,
};
pub use repos::{ConversationRepo, ExecutionRepo};
pub use testing::ClockPort;

#[cfg(test)]
pub use repos::{MockConversationRepo, MockExecutionRepo};

#[cfg(test)]
pub use testing::MockClockPort;
