//! Reverie Domain - Core domain types for the turn engine.
//!
//! Pure types only: typed IDs, scene state, execution records, and messages.
//! No I/O, no async, no framework dependencies.

mod companion;
mod execution;
mod ids;
mod message;
mod scene;

pub use companion::{CompanionProfile, Conversation};
pub use execution::{ExecutionRecord, ExecutionStatus, TurnResult};
pub use ids::{CompanionId, ConversationId, ExecutionId, MessageId};
pub use message::{ConversationMessage, MessageRole};
pub use scene::{SceneState, TurnContext, DEFAULT_EXPRESSION, DEFAULT_LIGHTING};
