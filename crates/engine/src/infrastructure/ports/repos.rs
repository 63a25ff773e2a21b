//! Repository ports for the two durable stores.
//!
//! The Execution Record row is the single mutable shared resource during a
//! turn: only orchestrator activities write it, the relay only reads it.

use async_trait::async_trait;
use reverie_domain::{
    CompanionId, CompanionProfile, Conversation, ConversationId, ConversationMessage,
    ExecutionId, ExecutionRecord, ExecutionStatus, MessageId, SceneState, TurnResult,
};

use super::error::RepoError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionRepo: Send + Sync {
    /// Insert a fresh record. Fails if the id already exists.
    async fn insert(&self, record: &ExecutionRecord) -> Result<(), RepoError>;

    async fn get(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, RepoError>;

    /// Mirror a state-machine transition into the durable record.
    async fn set_stage(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        progress: u8,
        current_step: &str,
    ) -> Result<(), RepoError>;

    /// Append a chunk to `streamed_text` (responding phase only).
    async fn append_streamed_text(&self, id: ExecutionId, chunk: &str) -> Result<(), RepoError>;

    /// Clear `streamed_text`. A retried reply attempt starts from an empty
    /// field; text flushed by an aborted attempt must not survive it.
    async fn reset_streamed_text(&self, id: ExecutionId) -> Result<(), RepoError>;

    /// Terminal success: status=completed, progress=100, result stored.
    async fn complete(&self, id: ExecutionId, result: &TurnResult) -> Result<(), RepoError>;

    /// Terminal failure: status=failed, error recorded. Streamed text is kept.
    async fn fail(&self, id: ExecutionId, error: &str) -> Result<(), RepoError>;

    /// Record the permanent message written by finalization.
    async fn set_finalized(
        &self,
        id: ExecutionId,
        message_id: MessageId,
    ) -> Result<(), RepoError>;

    /// The non-terminal execution for a conversation, if any.
    async fn active_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<ExecutionId>, RepoError>;

    /// Sweep all non-terminal records to failed. Returns the number swept.
    /// Run once at startup; a restarted process cannot resume in-flight turns.
    async fn fail_orphaned(&self, error: &str) -> Result<u64, RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationRepo: Send + Sync {
    async fn get(&self, id: ConversationId) -> Result<Option<Conversation>, RepoError>;

    async fn get_companion(&self, id: CompanionId)
        -> Result<Option<CompanionProfile>, RepoError>;

    /// Replace the durable scene state. Called at most once per turn, only
    /// when the final Turn Context differs from the scene at turn start.
    async fn update_scene_state(
        &self,
        id: ConversationId,
        scene: &SceneState,
    ) -> Result<(), RepoError>;

    /// Most recent messages, oldest first, at most `limit`.
    async fn recent_messages(
        &self,
        id: ConversationId,
        limit: usize,
    ) -> Result<Vec<ConversationMessage>, RepoError>;

    async fn insert_message(&self, message: &ConversationMessage) -> Result<(), RepoError>;
}
