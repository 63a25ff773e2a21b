//! Execution Record: the durable row tracking one turn.
//!
//! One row per turn, created at turn start, terminal at Completed/Failed, never
//! reused. Orchestrator activities write it; the streaming relay only reads it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, ExecutionId, MessageId};
use crate::scene::SceneState;

/// Status of a turn execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Started,
    Analyzing,
    Responding,
    Imaging,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Analyzing => "analyzing",
            Self::Responding => "responding",
            Self::Imaging => "imaging",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "started" => Some(Self::Started),
            "analyzing" => Some(Self::Analyzing),
            "responding" => Some(Self::Responding),
            "imaging" => Some(Self::Imaging),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of a completed turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResult {
    pub text: String,
    pub image_ref: Option<String>,
    pub final_scene: SceneState,
}

/// Durable record of one turn execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub conversation_id: ConversationId,
    pub status: ExecutionStatus,
    /// 0-100.
    pub progress: u8,
    /// Human-readable label for the step currently running.
    pub current_step: String,
    /// Append-only during the responding phase.
    pub streamed_text: String,
    pub result_text: Option<String>,
    pub result_image_ref: Option<String>,
    pub result_scene: Option<SceneState>,
    pub error: Option<String>,
    /// The user message that started this turn.
    pub source_message_id: Option<MessageId>,
    /// Set once finalization has written the permanent assistant message.
    /// Makes re-finalization a no-op.
    pub finalized_message_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Fresh record for a newly submitted turn.
    pub fn new(
        id: ExecutionId,
        conversation_id: ConversationId,
        source_message_id: MessageId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            conversation_id,
            status: ExecutionStatus::Started,
            progress: 0,
            current_step: "queued".to_string(),
            streamed_text: String::new(),
            result_text: None,
            result_image_ref: None,
            result_scene: None,
            error: None,
            source_message_id: Some(source_message_id),
            finalized_message_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
