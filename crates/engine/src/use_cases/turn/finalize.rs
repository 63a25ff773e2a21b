//! Finalization: hand off a completed execution to the permanent transcript.

use std::sync::Arc;

use reverie_domain::{ConversationMessage, ExecutionId, ExecutionStatus, MessageId};

use crate::infrastructure::ports::{ClockPort, ConversationRepo, ExecutionRepo};
use crate::use_cases::turn::TurnError;

/// Outcome of a finalize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finalized {
    pub message_id: MessageId,
    /// True when a previous call already wrote the message.
    pub already_finalized: bool,
}

/// Use case: write the permanent assistant message for a completed turn.
pub struct FinalizeTurn {
    executions: Arc<dyn ExecutionRepo>,
    conversations: Arc<dyn ConversationRepo>,
    clock: Arc<dyn ClockPort>,
}

impl FinalizeTurn {
    pub fn new(
        executions: Arc<dyn ExecutionRepo>,
        conversations: Arc<dyn ConversationRepo>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            executions,
            conversations,
            clock,
        }
    }

    /// Idempotent: a re-invocation (client retry after a dropped response)
    /// returns the message id written the first time.
    pub async fn execute(&self, execution_id: ExecutionId) -> Result<Finalized, TurnError> {
        let record = self
            .executions
            .get(execution_id)
            .await?
            .ok_or(TurnError::ExecutionNotFound)?;

        if let Some(message_id) = record.finalized_message_id {
            return Ok(Finalized {
                message_id,
                already_finalized: true,
            });
        }

        if record.status != ExecutionStatus::Completed {
            return Err(TurnError::NotCompleted);
        }

        let text = record.result_text.unwrap_or_default();
        let message = ConversationMessage::assistant(
            record.conversation_id,
            text,
            record.result_image_ref,
            self.clock.now(),
        );

        self.conversations.insert_message(&message).await?;
        self.executions
            .set_finalized(execution_id, message.id)
            .await?;

        tracing::info!(execution_id = %execution_id, message_id = %message.id, "turn finalized");
        Ok(Finalized {
            message_id: message.id,
            already_finalized: false,
        })
    }
}
