//! Turn submission: guard, durable user message, execution row, spawn.

use std::sync::Arc;

use reverie_domain::{ConversationId, ConversationMessage, ExecutionId, ExecutionRecord};

use crate::infrastructure::ports::{ClockPort, ConversationRepo, ExecutionRepo};
use crate::use_cases::turn::progress::ExecutionRegistry;
use crate::use_cases::turn::run_turn::{RunTurn, RunTurnCommand};
use crate::use_cases::turn::TurnError;

/// Use case: accept a turn and start it, returning immediately.
pub struct SubmitTurn {
    executions: Arc<dyn ExecutionRepo>,
    conversations: Arc<dyn ConversationRepo>,
    registry: Arc<ExecutionRegistry>,
    clock: Arc<dyn ClockPort>,
    runner: Arc<RunTurn>,
}

impl SubmitTurn {
    pub fn new(
        executions: Arc<dyn ExecutionRepo>,
        conversations: Arc<dyn ConversationRepo>,
        registry: Arc<ExecutionRegistry>,
        clock: Arc<dyn ClockPort>,
        runner: Arc<RunTurn>,
    ) -> Self {
        Self {
            executions,
            conversations,
            registry,
            clock,
            runner,
        }
    }

    /// Fire-and-forget: validates, persists the user message and the fresh
    /// Execution Record, then spawns the orchestrator.
    ///
    /// One active turn per conversation; a second submission while one is
    /// running is rejected with the running execution's id.
    pub async fn execute(
        &self,
        conversation_id: ConversationId,
        message: &str,
        generate_image: bool,
    ) -> Result<ExecutionId, TurnError> {
        if self.conversations.get(conversation_id).await?.is_none() {
            return Err(TurnError::ConversationNotFound);
        }

        if let Some(active) = self
            .executions
            .active_for_conversation(conversation_id)
            .await?
        {
            return Err(TurnError::TurnAlreadyActive(active));
        }

        let now = self.clock.now();

        let user_message = ConversationMessage::user(conversation_id, message, now);
        self.conversations.insert_message(&user_message).await?;

        let execution_id = ExecutionId::new();
        let record = ExecutionRecord::new(execution_id, conversation_id, user_message.id, now);
        self.executions.insert(&record).await?;

        let handle = self.registry.register(execution_id);

        let command = RunTurnCommand {
            execution_id,
            conversation_id,
            user_message: message.to_string(),
            source_message_id: user_message.id,
            generate_image,
        };

        let runner = self.runner.clone();
        tokio::spawn(async move {
            runner.execute(command, handle).await;
        });

        tracing::info!(execution_id = %execution_id, conversation_id = %conversation_id, "turn started");
        Ok(execution_id)
    }
}
