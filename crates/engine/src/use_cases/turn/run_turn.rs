//! The turn state machine.
//!
//! Step sequence: initial analysis, streamed reply, final analysis (the reply
//! may itself change the scene), conditional scene-state write, conditional
//! render. Every transition is written to the live progress handle and
//! mirrored into the Execution Record, so the live query and the polled
//! record never diverge at a step boundary.

use std::sync::Arc;

use reverie_domain::{
    ConversationId, ExecutionId, ExecutionStatus, MessageId, TurnContext, TurnResult,
};

use crate::infrastructure::ports::{ConversationRepo, ExecutionRepo};
use crate::infrastructure::retry::{llm_error_is_retryable, with_backoff, RetryConfig};
use crate::use_cases::continuity::{AnalyzeRequest, AnalyzeScene};
use crate::use_cases::imaging::RenderScene;
use crate::use_cases::reply::{GenerateReply, ReplyRequest};
use crate::use_cases::turn::progress::{ExecutionRegistry, ProgressHandle};
use crate::use_cases::turn::TurnError;

/// History window fed to analysis and reply prompts.
const HISTORY_LIMIT: usize = 8;

/// Everything the orchestrator needs to run one submitted turn.
#[derive(Debug, Clone)]
pub struct RunTurnCommand {
    pub execution_id: ExecutionId,
    pub conversation_id: ConversationId,
    pub user_message: String,
    pub source_message_id: MessageId,
    pub generate_image: bool,
}

/// Use case: drive one execution from `started` to a terminal state.
pub struct RunTurn {
    analyze: AnalyzeScene,
    reply: GenerateReply,
    render: RenderScene,
    executions: Arc<dyn ExecutionRepo>,
    conversations: Arc<dyn ConversationRepo>,
    registry: Arc<ExecutionRegistry>,
    retry: RetryConfig,
}

impl RunTurn {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        analyze: AnalyzeScene,
        reply: GenerateReply,
        render: RenderScene,
        executions: Arc<dyn ExecutionRepo>,
        conversations: Arc<dyn ConversationRepo>,
        registry: Arc<ExecutionRegistry>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            analyze,
            reply,
            render,
            executions,
            conversations,
            registry,
            retry,
        }
    }

    /// Run the turn to a terminal state. Never returns an error to the
    /// spawner: failures are recorded on the Execution Record.
    pub async fn execute(&self, command: RunTurnCommand, handle: ProgressHandle) {
        let execution_id = command.execution_id;

        match self.run_steps(&command, &handle).await {
            Ok(result) => {
                if let Err(e) = self.executions.complete(execution_id, &result).await {
                    tracing::error!(execution_id = %execution_id, error = %e, "failed to record completion");
                }
                handle
                    .set_stage(ExecutionStatus::Completed, 100, "done")
                    .await;
                tracing::info!(execution_id = %execution_id, "turn completed");
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(write_err) = self.executions.fail(execution_id, &message).await {
                    tracing::error!(execution_id = %execution_id, error = %write_err, "failed to record failure");
                }
                handle
                    .set_stage(ExecutionStatus::Failed, 100, "failed")
                    .await;
                tracing::warn!(execution_id = %execution_id, error = %message, "turn failed");
            }
        }

        self.registry.deregister(execution_id);
    }

    async fn run_steps(
        &self,
        command: &RunTurnCommand,
        handle: &ProgressHandle,
    ) -> Result<TurnResult, TurnError> {
        let conversation = self
            .conversations
            .get(command.conversation_id)
            .await?
            .ok_or(TurnError::ConversationNotFound)?;
        let companion = self
            .conversations
            .get_companion(conversation.companion_id)
            .await?
            .ok_or(TurnError::ConversationNotFound)?;

        // Snapshot at turn start; the no-op persistence check compares
        // against this, not whatever the row holds later.
        let prior_scene = conversation.scene.clone();

        let mut history = self
            .conversations
            .recent_messages(command.conversation_id, HISTORY_LIMIT)
            .await?;
        // The submitted message is already durable; prompts append it
        // explicitly, so drop it from the history window.
        history.retain(|m| m.id != command.source_message_id);

        // Step 1: initial analysis, grounding the reply.
        self.set_stage(command.execution_id, handle, ExecutionStatus::Analyzing, 10, "analyzing scene")
            .await;

        let initial_request = AnalyzeRequest {
            prior: prior_scene.clone(),
            history: history.clone(),
            user_message: command.user_message.clone(),
            companion_name: companion.name.clone(),
            user_name: conversation.user_name.clone(),
            reply_text: String::new(),
        };
        let initial_context: TurnContext = with_backoff(
            &self.retry,
            "initial_analysis",
            llm_error_is_retryable,
            || self.analyze.execute(&initial_request),
        )
        .await?;

        // Step 2: streamed reply.
        self.set_stage(command.execution_id, handle, ExecutionStatus::Responding, 30, "generating reply")
            .await;

        let reply_request = ReplyRequest {
            companion: companion.clone(),
            user_message: command.user_message.clone(),
            history: history.clone(),
            context: initial_context,
            user_name: conversation.user_name.clone(),
            execution_id: Some(command.execution_id),
            progress: Some(handle.clone()),
        };
        let reply_text = with_backoff(
            &self.retry,
            "reply_generation",
            llm_error_is_retryable,
            || self.reply.execute(&reply_request),
        )
        .await?;

        // Step 3: final analysis, with the reply visible as a character line.
        self.set_stage(command.execution_id, handle, ExecutionStatus::Analyzing, 70, "updating scene state")
            .await;

        let final_request = AnalyzeRequest {
            prior: prior_scene.clone(),
            history,
            user_message: command.user_message.clone(),
            companion_name: companion.name.clone(),
            user_name: conversation.user_name.clone(),
            reply_text: reply_text.clone(),
        };
        let final_context: TurnContext = with_backoff(
            &self.retry,
            "final_analysis",
            llm_error_is_retryable,
            || self.analyze.execute(&final_request),
        )
        .await?;

        // Step 4: conditional persistence, at most one write per turn.
        self.set_stage(command.execution_id, handle, ExecutionStatus::Analyzing, 80, "updating scene state")
            .await;

        let final_scene = final_context.scene_state();
        if final_scene.differs_from(&prior_scene) {
            let conversation_id = command.conversation_id;
            with_backoff(&self.retry, "scene_persistence", |_| true, || {
                self.conversations
                    .update_scene_state(conversation_id, &final_scene)
            })
            .await?;
            tracing::debug!(conversation_id = %conversation_id, "scene state updated");
        }
        self.set_stage(command.execution_id, handle, ExecutionStatus::Analyzing, 85, "updating scene state")
            .await;

        // Step 5: conditional render, always from the final context.
        let image_ref = if command.generate_image {
            self.set_stage(command.execution_id, handle, ExecutionStatus::Imaging, 85, "rendering scene")
                .await;
            let reference = with_backoff(&self.retry, "scene_render", |_| true, || {
                self.render.execute(&companion, &final_context)
            })
            .await?;
            Some(reference)
        } else {
            None
        };

        Ok(TurnResult {
            text: reply_text,
            image_ref,
            final_scene,
        })
    }

    /// One transition, two sinks: the live handle and the durable record.
    /// The durable mirror is best-effort; a failed write must not kill the
    /// turn while the live path still works.
    async fn set_stage(
        &self,
        execution_id: ExecutionId,
        handle: &ProgressHandle,
        status: ExecutionStatus,
        progress: u8,
        step: &str,
    ) {
        handle.set_stage(status, progress, step).await;
        if let Err(e) = self
            .executions
            .set_stage(execution_id, status, progress, step)
            .await
        {
            tracing::warn!(execution_id = %execution_id, error = %e, "progress mirror write failed");
        }
    }
}
