//! Streaming reply generation.

mod flush;
mod post;

pub use flush::FlushPolicy;
pub use post::postprocess;

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::time::Instant;

use reverie_domain::{
    CompanionProfile, ConversationMessage, ExecutionId, MessageRole, TurnContext,
};

use crate::infrastructure::ports::{
    ChatMessage, ExecutionRepo, LlmError, LlmPort, LlmRequest,
};
use crate::use_cases::turn::ProgressHandle;

/// Input for one reply generation.
pub struct ReplyRequest {
    pub companion: CompanionProfile,
    pub user_message: String,
    pub history: Vec<ConversationMessage>,
    pub context: TurnContext,
    pub user_name: String,
    /// When set, streamed text is mirrored into the Execution Record.
    pub execution_id: Option<ExecutionId>,
    /// When set, every token is appended to the live progress snapshot.
    pub progress: Option<ProgressHandle>,
}

/// Use case: generate the companion's reply, streaming tokens as they arrive.
pub struct GenerateReply {
    llm: Arc<dyn LlmPort>,
    executions: Arc<dyn ExecutionRepo>,
    policy: FlushPolicy,
}

impl GenerateReply {
    pub fn new(llm: Arc<dyn LlmPort>, executions: Arc<dyn ExecutionRepo>) -> Self {
        Self {
            llm,
            executions,
            policy: FlushPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FlushPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the cleaned final reply text.
    ///
    /// A stream error is a hard failure for the step; there is no fallback
    /// text. Durable flush failures are logged and skipped, the stream keeps
    /// going.
    pub async fn execute(&self, request: &ReplyRequest) -> Result<String, LlmError> {
        let system = build_system_prompt(request);

        let mut messages: Vec<ChatMessage> = request
            .history
            .iter()
            .map(|m| match m.role {
                MessageRole::User => ChatMessage::user(m.content.clone()),
                MessageRole::Assistant => ChatMessage::assistant(m.content.clone()),
            })
            .collect();
        messages.push(ChatMessage::user(request.user_message.clone()));

        let llm_request = LlmRequest::new(messages)
            .with_system_prompt(system)
            .with_temperature(0.8);

        // Each attempt owns both sinks from an empty start: text mirrored by
        // an aborted earlier attempt would otherwise be appended twice.
        if let Some(handle) = &request.progress {
            handle.reset_text().await;
        }
        if let Some(id) = request.execution_id {
            if let Err(e) = self.executions.reset_streamed_text(id).await {
                tracing::warn!(execution_id = %id, error = %e, "streamed text reset failed");
            }
        }

        let mut stream = self.llm.generate_stream(llm_request).await?;

        let mut full_text = String::new();
        let mut pending = String::new();
        let mut last_flush = Instant::now();

        while let Some(item) = stream.next().await {
            let chunk = item?;

            full_text.push_str(&chunk);
            pending.push_str(&chunk);

            if let Some(handle) = &request.progress {
                handle.append_text(&chunk).await;
            }

            if self
                .policy
                .should_flush(last_flush.elapsed(), pending.len())
            {
                self.flush(request.execution_id, &mut pending).await;
                last_flush = Instant::now();
            }
        }

        // Capture whatever accumulated after the last timed flush.
        self.flush(request.execution_id, &mut pending).await;

        Ok(postprocess(&full_text))
    }

    async fn flush(&self, execution_id: Option<ExecutionId>, pending: &mut String) {
        if pending.is_empty() {
            return;
        }
        let Some(id) = execution_id else {
            pending.clear();
            return;
        };

        if let Err(e) = self.executions.append_streamed_text(id, pending).await {
            tracing::warn!(execution_id = %id, error = %e, "streamed text flush failed");
        }
        pending.clear();
    }
}

fn build_system_prompt(request: &ReplyRequest) -> String {
    let companion = &request.companion;
    let ctx = &request.context;

    let presence = if ctx.is_user_present {
        format!("{} is physically present with you.", request.user_name)
    } else {
        format!(
            "{} is NOT physically present; you are interacting remotely.",
            request.user_name
        )
    };

    format!(
        r#"You are {name}. {persona}

Current scene:
- You are wearing: {outfit}
- You are at: {location}
- You are: {action}
- {presence}

Stay in character as {name} talking to {user_name}. Reply with spoken dialogue only: no stage directions, no parentheses, no JSON, no narration."#,
        name = companion.name,
        persona = companion.persona,
        outfit = ctx.outfit,
        location = ctx.location,
        action = ctx.action,
        presence = presence,
        user_name = request.user_name,
    )
}
