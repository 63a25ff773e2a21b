//! Scene continuity analysis.
//!
//! One LLM call plus deterministic repair: extract JSON from whatever came
//! back, reconcile it against the prior scene, and never let a bad model
//! response blank the durable state. Runs twice per turn: once before reply
//! generation (to ground the reply) and once after (the reply may itself
//! change the scene).

mod extract;
mod prompt;
mod reconcile;

pub use extract::extract_json;
pub use reconcile::{clean_fragment, reconcile};

use std::sync::Arc;

use reverie_domain::{ConversationMessage, SceneState, TurnContext};

use crate::infrastructure::ports::{LlmError, LlmPort, LlmRequest};

/// How many history messages are included in the analysis prompt.
const HISTORY_WINDOW: usize = 8;

/// Input for one analysis pass.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub prior: SceneState,
    pub history: Vec<ConversationMessage>,
    pub user_message: String,
    pub companion_name: String,
    pub user_name: String,
    /// Empty on the first pass, the generated reply on the second.
    pub reply_text: String,
}

/// Use case: infer the Turn Context for one analysis pass.
pub struct AnalyzeScene {
    llm: Arc<dyn LlmPort>,
}

impl AnalyzeScene {
    pub fn new(llm: Arc<dyn LlmPort>) -> Self {
        Self { llm }
    }

    /// Transport failures propagate; malformed output does not. A response
    /// that cannot be parsed yields the prior scene unchanged.
    pub async fn execute(&self, request: &AnalyzeRequest) -> Result<TurnContext, LlmError> {
        let system = prompt::analysis_system_prompt(&request.companion_name, &request.user_name);

        let window_start = request.history.len().saturating_sub(HISTORY_WINDOW);
        let user = prompt::analysis_user_prompt(
            &request.prior,
            &request.history[window_start..],
            &request.user_message,
            &request.companion_name,
            &request.user_name,
            &request.reply_text,
        );

        let llm_request = LlmRequest::new(vec![
            crate::infrastructure::ports::ChatMessage::user(user),
        ])
        .with_system_prompt(system)
        .with_temperature(0.2);

        let response = self.llm.generate(llm_request).await?;

        let parsed = extract_json(&response.content);
        if parsed.is_none() {
            tracing::warn!(
                raw_len = response.content.len(),
                "scene analysis produced unparseable output, carrying prior scene forward"
            );
        }

        Ok(reconcile(&request.prior, parsed.as_ref()))
    }
}
