//! Request DTOs (client to engine).

use serde::{Deserialize, Serialize};

/// Submit one conversational turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTurnRequest {
    pub message: String,
    /// Render an image for this turn after the reply.
    #[serde(default)]
    pub generate_image: bool,
}
