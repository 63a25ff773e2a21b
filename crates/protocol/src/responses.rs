//! Response DTOs (engine to client).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned immediately on turn submission; the turn runs in the background.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTurnResponse {
    pub execution_id: Uuid,
}

/// Snapshot of a turn's progress, from the live execution when reachable,
/// otherwise derived from the Execution Record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub status: String,
    pub progress: u8,
    pub current_step: String,
}

/// Result of finalizing a completed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeTurnResponse {
    pub message_id: Uuid,
    /// True when this call found the turn already finalized and wrote nothing.
    pub already_finalized: bool,
}
