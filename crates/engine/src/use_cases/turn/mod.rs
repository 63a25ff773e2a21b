//! Turn orchestration: submission, the step state machine, progress query,
//! and finalization.

mod finalize;
mod progress;
mod query;
mod run_turn;
mod submit;

#[cfg(test)]
mod orchestrator_tests;

pub use finalize::{FinalizeTurn, Finalized};
pub use progress::{ExecutionRegistry, ProgressHandle, TurnProgress};
pub use query::GetProgress;
pub use run_turn::{RunTurn, RunTurnCommand};
pub use submit::SubmitTurn;

use reverie_domain::ExecutionId;

use crate::infrastructure::ports::{LlmError, RepoError};
use crate::use_cases::imaging::RenderError;

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("Conversation not found")]
    ConversationNotFound,
    #[error("Execution not found")]
    ExecutionNotFound,
    #[error("A turn is already running for this conversation: {0}")]
    TurnAlreadyActive(ExecutionId),
    #[error("Execution has not completed")]
    NotCompleted,
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}
