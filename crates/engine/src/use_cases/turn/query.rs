//! Progress query: live registry first, durable record as fallback.

use std::sync::Arc;

use reverie_domain::ExecutionId;

use crate::infrastructure::ports::ExecutionRepo;
use crate::use_cases::turn::progress::{ExecutionRegistry, TurnProgress};
use crate::use_cases::turn::TurnError;

pub struct GetProgress {
    executions: Arc<dyn ExecutionRepo>,
    registry: Arc<ExecutionRegistry>,
}

impl GetProgress {
    pub fn new(executions: Arc<dyn ExecutionRepo>, registry: Arc<ExecutionRegistry>) -> Self {
        Self {
            executions,
            registry,
        }
    }

    pub async fn execute(&self, execution_id: ExecutionId) -> Result<TurnProgress, TurnError> {
        if let Some(handle) = self.registry.get(execution_id) {
            return Ok(handle.snapshot().await);
        }

        let record = self
            .executions
            .get(execution_id)
            .await?
            .ok_or(TurnError::ExecutionNotFound)?;

        Ok(TurnProgress {
            status: record.status,
            progress: record.progress,
            current_step: record.current_step,
            streamed_text: record.streamed_text,
        })
    }
}
