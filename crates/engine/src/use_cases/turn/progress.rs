//! Live, queryable progress for in-flight executions.
//!
//! Each running turn owns one `ProgressHandle`; the orchestrator is the only
//! writer, the progress query and the relay read it. The registry maps
//! execution ids to handles for the lifetime of the turn.

use std::sync::Arc;

use dashmap::DashMap;
use reverie_domain::{ExecutionId, ExecutionStatus};
use tokio::sync::RwLock;

/// Snapshot of one execution's live progress.
#[derive(Debug, Clone)]
pub struct TurnProgress {
    pub status: ExecutionStatus,
    pub progress: u8,
    pub current_step: String,
    /// Mirrors the durable `streamed_text`, but updated per token rather than
    /// per flush, so the live path has lower latency than the polled one.
    pub streamed_text: String,
}

impl TurnProgress {
    fn queued() -> Self {
        Self {
            status: ExecutionStatus::Started,
            progress: 0,
            current_step: "queued".to_string(),
            streamed_text: String::new(),
        }
    }
}

impl Default for TurnProgress {
    fn default() -> Self {
        Self::queued()
    }
}

/// Shared handle to one execution's live progress.
#[derive(Clone)]
pub struct ProgressHandle {
    inner: Arc<RwLock<TurnProgress>>,
}

impl Default for ProgressHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(TurnProgress::queued())),
        }
    }

    pub async fn snapshot(&self) -> TurnProgress {
        self.inner.read().await.clone()
    }

    pub async fn set_stage(&self, status: ExecutionStatus, progress: u8, current_step: &str) {
        let mut state = self.inner.write().await;
        state.status = status;
        state.progress = progress;
        state.current_step = current_step.to_string();
    }

    pub async fn append_text(&self, chunk: &str) {
        self.inner.write().await.streamed_text.push_str(chunk);
    }

    /// Discard text mirrored by an aborted reply attempt.
    pub async fn reset_text(&self) {
        self.inner.write().await.streamed_text.clear();
    }
}

/// Registry of live executions, keyed by execution id.
#[derive(Default)]
pub struct ExecutionRegistry {
    handles: DashMap<ExecutionId, ProgressHandle>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: ExecutionId) -> ProgressHandle {
        let handle = ProgressHandle::new();
        self.handles.insert(id, handle.clone());
        handle
    }

    pub fn get(&self, id: ExecutionId) -> Option<ProgressHandle> {
        self.handles.get(&id).map(|entry| entry.clone())
    }

    /// Remove the handle once the turn is terminal. Later queries fall back
    /// to the Execution Record.
    pub fn deregister(&self, id: ExecutionId) {
        self.handles.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_round_trips_handles() {
        let registry = ExecutionRegistry::new();
        let id = ExecutionId::new();

        let handle = registry.register(id);
        handle
            .set_stage(ExecutionStatus::Responding, 30, "generating reply")
            .await;
        handle.append_text("Hel").await;
        handle.append_text("lo").await;

        let snapshot = registry.get(id).unwrap().snapshot().await;
        assert_eq!(snapshot.status, ExecutionStatus::Responding);
        assert_eq!(snapshot.progress, 30);
        assert_eq!(snapshot.streamed_text, "Hello");

        registry.deregister(id);
        assert!(registry.get(id).is_none());
    }
}
