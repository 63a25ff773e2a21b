//! Error types for infrastructure ports.

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("Not found")]
    NotFound,
    #[error("Database error in {0}: {1}")]
    Database(String, String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepoError {
    /// Wrap a database-layer error with the store it came from.
    pub fn database(store: &str, err: impl std::fmt::Display) -> Self {
        Self::Database(store.to_string(), err.to_string())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Stream error: {0}")]
    Stream(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ImageGenError {
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
    #[error("Service unavailable")]
    Unavailable,
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Asset store error: {0}")]
    Store(String),
}
