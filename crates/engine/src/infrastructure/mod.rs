//! Infrastructure adapters: external services, persistence, retry, clock.

pub mod assets;
pub mod clock;
pub mod comfyui;
pub mod ollama;
pub mod ports;
pub mod retry;
pub mod sqlite;

pub use assets::FsAssetStore;
pub use clock::SystemClock;
pub use comfyui::ComfyUIClient;
pub use ollama::OllamaClient;
pub use retry::{with_backoff, RetryConfig};
pub use sqlite::{SqliteConversationRepo, SqliteExecutionRepo};
