//! Reverie Engine library.
//!
//! Server-side turn orchestration for companion conversations.
//!
//! ## Structure
//!
//! - `use_cases/` - Turn orchestration, continuity analysis, reply generation, rendering
//! - `infrastructure/` - Port traits plus Ollama, ComfyUI, SQLite, and filesystem adapters
//! - `api/` - HTTP entry points and the WebSocket streaming relay
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod use_cases;

/// Shared in-memory fakes for use case tests.
#[cfg(test)]
pub mod test_fixtures;

pub use app::App;
