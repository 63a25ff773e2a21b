//! Typed events pushed over the per-turn streaming channel.
//!
//! The relay emits these to exactly one subscriber. The connection closes after
//! `complete` or `error`.
//!
//! ## Versioning Policy
//!
//! - New variants can be added at the end (forward compatible)
//! - Removing or renaming variants is a breaking change

use serde::{Deserialize, Serialize};

/// Scene state as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneStateData {
    pub outfit: String,
    pub location: String,
    pub action: String,
}

/// Events from engine to the streaming subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental reply text.
    Token { text: String },
    /// Progress checkpoint; `status` is the execution status string.
    Progress {
        status: String,
        progress: u8,
        current_step: String,
    },
    /// Terminal success. The turn's permanent message is written separately
    /// by the finalize call.
    Complete {
        text: String,
        image_ref: Option<String>,
        final_scene: SceneStateData,
    },
    /// Terminal failure.
    Error { message: String },
}
