//! Scene state and per-turn inferred context.
//!
//! `SceneState` is the durable outfit/location/action carried forward across turns.
//! `TurnContext` is the ephemeral, per-turn inference that grounds reply generation
//! and rendering; it is never persisted beyond the Execution Record.

use serde::{Deserialize, Serialize};

/// Durable visual situation of a companion within one conversation.
///
/// Invariant: replaced only by a validated new value. A failed or ambiguous
/// inference leaves the prior state untouched; fields are never blanked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneState {
    /// Free-text inventory of what the companion is wearing.
    pub outfit: String,
    pub location: String,
    pub action: String,
}

impl SceneState {
    pub fn new(
        outfit: impl Into<String>,
        location: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            outfit: outfit.into(),
            location: location.into(),
            action: action.into(),
        }
    }

    /// True when any persisted field differs. Drives the conditional
    /// scene-state write at the end of a turn.
    pub fn differs_from(&self, other: &SceneState) -> bool {
        self.outfit != other.outfit || self.location != other.location || self.action != other.action
    }
}

/// Default expression when the model gives none.
pub const DEFAULT_EXPRESSION: &str = "neutral";

/// Default lighting when the model gives none.
pub const DEFAULT_LIGHTING: &str = "cinematic lighting";

/// Ephemeral state inferred for a single turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnContext {
    pub outfit: String,
    pub location: String,
    pub action: String,
    pub visual_tags: Vec<String>,
    pub is_user_present: bool,
    pub expression: String,
    pub lighting: String,
    /// Model-provided rationale, diagnostics only.
    pub reasoning: String,
}

impl TurnContext {
    /// Carry the prior scene forward unchanged, with empty visual tags.
    ///
    /// Used when analysis produces nothing usable: the failure must be
    /// invisible to the rest of the pipeline.
    pub fn carry_forward(prior: &SceneState) -> Self {
        Self {
            outfit: prior.outfit.clone(),
            location: prior.location.clone(),
            action: prior.action.clone(),
            visual_tags: Vec::new(),
            is_user_present: true,
            expression: DEFAULT_EXPRESSION.to_string(),
            lighting: DEFAULT_LIGHTING.to_string(),
            reasoning: String::new(),
        }
    }

    /// Project the persisted subset of this context.
    pub fn scene_state(&self) -> SceneState {
        SceneState {
            outfit: self.outfit.clone(),
            location: self.location.clone(),
            action: self.action.clone(),
        }
    }
}
