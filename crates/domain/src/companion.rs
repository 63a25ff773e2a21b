//! Companion profiles and conversations.
//!
//! Profiles are seeded by the character-creation layer (out of scope here);
//! this core only reads them. A conversation owns the durable scene state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CompanionId, ConversationId};
use crate::scene::SceneState;

/// A companion character as the turn engine sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionProfile {
    pub id: CompanionId,
    pub name: String,
    /// System-prompt persona text.
    pub persona: String,
    /// Appearance tag string used as the rendering base.
    pub base_visual: String,
    /// Optional second-person appearance tags, rendered when the user is in frame.
    pub user_appearance: Option<String>,
}

/// One user/companion conversation and its current scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub companion_id: CompanionId,
    pub user_name: String,
    pub scene: SceneState,
    pub created_at: DateTime<Utc>,
}
