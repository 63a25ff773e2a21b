//! Prompt assembly for scene analysis.

use reverie_domain::{ConversationMessage, MessageRole, SceneState};

/// System instructions for the analysis call. The remote-interaction policy
/// (texting, video calls, "on my way" mean the user is NOT present) lives in
/// this text and is trusted, not re-validated in code.
pub fn analysis_system_prompt(companion_name: &str, user_name: &str) -> String {
    format!(
        r#"You are a scene continuity tracker for a roleplay conversation between {companion_name} (the character) and {user_name} (the user).

Given the current scene and the latest exchange, output the character's updated visual state as a single JSON object with exactly these keys:

{{
  "outfit": "complete inventory of what {companion_name} is wearing right now, comma separated",
  "location": "where {companion_name} physically is",
  "action": "what {companion_name} is physically doing",
  "expression": "{companion_name}'s facial expression",
  "lighting": "the scene's lighting",
  "visual_tags": ["short", "visual", "details"],
  "is_user_present": true,
  "reasoning": "one sentence explaining any change"
}}

Rules:
- The outfit is an inventory. If a garment is removed, delete it from the list; keep everything else. If one is added, append it.
- Describe concretely. Never answer "unknown", "casual clothing", or "same as before".
- If nothing changed, repeat the previous value exactly.
- is_user_present is false when the interaction is remote: texting, phone or video call, or either party is described as away, on their way, or not in the room.
- Output ONLY the JSON object. No prose, no markdown."#
    )
}

/// User-role message carrying the scene snapshot and transcript.
///
/// `reply_text` is empty on the first pass; on the second pass it is the
/// freshly generated reply, appended as a character line so removals and
/// moves the reply itself describes are visible to the analysis.
pub fn analysis_user_prompt(
    prior: &SceneState,
    history: &[ConversationMessage],
    user_message: &str,
    companion_name: &str,
    user_name: &str,
    reply_text: &str,
) -> String {
    let mut prompt = format!(
        "Current scene:\n- outfit: {}\n- location: {}\n- action: {}\n\nRecent conversation:\n",
        prior.outfit, prior.location, prior.action
    );

    for message in history {
        let speaker = match message.role {
            MessageRole::User => user_name,
            MessageRole::Assistant => companion_name,
        };
        prompt.push_str(&format!("{speaker}: {}\n", message.content));
    }

    prompt.push_str(&format!("{user_name}: {user_message}\n"));

    if !reply_text.is_empty() {
        prompt.push_str(&format!("{companion_name}: {reply_text}\n"));
    }

    prompt.push_str("\nOutput the updated state JSON now.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use reverie_domain::ConversationId;

    #[test]
    fn reply_text_appears_as_companion_line_on_second_pass() {
        let prior = SceneState::new("hoodie", "bedroom", "sitting");
        let prompt = analysis_user_prompt(&prior, &[], "take it off", "Mira", "Alex", "I slip it off");
        assert!(prompt.contains("Alex: take it off"));
        assert!(prompt.contains("Mira: I slip it off"));
    }

    #[test]
    fn first_pass_omits_reply_line() {
        let prior = SceneState::new("hoodie", "bedroom", "sitting");
        let prompt = analysis_user_prompt(&prior, &[], "hey", "Mira", "Alex", "");
        assert!(!prompt.contains("Mira:"));
    }

    #[test]
    fn history_is_attributed_by_role() {
        let prior = SceneState::new("hoodie", "bedroom", "sitting");
        let convo = ConversationId::new();
        let history = vec![
            ConversationMessage::user(convo, "how are you?", Utc::now()),
            ConversationMessage::assistant(convo, "cozy!", None, Utc::now()),
        ];
        let prompt = analysis_user_prompt(&prior, &history, "good", "Mira", "Alex", "");
        assert!(prompt.contains("Alex: how are you?"));
        assert!(prompt.contains("Mira: cozy!"));
    }
}
