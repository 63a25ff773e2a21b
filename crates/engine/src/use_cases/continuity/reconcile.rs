//! Reconciliation of parsed analysis output against the prior scene.
//!
//! The model is unreliable in specific, known ways: it blanks fields, hedges
//! ("casual clothing"), wraps values in parentheses, or claims failure. Every
//! rule here exists to keep the durable scene from degrading.

use reverie_domain::{SceneState, TurnContext, DEFAULT_EXPRESSION, DEFAULT_LIGHTING};
use serde_json::Value;

/// Hedge answers that must never replace a concrete prior outfit.
const NON_ANSWERS: &[&str] = &[
    "unknown",
    "n/a",
    "na",
    "none",
    "not specified",
    "unspecified",
    "clothing",
    "clothes",
    "casual",
    "casual clothing",
    "casual clothes",
    "outfit",
    "same",
    "same as before",
    "unchanged",
];

/// Strip parenthetical asides, a trailing period, and surrounding whitespace.
pub fn clean_fragment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0u32;

    for c in raw.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }

    let trimmed = out.trim().trim_end_matches('.').trim();
    // Parenthetical removal can leave doubled spaces behind.
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_non_answer(value: &str) -> bool {
    let lowered = value.to_ascii_lowercase();
    NON_ANSWERS.iter().any(|na| lowered == *na)
}

fn string_field(parsed: &Value, key: &str) -> Option<String> {
    parsed
        .get(key)
        .and_then(Value::as_str)
        .map(clean_fragment)
        .filter(|s| !s.is_empty())
}

/// Booleans arrive as bools, strings, or numbers depending on the model's mood.
fn coerce_bool(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => true,
            "false" | "no" | "0" => false,
            _ => default,
        },
        Some(Value::Number(n)) => n.as_i64().map(|v| v != 0).unwrap_or(default),
        _ => default,
    }
}

/// Build a Turn Context from a parse attempt, falling back field-by-field to
/// the prior scene. `None` (extraction failed) carries the prior scene forward
/// wholesale.
pub fn reconcile(prior: &SceneState, parsed: Option<&Value>) -> TurnContext {
    let Some(parsed) = parsed else {
        return TurnContext::carry_forward(prior);
    };

    // Some models report their own failure in-band.
    if parsed
        .get("failed")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return TurnContext::carry_forward(prior);
    }

    let outfit = string_field(parsed, "outfit")
        .filter(|o| !is_non_answer(o))
        .unwrap_or_else(|| prior.outfit.clone());

    let location = string_field(parsed, "location").unwrap_or_else(|| prior.location.clone());

    let action = string_field(parsed, "action").unwrap_or_else(|| prior.action.clone());

    let expression =
        string_field(parsed, "expression").unwrap_or_else(|| DEFAULT_EXPRESSION.to_string());

    let lighting =
        string_field(parsed, "lighting").unwrap_or_else(|| DEFAULT_LIGHTING.to_string());

    let visual_tags = parsed
        .get("visual_tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(clean_fragment)
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let is_user_present = coerce_bool(parsed.get("is_user_present"), true);

    let reasoning = parsed
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    TurnContext {
        outfit,
        location,
        action,
        visual_tags,
        is_user_present,
        expression,
        lighting,
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prior() -> SceneState {
        SceneState::new("hoodie, thong", "bedroom", "lounging on the bed")
    }

    #[test]
    fn failed_extraction_carries_prior_forward() {
        let ctx = reconcile(&prior(), None);
        assert_eq!(ctx.scene_state(), prior());
        assert!(ctx.visual_tags.is_empty());
        assert!(ctx.is_user_present);
        assert_eq!(ctx.expression, DEFAULT_EXPRESSION);
        assert_eq!(ctx.lighting, DEFAULT_LIGHTING);
    }

    #[test]
    fn in_band_failure_flag_carries_prior_forward() {
        let parsed = json!({"failed": true, "outfit": "garbage"});
        let ctx = reconcile(&prior(), Some(&parsed));
        assert_eq!(ctx.scene_state(), prior());
    }

    #[test]
    fn concrete_values_replace_prior() {
        let parsed = json!({
            "outfit": "thong",
            "location": "bedroom",
            "action": "pulling the hoodie over her head",
            "expression": "playful smirk",
            "lighting": "warm lamplight",
            "visual_tags": ["messy hair", "bare shoulders"],
            "is_user_present": true,
            "reasoning": "she removed the hoodie"
        });
        let ctx = reconcile(&prior(), Some(&parsed));
        assert_eq!(ctx.outfit, "thong");
        assert_eq!(ctx.action, "pulling the hoodie over her head");
        assert_eq!(ctx.expression, "playful smirk");
        assert_eq!(ctx.visual_tags, vec!["messy hair", "bare shoulders"]);
    }

    #[test]
    fn empty_action_repeats_prior_action() {
        let parsed = json!({"outfit": "hoodie, thong", "action": ""});
        let ctx = reconcile(&prior(), Some(&parsed));
        assert_eq!(ctx.action, "lounging on the bed");
    }

    #[test]
    fn non_answer_outfit_keeps_prior_outfit() {
        for hedge in ["unknown", "N/A", "casual clothing", "Clothes", "same as before"] {
            let parsed = json!({"outfit": hedge});
            let ctx = reconcile(&prior(), Some(&parsed));
            assert_eq!(ctx.outfit, "hoodie, thong", "hedge was: {hedge}");
        }
    }

    #[test]
    fn outfit_is_cleaned_before_non_answer_check() {
        let parsed = json!({"outfit": "(unknown)."});
        let ctx = reconcile(&prior(), Some(&parsed));
        assert_eq!(ctx.outfit, "hoodie, thong");
    }

    #[test]
    fn clean_fragment_strips_parens_and_trailing_period() {
        assert_eq!(
            clean_fragment("sundress (a light yellow one)."),
            "sundress"
        );
        assert_eq!(clean_fragment("  jeans and a tank top  "), "jeans and a tank top");
        assert_eq!(clean_fragment("(entirely parenthetical)"), "");
    }

    #[test]
    fn missing_expression_and_lighting_use_defaults() {
        let parsed = json!({"outfit": "sundress"});
        let ctx = reconcile(&prior(), Some(&parsed));
        assert_eq!(ctx.expression, DEFAULT_EXPRESSION);
        assert_eq!(ctx.lighting, DEFAULT_LIGHTING);
    }

    #[test]
    fn presence_coercion_accepts_strings_and_numbers() {
        for (value, expected) in [
            (json!({"is_user_present": false}), false),
            (json!({"is_user_present": "false"}), false),
            (json!({"is_user_present": "no"}), false),
            (json!({"is_user_present": "true"}), true),
            (json!({"is_user_present": 0}), false),
            (json!({"is_user_present": 1}), true),
            (json!({"is_user_present": "maybe"}), true),
            (json!({}), true),
        ] {
            let ctx = reconcile(&prior(), Some(&value));
            assert_eq!(ctx.is_user_present, expected, "value was: {value}");
        }
    }
}
