//! Rendering prompt assembly from the final Turn Context.

use reverie_domain::{CompanionProfile, TurnContext};

use super::keywords::{contains_any, EXPLICIT, OUTERWEAR, REMOTE_INDICATORS, UNDERWEAR};

const QUALITY_TAGS: &str = "masterpiece, best quality, highly detailed";

const NEGATIVE_BASE: &str =
    "lowres, bad anatomy, bad hands, extra digits, missing fingers, worst quality, \
     jpeg artifacts, watermark, signature, text";

/// Positive and negative prompt pair for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPrompt {
    pub positive: String,
    pub negative: String,
}

/// Scene explicitness, tested against outfit + tags + location.
pub fn is_explicit(context: &TurnContext) -> bool {
    contains_any(&context.outfit, EXPLICIT)
        || contains_any(&context.location, EXPLICIT)
        || context.visual_tags.iter().any(|t| contains_any(t, EXPLICIT))
}

/// Drop underwear segments from an outfit occluded by outerwear.
///
/// Applied only to non-explicit scenes; explicit scenes keep every garment
/// the model listed.
pub fn apply_layering_filter(outfit: &str, explicit: bool) -> String {
    if explicit || !contains_any(outfit, OUTERWEAR) {
        return outfit.to_string();
    }

    let kept: Vec<&str> = outfit
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && !contains_any(segment, UNDERWEAR))
        .collect();

    if kept.is_empty() {
        // Every segment was underwear; keep the original rather than render nothing.
        outfit.to_string()
    } else {
        kept.join(", ")
    }
}

/// Solo composition is forced when the scene reads as a selfie, POV shot, or
/// any remote framing, regardless of what the analysis claimed.
pub fn forces_solo(context: &TurnContext) -> bool {
    contains_any(&context.action, REMOTE_INDICATORS)
        || contains_any(&context.location, REMOTE_INDICATORS)
        || context
            .visual_tags
            .iter()
            .any(|t| contains_any(t, REMOTE_INDICATORS))
}

/// Build the full prompt pair for the final Turn Context.
pub fn build_prompt(companion: &CompanionProfile, context: &TurnContext) -> RenderPrompt {
    let explicit = is_explicit(context);
    let solo = !context.is_user_present || forces_solo(context);
    let outfit = apply_layering_filter(&context.outfit, explicit);

    let mut positive: Vec<String> = vec![QUALITY_TAGS.to_string()];

    if solo {
        positive.push("solo, 1girl".to_string());
    } else {
        positive.push("couple, 1girl, 1boy".to_string());
        if let Some(user_appearance) = &companion.user_appearance {
            positive.push(user_appearance.clone());
        }
    }

    positive.push(companion.base_visual.clone());
    positive.push(format!("wearing {outfit}"));
    positive.push(context.location.clone());
    positive.push(context.action.clone());
    positive.push(context.expression.clone());
    positive.push(context.lighting.clone());
    positive.extend(context.visual_tags.iter().cloned());

    let mut negative: Vec<&str> = vec![NEGATIVE_BASE];
    if solo {
        negative.push("multiple people, two people, crowd");
    }
    if !explicit {
        negative.push("nude, nudity, nsfw, exposed");
    }

    RenderPrompt {
        positive: positive
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        negative: negative.join(", "),
    }
}
