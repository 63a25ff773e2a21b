//! Keyword sets driving prompt assembly decisions.

/// Outer layers assumed to occlude underwear.
pub const OUTERWEAR: &[&str] = &[
    "jacket", "hoodie", "coat", "sweater", "cardigan", "dress", "sundress", "gown", "shirt",
    "t-shirt", "blouse", "top", "pants", "jeans", "skirt", "shorts", "leggings", "overalls",
    "robe", "kimono", "uniform", "suit",
];

/// Garments hidden by an outer layer.
pub const UNDERWEAR: &[&str] = &[
    "thong", "panties", "underwear", "bra", "lingerie", "briefs", "boxers", "g-string",
    "garter", "stockings",
];

/// Exposure terms marking a scene explicit.
pub const EXPLICIT: &[&str] = &[
    "nude", "naked", "topless", "bottomless", "undressed", "exposed", "bare chest",
    "bare breasts", "stripping", "underwear only", "lingerie only", "nothing else",
];

/// Virtual/remote framing indicators that force solo composition.
pub const REMOTE_INDICATORS: &[&str] = &[
    "pov", "selfie", "camera", "mirror", "from above", "phone", "video call", "webcam",
    "screen", "facetime",
];

/// Case-insensitive substring test against a keyword set.
pub fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lowered = text.to_ascii_lowercase();
    keywords.iter().any(|k| lowered.contains(k))
}
