//! Reply post-processing.
//!
//! The finished reply must contain only spoken dialogue. Models echo scene
//! JSON, fence it in markdown, or add parenthetical stage directions; all of
//! that is stripped here.

/// Clean the completed reply text.
pub fn postprocess(raw: &str) -> String {
    let without_fences = strip_fenced_blocks(raw);
    let without_json = strip_trailing_bare_json(&without_fences);
    let without_directions = strip_parentheticals(&without_json);
    collapse_whitespace(&without_directions)
}

/// Remove ``` fenced blocks entirely, keeping surrounding prose.
fn strip_fenced_blocks(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("```") {
        out.push_str(&rest[..open]);
        match rest[open + 3..].find("```") {
            Some(close) => rest = &rest[open + 3 + close + 3..],
            None => {
                // Unterminated fence: drop everything after it.
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Drop a bare JSON object echoed at the end of the reply.
fn strip_trailing_bare_json(input: &str) -> String {
    let trimmed = input.trim_end();
    if !trimmed.ends_with('}') {
        return input.to_string();
    }

    // Scan backwards for the matching opening brace.
    let mut depth = 0i32;
    for (i, c) in trimmed.char_indices().rev() {
        match c {
            '}' => depth += 1,
            '{' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &trimmed[i..];
                    if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                        return trimmed[..i].to_string();
                    }
                    return input.to_string();
                }
            }
            _ => {}
        }
    }

    input.to_string()
}

/// Remove parenthetical stage directions, tracking nesting depth.
fn strip_parentheticals(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut depth = 0u32;

    for c in input.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }

    out
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
