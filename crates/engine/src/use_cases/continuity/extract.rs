//! JSON extraction from noisy model output.
//!
//! Models wrap their JSON in prose, markdown fences, comments, or emit
//! almost-JSON. The pipeline: direct parse, then brace-slice plus sanitize,
//! then give up and return `None` (callers treat that as "no state change").

use serde_json::Value;

/// Extract a JSON object from raw model output, or `None` if unrecoverable.
pub fn extract_json(raw: &str) -> Option<Value> {
    // Fast path: the whole response is valid JSON.
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        if value.is_object() {
            return Some(value);
        }
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }

    let sliced = &raw[start..=end];
    let sanitized = sanitize(sliced);

    serde_json::from_str::<Value>(&sanitized)
        .ok()
        .filter(Value::is_object)
}

/// Repair the almost-JSON failure modes seen in practice.
fn sanitize(input: &str) -> String {
    // Drop line comments before joining lines, then strip control characters.
    let joined: String = input
        .lines()
        .map(strip_line_comment)
        .collect::<Vec<_>>()
        .join(" ");

    let mut cleaned: String = joined
        .chars()
        .filter(|c| !c.is_control())
        .collect();

    cleaned = normalize_bool_literals(&cleaned);
    remove_trailing_commas(&cleaned)
}

/// Strip a `//` comment from a line, ignoring slashes inside string literals.
fn strip_line_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    let bytes = line.as_bytes();

    for i in 0..bytes.len() {
        let c = bytes[i];
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'/' if !in_string && i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                return &line[..i];
            }
            _ => {}
        }
    }

    line
}

/// Lowercase bare TRUE/FALSE/True/False literals outside string values.
fn normalize_bool_literals(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if escaped {
            out.push(c);
            escaped = false;
            i += 1;
            continue;
        }
        match c {
            '\\' if in_string => {
                out.push(c);
                escaped = true;
                i += 1;
            }
            '"' => {
                in_string = !in_string;
                out.push(c);
                i += 1;
            }
            _ if !in_string => {
                let rest: String = chars[i..].iter().take(5).collect();
                if rest.to_ascii_lowercase().starts_with("true")
                    && boundary(chars.get(i + 4))
                {
                    out.push_str("true");
                    i += 4;
                } else if rest.to_ascii_lowercase().starts_with("false")
                    && boundary(chars.get(i + 5))
                {
                    out.push_str("false");
                    i += 5;
                } else {
                    out.push(c);
                    i += 1;
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn boundary(c: Option<&char>) -> bool {
    match c {
        None => true,
        Some(c) => !c.is_alphanumeric() && *c != '_',
    }
}

/// Remove commas that immediately precede a closing brace or bracket.
fn remove_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => {
                out.push(c);
                escaped = true;
            }
            '"' => {
                in_string = !in_string;
                out.push(c);
            }
            '}' | ']' if !in_string => {
                while out.ends_with(|p: char| p.is_whitespace() || p == ',') {
                    let trimmed = out.trim_end().to_string();
                    if trimmed.ends_with(',') {
                        out = trimmed[..trimmed.len() - 1].to_string();
                    } else {
                        out = trimmed;
                        break;
                    }
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_parse_of_clean_json() {
        let value = extract_json(r#"{"outfit": "hoodie", "is_user_present": true}"#).unwrap();
        assert_eq!(value["outfit"], "hoodie");
    }

    #[test]
    fn slices_json_out_of_prose() {
        let raw = "Sure! Here is the analysis:\n{\"outfit\": \"sundress\"}\nLet me know!";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["outfit"], "sundress");
    }

    #[test]
    fn slices_json_out_of_markdown_fence() {
        let raw = "```json\n{\"location\": \"kitchen\"}\n```";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["location"], "kitchen");
    }

    #[test]
    fn survives_embedded_newlines_in_values() {
        let raw = "{\"outfit\": \"hoodie,\n  jeans\"}";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["outfit"], "hoodie,   jeans");
    }

    #[test]
    fn normalizes_uppercase_booleans() {
        let value = extract_json(r#"{"is_user_present": TRUE, "flag": False}"#).unwrap();
        assert_eq!(value["is_user_present"], true);
        assert_eq!(value["flag"], false);
    }

    #[test]
    fn does_not_touch_booleans_inside_strings() {
        let value = extract_json(r#"{"note": "TRUE love"}"#).unwrap();
        assert_eq!(value["note"], "TRUE love");
    }

    #[test]
    fn removes_trailing_commas() {
        let value = extract_json("{\"a\": 1, \"b\": [1, 2,], }").unwrap();
        assert_eq!(value["b"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn strips_line_comments() {
        let raw = "{\n  \"outfit\": \"hoodie\", // she kept it on\n  \"action\": \"sitting\"\n}";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["action"], "sitting");
    }

    #[test]
    fn comment_slashes_inside_strings_survive() {
        let value = extract_json(r#"{"url": "http://example.com"}"#).unwrap();
        assert_eq!(value["url"], "http://example.com");
    }

    #[test]
    fn unrecoverable_garbage_is_none() {
        assert!(extract_json("no json here at all").is_none());
        assert!(extract_json("").is_none());
        assert!(extract_json("} backwards {").is_none());
    }

    #[test]
    fn bare_array_is_rejected() {
        assert!(extract_json("[1, 2, 3]").is_none());
    }
}
