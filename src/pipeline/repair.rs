//! Cleanup and repair of model-emitted JSON text.
//!
//! Vision models asked for "only valid JSON" still wrap output in Markdown
//! fences, and long invoices get truncated mid-structure when they hit the
//! generation cap. Rather than nested string surgery, [`repair_truncated`]
//! is a small state-tracking scanner: it walks the text once, tracking
//! string/escape state and the stack of open containers, then emits exactly
//! the closers needed — so the output is always syntactically closed JSON
//! whenever the input was a truncated prefix of valid JSON.

use tracing::debug;

/// Strip Markdown code fences and, if the text looks truncated, repair it.
///
/// Mirrors the observable contract of the extraction endpoint: the returned
/// string is what gets handed to the JSON parser. Text already ending in a
/// closing brace is passed through untouched.
pub fn clean_response(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(stripped) = text.strip_prefix("```json") {
        text = stripped;
    } else if let Some(stripped) = text.strip_prefix("```") {
        text = stripped;
    }
    if let Some(stripped) = text.strip_suffix("```") {
        text = stripped;
    }
    let text = text.trim();

    if text.ends_with('}') {
        return text.to_string();
    }
    repair_truncated(text)
}

/// Close a truncated JSON prefix.
///
/// Trailing separators and whitespace are dropped, an unterminated string is
/// closed, and the open-container stack is unwound in nesting order. The
/// result balances `{`/`}` and `[`/`]` counts exactly (counted outside
/// string literals).
pub fn repair_truncated(text: &str) -> String {
    let mut repaired = text
        .trim_end_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string();

    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in repaired.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => stack.push(c),
            '}' => {
                if stack.last() == Some(&'{') {
                    stack.pop();
                }
            }
            ']' => {
                if stack.last() == Some(&'[') {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    if in_string {
        repaired.push('"');
    }

    let closers = stack.len();
    while let Some(open) = stack.pop() {
        repaired.push(if open == '{' { '}' } else { ']' });
    }

    if closers > 0 {
        debug!("Repaired truncated JSON: appended {} closer(s)", closers);
    }
    repaired
}
