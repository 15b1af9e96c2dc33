use crate::error::ProviderError;
use serde::Deserialize;
use serde_json::Value;

/// Pull the proposal object out of raw reasoning output.
///
/// Accepts the CLI JSON envelope, Markdown code fences, or prose around a
/// single JSON object.
pub fn parse_response(raw: &str) -> Result<Value, ProviderError> {
    // Claude wraps result in {"result": "...", ...} JSON
    #[derive(Deserialize)]
    struct ClaudeOutput {
        result: String,
    }

    if let Ok(claude_out) = serde_json::from_str::<ClaudeOutput>(raw) {
        if let Some(value) = extract_json(&claude_out.result) {
            return Ok(value);
        }
    }

    extract_json(raw).ok_or_else(|| {
        let preview: String = raw.chars().take(120).collect();
        ProviderError::Malformed(format!("no JSON object in output: {:?}", preview))
    })
}

/// First JSON object in a string that might contain markdown code blocks
fn extract_json(s: &str) -> Option<Value> {
    let trimmed = s.trim();

    // First try: the whole string is a JSON object
    if trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return Some(value);
        }
    }

    // Second try: extract from markdown code block
    let re = regex::Regex::new(r"```(?:json)?\s*\n?([\s\S]*?)\n?```").ok()?;
    for cap in re.captures_iter(s) {
        let Some(block) = cap.get(1) else {
            continue;
        };
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(block.as_str().trim()) {
            return Some(value);
        }
    }

    // Third try: balanced braces from the first '{', skipping string contents
    let brace_start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s[brace_start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let end = brace_start + i + 1;
                    return serde_json::from_str::<Value>(&s[brace_start..end]).ok();
                }
            }
            _ => {}
        }
    }

    None
}
