//! Recovering JSON payloads from free-form model output.

/// Return the first balanced `{...}` object in `text`.
///
/// Scanning starts at the first `{`. Braces inside string literals (including
/// escaped quotes) do not count towards nesting depth.
pub fn extract_first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Strip a Markdown code fence wrapping the whole text, if any
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening line
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Drop the first and last line of a response.
///
/// With exactly two lines only the second is kept; shorter text is returned
/// unchanged.
pub fn trim_outer_lines(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    match lines.len() {
        n if n > 2 => lines[1..n - 1].join("\n"),
        2 => lines[1].to_string(),
        _ => text.to_string(),
    }
}
