/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Strip a markdown code fence (with or without a language tag) from a response.
///
/// Returns `None` when the text does not open with a fence.
pub fn strip_code_fence(response: &str) -> Option<&str> {
    let body = response.trim().strip_prefix("```")?;
    let body = body.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    let body = body.trim();
    Some(body.strip_suffix("```").unwrap_or(body).trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_to_char_boundary() {
        let text = "Hello 世界";
        let truncated = truncate_to_char_boundary(text, 8);
        assert!(truncated.len() <= 8);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn test_truncate_within_bounds() {
        let text = "Hello";
        assert_eq!(truncate_to_char_boundary(text, 100), "Hello");
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), Some("{}"));
        assert_eq!(strip_code_fence("```\n{}\n```"), Some("{}"));
        assert_eq!(strip_code_fence("```JSON {\"a\": 1}```"), Some("{\"a\": 1}"));
        assert_eq!(strip_code_fence("{}"), None);
    }

    #[test]
    fn test_strip_code_fence_without_closing_marker() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}"), Some("{\"a\": 1}"));
    }
}
