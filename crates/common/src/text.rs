//! Bounded text helpers.

/// Truncates `text` to at most `max_chars` characters, respecting UTF-8
/// boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(truncate_chars("timeout", 500), "timeout");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn long_text_is_cut_at_char_boundary() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("€€€€", 2), "€€");
        assert_eq!(truncate_chars(&"x".repeat(600), 500).len(), 500);
    }
}
