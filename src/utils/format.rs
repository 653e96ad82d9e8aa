// === UTF-8 safe string helpers ===

/// Round a byte index down to the nearest char boundary
pub fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Shorten a string to at most max_chars characters, appending an ellipsis
/// when anything was cut. Used for console log previews.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max_chars).collect();
    format!("{}…", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_char_boundary() {
        let s = "a한b";
        assert_eq!(floor_char_boundary(s, 0), 0);
        assert_eq!(floor_char_boundary(s, 1), 1);
        assert_eq!(floor_char_boundary(s, 2), 1); // inside the 3-byte char
        assert_eq!(floor_char_boundary(s, 3), 1);
        assert_eq!(floor_char_boundary(s, 4), 4);
        assert_eq!(floor_char_boundary(s, 100), s.len());
    }

    #[test]
    fn test_truncate_str_short_input_unchanged() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("exact", 5), "exact");
    }

    #[test]
    fn test_truncate_str_cuts_on_chars() {
        assert_eq!(truncate_str("abcdefgh", 3), "abc…");
        assert_eq!(truncate_str("한국어 텍스트", 3), "한국어…");
    }
}
