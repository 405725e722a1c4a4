//! Rune-safe snippet extraction for the CJK / non-tokenizable LIKE fallback.

/// Builds a `±radius`-rune window around the first case-insensitive
/// occurrence of `query` in `content`, with ellipses where truncated.
/// Operates on `char` boundaries throughout, so it never splits a
/// multibyte codepoint. `radius` is normally
/// [`cortex_core::config::RetrievalConfig::fallback_snippet_radius`].
pub fn rune_safe_snippet(content: &str, query: &str, radius: usize) -> String {
    let chars: Vec<char> = content.chars().collect();
    let content_lower = content.to_lowercase();
    let query_lower = query.to_lowercase();

    let match_char_start = match content_lower.find(&query_lower) {
        Some(byte_idx) => content_lower[..byte_idx].chars().count(),
        None => 0,
    };

    let start = match_char_start.saturating_sub(radius);
    let end = (match_char_start + query.chars().count() + radius).min(chars.len());

    let mut snippet: String = chars[start..end].iter().collect();
    if start > 0 {
        snippet = format!("...{snippet}");
    }
    if end < chars.len() {
        snippet.push_str("...");
    }
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_of_short_content_is_unchanged() {
        let s = rune_safe_snippet("short content", "short", 60);
        assert_eq!(s, "short content");
    }

    #[test]
    fn snippet_truncates_with_ellipses_on_both_sides() {
        let content = "a".repeat(200) + "needle" + &"b".repeat(200);
        let s = rune_safe_snippet(&content, "needle", 60);
        assert!(s.starts_with("..."));
        assert!(s.ends_with("..."));
        assert!(s.contains("needle"));
    }

    #[test]
    fn snippet_never_splits_multibyte_codepoints() {
        let content = "\u{4f60}\u{597d}".repeat(100) + "target" + &"\u{4e16}\u{754c}".repeat(100);
        let s = rune_safe_snippet(&content, "target", 60);
        assert!(s.contains("target"));
        // Round-tripping through `chars()` means every codepoint survives intact.
        assert!(s.chars().all(|c| c != '\u{fffd}'));
    }

    #[test]
    fn no_match_snippets_from_the_start() {
        let content = "a".repeat(300);
        let s = rune_safe_snippet(&content, "zzz", 60);
        assert!(s.starts_with('a'));
        assert!(s.ends_with("..."));
    }
}
