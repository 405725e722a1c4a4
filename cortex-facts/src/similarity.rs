//! Object-string similarity and subject/predicate grouping keys for dedup.

use std::collections::HashSet;

/// Lowercases, trims, and collapses `-`, `_`, `/`, and whitespace runs to a
/// single space, keeping only letters and digits. Used to group facts by
/// `(subject, predicate)` regardless of surface formatting.
pub fn normalize_group_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_sep = false;
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push(' ');
            }
            pending_sep = false;
            out.extend(ch.to_lowercase());
        } else if matches!(ch, '-' | '_' | '/') || ch.is_whitespace() {
            pending_sep = true;
        }
    }
    out
}

/// Jaccard index over lowercased whitespace-split tokens.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let a_tokens: HashSet<&str> = a_lower.split_whitespace().collect();
    let b_tokens: HashSet<&str> = b_lower.split_whitespace().collect();

    if a_tokens.is_empty() && b_tokens.is_empty() {
        return 1.0;
    }

    let intersection = a_tokens.intersection(&b_tokens).count() as f64;
    let union = a_tokens.union(&b_tokens).count() as f64;

    if union < f64::EPSILON {
        0.0
    } else {
        intersection / union
    }
}

/// Levenshtein edit distance normalized by the longer string's length, in `[0, 1]`.
pub fn normalized_levenshtein(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let max_len = a_chars.len().max(b_chars.len());
    if max_len == 0 {
        return 0.0;
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut cur = vec![0usize; b_chars.len() + 1];

    for (i, ca) in a_chars.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            cur[j + 1] = (cur[j] + 1).min(prev[j + 1] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[b_chars.len()] as f64 / max_len as f64
}

/// `max(token_jaccard, 1 - normalized_levenshtein)` over two fact object strings.
pub fn object_similarity(a: &str, b: &str) -> f64 {
    token_jaccard(a, b).max(1.0 - normalized_levenshtein(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_separators_and_case() {
        assert_eq!(normalize_group_key("User_Name-Pref/erence"), "user name pref erence");
        assert_eq!(normalize_group_key("  lives   in  "), "lives in");
    }

    #[test]
    fn jaccard_identical_strings_is_one() {
        assert_eq!(token_jaccard("Philadelphia PA", "philadelphia pa"), 1.0);
    }

    #[test]
    fn jaccard_both_empty_is_one() {
        assert_eq!(token_jaccard("", ""), 1.0);
    }

    #[test]
    fn levenshtein_identical_is_zero() {
        assert_eq!(normalized_levenshtein("hello", "hello"), 0.0);
    }

    #[test]
    fn levenshtein_empty_vs_empty_is_zero() {
        assert_eq!(normalized_levenshtein("", ""), 0.0);
    }

    #[test]
    fn object_similarity_favors_near_miss_typo() {
        // Low token overlap (different word entirely) but near-identical chars.
        let sim = object_similarity("Philadelphia", "Philadelphi");
        assert!(sim > 0.9, "expected high similarity from levenshtein, got {sim}");
    }
}
