//! Scoring functions for album matching.
//!
//! This module contains:
//! - Score thresholds shared by the matcher and selector
//! - Character-level similarity (`ratio`, Indel based)
//! - Token-based similarity (`token_sort_ratio`, `token_set_ratio`)
//!
//! All scores are in `[0, 100]`. Inputs are expected to be normalized text.

use rapidfuzz::distance::indel;
use rustc_hash::FxHashSet;

// ============================================================================
// Score Thresholds
// ============================================================================

/// Default minimum score to accept a match
pub const DEFAULT_SCORE_CUTOFF: i32 = 85;

/// Strong artist gate: token_set_ratio floor
pub const ARTIST_SET_GATE: f64 = 85.0;

/// Strong artist gate: token_sort_ratio floor
pub const ARTIST_SORT_GATE: f64 = 90.0;

/// Album score required by the alias / collaboration / duo rules
pub const STRONG_ALBUM_SCORE: f64 = 95.0;

/// No-space floor for the album gate, before the cutoff adjustment
pub const ALBUM_NO_SPACE_FLOOR: f64 = 85.0;

/// No-space album score required by the single-token guard
pub const SELF_TITLED_NO_SPACE: f64 = 99.0;

/// Artist and album floor for the compound-title fallbacks
pub const FALLBACK_GATE: f64 = 90.0;

/// Score assigned to fallback matches
pub const FALLBACK_SCORE: f64 = 90.0;

/// Score assigned to a segment fallback whose raw title carries the target year
pub const FALLBACK_YEAR_SCORE: f64 = 92.0;

// ============================================================================
// Character Similarity
// ============================================================================

/// Character-level similarity: `100 * (1 - indel_distance / (len_a + len_b))`.
/// Two empty strings are identical; one empty string scores zero.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    indel::normalized_similarity(a.chars(), b.chars()) * 100.0
}

// ============================================================================
// Token Similarity
// ============================================================================

fn sorted_tokens(s: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens
}

/// Similarity of the sorted token sequences (order-insensitive).
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a).join(" "), &sorted_tokens(b).join(" "))
}

/// Order- and duplicate-insensitive token overlap.
///
/// A full subset on either side scores 100. Otherwise the best of
/// `intersection` vs `intersection + rest` comparisons is returned.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let set_a: FxHashSet<&str> = a.split_whitespace().collect();
    let set_b: FxHashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let mut common: Vec<&str> = set_a.intersection(&set_b).copied().collect();
    let mut only_a: Vec<&str> = set_a.difference(&set_b).copied().collect();
    let mut only_b: Vec<&str> = set_b.difference(&set_a).copied().collect();
    common.sort_unstable();
    only_a.sort_unstable();
    only_b.sort_unstable();

    if !common.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100.0;
    }

    let sect = common.join(" ");
    let with_a = join_nonempty(&sect, &only_a.join(" "));
    let with_b = join_nonempty(&sect, &only_b.join(" "));

    ratio(&sect, &with_a)
        .max(ratio(&sect, &with_b))
        .max(ratio(&with_a, &with_b))
}

fn join_nonempty(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{} {}", head, tail),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_ratio() {
        assert!(approx(ratio("genesis", "genesis"), 100.0));
        assert!(approx(ratio("", ""), 100.0));
        assert!(approx(ratio("abc", ""), 0.0));
        // 2 * 4 / (4 + 13)
        assert!(approx(ratio("1914", "1914revisited"), 800.0 / 17.0));
    }

    #[test]
    fn test_token_sort_ratio_ignores_order() {
        assert!(approx(token_sort_ratio("hall and oates", "oates and hall"), 100.0));
        assert!(token_sort_ratio("yes", "yes band") < ARTIST_SORT_GATE);
    }

    #[test]
    fn test_token_set_ratio_subset_is_full_score() {
        assert!(approx(token_set_ratio("1914", "1914 revisited"), 100.0));
        assert!(approx(token_set_ratio("enid", "enid enid"), 100.0));
    }

    #[test]
    fn test_token_set_ratio_partial_overlap() {
        let score = token_set_ratio("color humano", "color mundo");
        assert!(score > 0.0 && score < 100.0);
        assert!(approx(token_set_ratio("abc", "xyz"), 0.0));
        assert!(approx(token_set_ratio("", "xyz"), 0.0));
    }

    #[test]
    fn test_token_set_ratio_disjoint_falls_back_to_ratio() {
        let score = token_set_ratio("strangewings", "strange wings");
        assert!(approx(score, ratio("strangewings", "strange wings")));
        assert!(score > 90.0);
    }
}
