//! Trigram similarity for near-duplicate title detection.
//!
//! Deliberately not a true metric: the denominator uses `max(|A|,|B|)`, so
//! callers should read the score as "how much of the larger string is
//! covered", a one-sided heuristic that works well for title dedup.

use std::collections::HashSet;

/// Bag-of-3-char-substrings overlap in `[0.0, 1.0]`.
/// Lowercases and strips non-alphanumerics first; returns 0 when either
/// trigram set is empty (strings shorter than 3 usable chars).
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    let ta = trigrams(a);
    let tb = trigrams(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let inter = ta.intersection(&tb).count();
    inter as f64 / ta.len().max(tb.len()) as f64
}

fn trigrams(s: &str) -> HashSet<String> {
    let norm: Vec<char> = s
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect();
    norm.windows(3).map(|w| w.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_nonempty_is_one() {
        assert_eq!(trigram_similarity("Phnom Penh Visa", "Phnom Penh Visa"), 1.0);
        // Case and punctuation are normalized away.
        assert_eq!(trigram_similarity("Phnom-Penh visa!", "phnom penh VISA"), 1.0);
    }

    #[test]
    fn empty_or_tiny_is_zero() {
        assert_eq!(trigram_similarity("", "x"), 0.0);
        assert_eq!(trigram_similarity("ab", "ab"), 0.0); // under 3 chars, no trigrams
    }

    #[test]
    fn near_duplicates_score_high() {
        let s = trigram_similarity(
            "Phnom Penh Visa Guide 2025",
            "Phnom Penh Visa Guide for 2025",
        );
        assert!(s > 0.62, "expected near-duplicate score above 0.62, got {s}");
    }

    #[test]
    fn unrelated_titles_score_low() {
        let s = trigram_similarity(
            "Phnom Penh Visa Guide 2025",
            "Best Noodle Shops in Siem Reap",
        );
        assert!(s < 0.2, "expected unrelated score below 0.2, got {s}");
    }
}
