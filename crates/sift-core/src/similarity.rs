//! Fuzzy skill matching.
//!
//! A requirement skill matches a profile skill when the best of two
//! ratios clears [`SIMILARITY_THRESHOLD`]: the full-string normalized
//! Levenshtein similarity, and a substring ratio that credits exact
//! containment in proportion to how much of the longer string the
//! shorter one covers. Containment alone is deliberately not enough:
//! "go" inside "golang" scores 50, below the threshold.

use strsim::normalized_levenshtein;

/// Minimum similarity (percent) for a skill to count as matched.
pub const SIMILARITY_THRESHOLD: f64 = 70.0;

/// Full-string similarity as a percentage in `[0, 100]`.
pub fn full_ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b) * 100.0
}

/// Substring similarity: when one string contains the other, the
/// Sørensen–Dice share of the combined length; otherwise 0.
pub fn containment_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    if !long.contains(short) {
        return 0.0;
    }
    let s = short.chars().count() as f64;
    let l = long.chars().count() as f64;
    2.0 * s / (s + l) * 100.0
}

/// Best of full-string and substring ratios, in `[0, 100]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    full_ratio(a, b).max(containment_ratio(a, b))
}

/// Best similarity between `target` and any candidate.
///
/// Ties keep the earliest candidate (strictly-greater comparison), so
/// the result only depends on the candidate order, never on iteration
/// nondeterminism.
pub fn best_match<'a>(target: &str, candidates: &'a [String]) -> Option<(f64, &'a str)> {
    let mut best: Option<(f64, &'a str)> = None;
    for candidate in candidates {
        let ratio = similarity(target, candidate);
        if best.map(|(b, _)| ratio > b).unwrap_or(true) {
            best = Some((ratio, candidate));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings_score_100() {
        assert_eq!(similarity("python", "python"), 100.0);
    }

    #[test]
    fn test_short_prefix_stays_below_threshold() {
        // "go" is contained in "golang" but only covers a third of it.
        let s = similarity("go", "golang");
        assert!((s - 50.0).abs() < 1e-9, "got {s}");
        assert!(s < SIMILARITY_THRESHOLD);

        assert!(similarity("java", "javascript") < SIMILARITY_THRESHOLD);
    }

    #[test]
    fn test_containment_beats_levenshtein_for_long_suffixes() {
        // Full-string distance punishes the extra word; containment
        // recovers it.
        let s = similarity("machine learning", "machine learning engineer");
        assert!(s >= SIMILARITY_THRESHOLD, "got {s}");
    }

    #[test]
    fn test_near_identical_clears_threshold() {
        assert!(similarity("python", "python 3") >= SIMILARITY_THRESHOLD);
        assert!(similarity("postgresql", "postgres") >= SIMILARITY_THRESHOLD);
    }

    #[test]
    fn test_empty_strings() {
        assert_eq!(containment_ratio("", "python"), 0.0);
        assert_eq!(similarity("", ""), 100.0);
    }

    #[test]
    fn test_best_match_is_deterministic_on_ties() {
        let candidates = vec!["rust".to_string(), "rust".to_string()];
        let (ratio, matched) = best_match("rust", &candidates).unwrap();
        assert_eq!(ratio, 100.0);
        assert!(std::ptr::eq(matched, candidates[0].as_str()));
    }

    #[test]
    fn test_best_match_empty_candidates() {
        assert!(best_match("rust", &[]).is_none());
    }
}
