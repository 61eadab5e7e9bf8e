// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashSet;

/// Jaccard similarity over lowercase word sets, with exact string
/// equality (case-insensitive) short-circuiting to 1.0.
pub fn token_set_similarity(a: &str, b: &str) -> f32 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();

    if a_lower == b_lower {
        return 1.0;
    }

    let set_a: HashSet<&str> = a_lower.split_whitespace().collect();
    let set_b: HashSet<&str> = b_lower.split_whitespace().collect();

    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();

    intersection as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_titles_score_one() {
        assert_eq!(token_set_similarity("Inception", "inception"), 1.0);
        assert_eq!(
            token_set_similarity("La Casa de Papel", "la casa de papel"),
            1.0
        );
    }

    #[test]
    fn disjoint_titles_score_zero() {
        assert_eq!(token_set_similarity("Inception", "Vertigo"), 0.0);
    }

    #[test]
    fn scores_stay_within_bounds() {
        let pairs = [
            ("The Matrix", "Matrix Reloaded"),
            ("El Padrino", "The Godfather"),
            ("a b c", "c d e"),
            ("", "anything"),
        ];
        for (a, b) in pairs {
            let s = token_set_similarity(a, b);
            assert!((0.0..=1.0).contains(&s), "{} vs {} -> {}", a, b, s);
        }
    }

    #[test]
    fn single_shared_word_follows_jaccard() {
        // |A| = 2, |B| = 2, one shared word: 1 / (2 + 2 - 1)
        let s = token_set_similarity("the matrix", "matrix reloaded");
        assert!((s - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn word_order_does_not_matter() {
        let s = token_set_similarity("bad breaking", "breaking bad extra");
        assert!((s - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn empty_against_empty_is_equal() {
        assert_eq!(token_set_similarity("", ""), 1.0);
    }
}
