//! Generated test assertions used by `Evaluator` to score SQL candidates,
//! and their relevance classification from `RelevanceGuard`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Relevance {
    Strict,
    Weak,
    Irrelevant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    pub text: String,
    pub expected_behavior: String,
    pub evidence_critical: bool,
    pub relevance: Relevance,
    pub bm25_score: f32,
    pub structural_score: f32,
}

impl Test {
    /// Combined relevance score as used for threshold comparisons in
    /// `RelevanceGuard` (weights are applied by the guard before this is
    /// stored, so this is a plain weighted sum of the two sub-scores).
    pub fn combined_score(&self, w_bm25: f32, w_struct: f32) -> f32 {
        w_bm25 * self.bm25_score + w_struct * self.structural_score
    }

    /// Normalization applied before exact-duplicate detection in P4:
    /// whitespace collapse + casefold.
    pub fn normalized_text(&self) -> String {
        self.text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_with_text(text: &str) -> Test {
        Test {
            text: text.to_string(),
            expected_behavior: String::new(),
            evidence_critical: false,
            relevance: Relevance::Strict,
            bm25_score: 0.0,
            structural_score: 0.0,
        }
    }

    #[test]
    fn normalized_text_collapses_whitespace_and_casefolds() {
        let t = test_with_text("  SELECT  Count(*)   FROM Schools  ");
        assert_eq!(t.normalized_text(), "select count(*) from schools");
    }

    #[test]
    fn differently_whitespaced_duplicates_normalize_equal() {
        let a = test_with_text("check district = 'Los Angeles'");
        let b = test_with_text("  check   district = 'Los Angeles' ");
        assert_eq!(a.normalized_text(), b.normalized_text());
    }

    #[test]
    fn combined_score_is_weighted_sum() {
        let mut t = test_with_text("x");
        t.bm25_score = 0.8;
        t.structural_score = 0.4;
        assert!((t.combined_score(0.6, 0.4) - 0.64).abs() < 1e-6);
    }
}
