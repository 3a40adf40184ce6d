//! Classifies generated tests as STRICT/WEAK/IRRELEVANT by combining
//! lexical (BM25) and structural (schema-anchor) relevance, with a
//! language-aware weight override (C6).

use crate::models::request::EvidenceHit;
use crate::models::test_case::{Relevance, Test};
use crate::relevance::bm25::{Bm25Corpus, normalize_tokens};
use crate::relevance::stopwords::{is_morphologically_rich, union_stopwords};
use crate::relevance::structural::{structural_hit_count, structural_score};

const STRICT_THRESHOLD: f32 = 0.6;
const WEAK_THRESHOLD: f32 = 0.3;
const DEFAULT_W_BM25: f32 = 0.6;
const DEFAULT_W_STRUCT: f32 = 0.4;
const RICH_LANGUAGE_W_BM25: f32 = 0.45;
const RICH_LANGUAGE_W_STRUCT: f32 = 0.55;

pub struct RelevanceGuard {
    w_bm25: f32,
    w_struct: f32,
}

impl RelevanceGuard {
    pub fn new(w_bm25: f32, w_struct: f32) -> Self {
        Self { w_bm25, w_struct }
    }

    /// Classifies every test in place. `question` and `evidence` form the
    /// BM25 corpus; `schema_identifiers` are the table/column names drawn
    /// from `used_mschema` for structural scoring.
    pub fn classify(
        &self,
        tests: &mut [Test],
        question: &str,
        evidence: &[EvidenceHit],
        schema_identifiers: &[String],
        question_language: &str,
        database_language: &str,
    ) {
        let stopwords = union_stopwords(question_language, database_language);

        let mut documents = vec![question.to_string()];
        documents.extend(evidence.iter().map(|e| e.text.clone()));
        let corpus = Bm25Corpus::build(&documents, &stopwords);

        let rich_language = is_morphologically_rich(question_language) || is_morphologically_rich(database_language);

        for test in tests.iter_mut() {
            let query_tokens = normalize_tokens(&test.text, &stopwords);
            let bm25 = corpus.score(&query_tokens);
            let structural = structural_score(&test.text, schema_identifiers);
            let struct_hits = structural_hit_count(&test.text, schema_identifiers);

            let (w_bm25, w_struct) =
                if rich_language && struct_hits >= 1 { (RICH_LANGUAGE_W_BM25, RICH_LANGUAGE_W_STRUCT) } else { (self.w_bm25, self.w_struct) };

            test.bm25_score = bm25;
            test.structural_score = structural;

            let combined = w_bm25 * bm25 + w_struct * structural;
            test.relevance = if combined >= STRICT_THRESHOLD {
                Relevance::Strict
            } else if combined >= WEAK_THRESHOLD {
                Relevance::Weak
            } else {
                Relevance::Irrelevant
            };
        }
    }
}

impl Default for RelevanceGuard {
    fn default() -> Self {
        Self::new(DEFAULT_W_BM25, DEFAULT_W_STRUCT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_case(text: &str) -> Test {
        Test {
            text: text.to_string(),
            expected_behavior: "returns rows".to_string(),
            evidence_critical: false,
            relevance: Relevance::Irrelevant,
            bm25_score: 0.0,
            structural_score: 0.0,
        }
    }

    #[test]
    fn classification_is_order_independent() {
        let guard = RelevanceGuard::default();
        let schema_identifiers = vec!["virtual".to_string(), "schools".to_string()];

        let mut forward = vec![
            test_case("The query filters schools where Virtual = 'F'"),
            test_case("totally unrelated assertion about weather"),
        ];
        let mut reversed = vec![forward[1].clone(), forward[0].clone()];

        guard.classify(&mut forward, "How many schools are exclusively virtual?", &[], &schema_identifiers, "en", "en");
        guard.classify(&mut reversed, "How many schools are exclusively virtual?", &[], &schema_identifiers, "en", "en");

        let forward_strict: std::collections::HashSet<_> =
            forward.iter().filter(|t| t.relevance == Relevance::Strict).map(|t| t.text.clone()).collect();
        let reversed_strict: std::collections::HashSet<_> =
            reversed.iter().filter(|t| t.relevance == Relevance::Strict).map(|t| t.text.clone()).collect();

        assert_eq!(forward_strict, reversed_strict);
    }
}
