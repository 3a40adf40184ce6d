//! BM25 lexical-overlap scoring of a test against the question+evidence
//! corpus (spec §4.7). Tokens are NFKC-normalized and case-folded before
//! scoring so composed/decomposed Unicode variants compare equal.

use std::collections::{HashMap, HashSet};

use unicode_normalization::UnicodeNormalization;

const K1: f32 = 1.2;
const B: f32 = 0.75;

pub fn normalize_tokens(text: &str, stopwords: &HashSet<&'static str>) -> Vec<String> {
    text.nfkc()
        .collect::<String>()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .filter(|s| !stopwords.contains(*s))
        .map(|s| s.to_string())
        .collect()
}

/// A minimal BM25 index over a small corpus (the question plus retrieved
/// evidence passages) — rebuilt per request since the corpus never
/// exceeds a few dozen short documents.
pub struct Bm25Corpus {
    docs: Vec<Vec<String>>,
    avg_len: f32,
    df: HashMap<String, usize>,
}

impl Bm25Corpus {
    pub fn build(documents: &[String], stopwords: &HashSet<&'static str>) -> Self {
        let docs: Vec<Vec<String>> = documents.iter().map(|d| normalize_tokens(d, stopwords)).collect();
        let avg_len = if docs.is_empty() {
            0.0
        } else {
            docs.iter().map(|d| d.len()).sum::<usize>() as f32 / docs.len() as f32
        };

        let mut df: HashMap<String, usize> = HashMap::new();
        for doc in &docs {
            for term in doc.iter().collect::<HashSet<_>>() {
                *df.entry(term.clone()).or_insert(0) += 1;
            }
        }

        Self { docs, avg_len, df }
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.docs.len() as f32;
        let df = *self.df.get(term).unwrap_or(&0) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Sum of per-document BM25 scores for `query_tokens` against every
    /// document in the corpus, normalized to roughly [0,1] by dividing
    /// by the number of documents and a saturation constant.
    pub fn score(&self, query_tokens: &[String]) -> f32 {
        if self.docs.is_empty() || query_tokens.is_empty() {
            return 0.0;
        }

        let mut total = 0.0;
        for doc in &self.docs {
            let doc_len = doc.len() as f32;
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for term in doc {
                *counts.entry(term.as_str()).or_insert(0) += 1;
            }

            let mut doc_score = 0.0;
            for term in query_tokens {
                let freq = *counts.get(term.as_str()).unwrap_or(&0) as f32;
                if freq == 0.0 {
                    continue;
                }
                let idf = self.idf(term);
                let denom = freq + K1 * (1.0 - B + B * doc_len / self.avg_len.max(1.0));
                doc_score += idf * (freq * (K1 + 1.0)) / denom;
            }
            total += doc_score;
        }

        let normalized = total / (self.docs.len() as f32 * 4.0);
        normalized.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_tokens_folds_case_and_drops_stopwords() {
        let mut stopwords = HashSet::new();
        stopwords.insert("the");
        let tokens = normalize_tokens("The Quick Brown Fox", &stopwords);
        assert_eq!(tokens, vec!["quick", "brown", "fox"]);
    }

    #[test]
    fn normalize_tokens_nfkc_folds_composed_and_decomposed_forms() {
        let stopwords = HashSet::new();
        let composed = normalize_tokens("café", &stopwords);
        let decomposed = normalize_tokens("cafe\u{0301}", &stopwords);
        assert_eq!(composed, decomposed);
    }

    #[test]
    fn score_is_zero_for_empty_corpus_or_empty_query() {
        let stopwords = HashSet::new();
        let corpus = Bm25Corpus::build(&[], &stopwords);
        assert_eq!(corpus.score(&["anything".to_string()]), 0.0);

        let corpus = Bm25Corpus::build(&["some document".to_string()], &stopwords);
        assert_eq!(corpus.score(&[]), 0.0);
    }

    #[test]
    fn overlapping_terms_score_higher_than_disjoint_terms() {
        let stopwords = HashSet::new();
        let corpus = Bm25Corpus::build(&["how many schools are exclusively virtual".to_string()], &stopwords);

        let overlapping = normalize_tokens("schools virtual", &stopwords);
        let disjoint = normalize_tokens("completely unrelated terms", &stopwords);

        assert!(corpus.score(&overlapping) > corpus.score(&disjoint));
    }
}
