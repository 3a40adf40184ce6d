//! Locality-sensitive hashing over column names and sample values, used
//! to approximate Jaccard similarity between a question's keyword set
//! and each indexed (table, column) pair without an exhaustive compare
//! (spec §4.6, GLOSSARY).

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use crate::context::mschema::SchemaCatalog;
use crate::models::request::SchemaColumn;

const NUM_HASHES: usize = 32;

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

fn hash_with_seed(token: &str, seed: u64) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    seed.hash(&mut hasher);
    token.hash(&mut hasher);
    hasher.finish()
}

/// A fixed-width MinHash signature over a token set.
fn signature(tokens: &HashSet<String>) -> [u64; NUM_HASHES] {
    let mut sig = [u64::MAX; NUM_HASHES];
    for token in tokens {
        for (seed, slot) in sig.iter_mut().enumerate() {
            let h = hash_with_seed(token, seed as u64);
            if h < *slot {
                *slot = h;
            }
        }
    }
    sig
}

fn estimated_jaccard(a: &[u64; NUM_HASHES], b: &[u64; NUM_HASHES]) -> f32 {
    let matches = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    matches as f32 / NUM_HASHES as f32
}

pub struct LshIndex {
    entries: Vec<(SchemaColumn, [u64; NUM_HASHES])>,
}

impl LshIndex {
    pub fn build(catalog: &SchemaCatalog) -> Self {
        let mut entries = Vec::new();
        for table in &catalog.tables {
            for column in &table.columns {
                let mut tokens = tokenize(&column.name);
                for value in &column.sample_values {
                    tokens.extend(tokenize(value));
                }
                entries.push((
                    SchemaColumn { table: table.name.clone(), column: column.name.clone() },
                    signature(&tokens),
                ));
            }
        }
        Self { entries }
    }

    /// Returns every (table, column) whose estimated Jaccard similarity
    /// against `keywords` meets `threshold`.
    pub fn match_keywords(&self, keywords: &[String], threshold: f32) -> HashSet<SchemaColumn> {
        let query_tokens: HashSet<String> = keywords.iter().flat_map(|k| tokenize(k)).collect();
        let query_sig = signature(&query_tokens);

        self.entries
            .iter()
            .filter(|(_, sig)| estimated_jaccard(&query_sig, sig) >= threshold)
            .map(|(col, _)| col.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SchemaCatalog {
        use crate::context::mschema::{ColumnSchema, TableSchema};
        SchemaCatalog {
            tables: vec![TableSchema {
                name: "schools".to_string(),
                columns: vec![ColumnSchema {
                    name: "Virtual".to_string(),
                    data_type: "text".to_string(),
                    sample_values: vec!["F".to_string(), "Yes".to_string()],
                }],
            }],
            foreign_keys: vec![],
        }
    }

    #[test]
    fn exact_token_match_scores_high() {
        let index = LshIndex::build(&catalog());
        let hits = index.match_keywords(&["virtual".to_string()], 0.5);
        assert!(hits.contains(&SchemaColumn { table: "schools".to_string(), column: "Virtual".to_string() }));
    }

    #[test]
    fn unrelated_keywords_score_low() {
        let index = LshIndex::build(&catalog());
        let hits = index.match_keywords(&["unrelated".to_string(), "zzz".to_string()], 0.8);
        assert!(hits.is_empty());
    }
}
