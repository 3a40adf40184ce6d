//! Produces evidence, exemplars, and the mschema for a request (C5).

use std::sync::Arc;

use crate::context::lsh::LshIndex;
use crate::context::mschema::SchemaCatalog;
use crate::error::CoreError;
use crate::external::vdb_manager::VdbManager;
use crate::models::request::{EvidenceHit, GoldExample, Keyword, SchemaColumn, SchemaLinkStrategy};

const DEFAULT_LSH_THRESHOLD: f32 = 0.35;

pub struct RetrievedContext {
    pub evidence: Vec<EvidenceHit>,
    pub gold_examples: Vec<GoldExample>,
    pub lsh_columns: std::collections::HashSet<SchemaColumn>,
    pub schema_link_strategy: SchemaLinkStrategy,
    pub full_mschema: String,
    pub reduced_mschema: String,
    pub used_mschema: String,
}

pub struct ContextRetriever {
    vdb: Arc<dyn VdbManager>,
    catalog: SchemaCatalog,
    lsh: LshIndex,
}

impl ContextRetriever {
    pub fn new(vdb: Arc<dyn VdbManager>, catalog: SchemaCatalog) -> Self {
        let lsh = LshIndex::build(&catalog);
        Self { vdb, catalog, lsh }
    }

    /// The full, unreduced mschema rendering — used by P1's validator
    /// call, which runs before schema linking has happened.
    pub fn full_mschema(&self) -> String {
        self.catalog.render_full()
    }

    /// Every table and column identifier in the catalog, used by
    /// `RelevanceGuard` for structural-anchor scoring.
    pub fn schema_identifiers(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for table in &self.catalog.tables {
            ids.push(table.name.clone());
            for column in &table.columns {
                ids.push(column.name.clone());
            }
        }
        ids
    }

    /// Runs evidence/exemplar retrieval and LSH schema matching, then
    /// picks the schema link strategy (spec §4.6): WITH_SCHEMA_LINK
    /// unless both LSH and vector search found no schema elements, or
    /// `use_schema` is false.
    pub async fn retrieve(
        &self,
        translated_question: &str,
        keywords: &[Keyword],
        workspace_id: i64,
        use_schema: bool,
        use_lsh: bool,
        use_vector: bool,
        use_examples: bool,
        evidence_k: usize,
        examples_k: usize,
    ) -> Result<RetrievedContext, CoreError> {
        let evidence = if use_vector {
            self.vdb
                .search_evidence(translated_question, evidence_k, workspace_id)
                .await?
                .into_iter()
                .map(|h| EvidenceHit { text: h.text, source: h.source, score: h.score })
                .collect()
        } else {
            Vec::new()
        };

        let gold_examples = if use_examples {
            self.vdb
                .search_sql_examples(translated_question, examples_k)
                .await?
                .into_iter()
                .map(|e| GoldExample { question: e.question, sql: e.sql })
                .collect()
        } else {
            Vec::new()
        };

        let keyword_tokens: Vec<String> = keywords.iter().map(|k| k.token.clone()).collect();
        let lsh_columns = if use_lsh {
            self.lsh.match_keywords(&keyword_tokens, DEFAULT_LSH_THRESHOLD)
        } else {
            Default::default()
        };

        let vector_schema_hit = evidence.iter().any(|e| e.source == "schema");
        let schema_link_strategy = if use_schema && (!lsh_columns.is_empty() || vector_schema_hit) {
            SchemaLinkStrategy::WithSchemaLink
        } else {
            SchemaLinkStrategy::WithoutSchemaLink
        };

        let full_mschema = self.catalog.render_full();
        // Rendered regardless of strategy: spec §3 lists `reduced_mschema`
        // as its own state field, distinct from whichever view P3 actually
        // hands to the generation agents as `used_mschema`.
        let reduced_mschema = self.catalog.render_reduced(&lsh_columns);
        let used_mschema = match schema_link_strategy {
            SchemaLinkStrategy::WithSchemaLink => reduced_mschema.clone(),
            SchemaLinkStrategy::WithoutSchemaLink => full_mschema.clone(),
        };

        Ok(RetrievedContext {
            evidence,
            gold_examples,
            lsh_columns,
            schema_link_strategy,
            full_mschema,
            reduced_mschema,
            used_mschema,
        })
    }
}
