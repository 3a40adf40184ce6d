//! Resolves `template_key -> (system, user)` prompt pairs from a static
//! registry (C2). Both halves use `{field}` placeholder substitution
//! against a named variable map built from the typed dependency record
//! for the call site; a placeholder with no matching variable is a
//! construction-time error, never a silent blank (spec §9: "prompt
//! errors surface at construction, not at inference").

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::CoreError;

pub struct Template {
    pub system: &'static str,
    pub user: &'static str,
}

static REGISTRY: Lazy<HashMap<&'static str, Template>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "validator",
        Template {
            system: "You validate whether a natural-language question can be answered with SQL \
                     against the schema described below. Respond with a JSON object matching the \
                     requested schema.\nSchema:\n{used_mschema}",
            user: "Question: {question}\nIs this question answerable against the schema? \
                   Return {\"valid\": bool, \"reason\": string}.",
        },
    );
    m.insert(
        "translator",
        Template {
            system: "You translate questions into {database_language} while preserving meaning \
                     exactly. Respond with JSON {\"translated\": string}.",
            user: "Question ({question_language}): {question}",
        },
    );
    m.insert(
        "keyword_extractor",
        Template {
            system: "You extract search keywords from a question, each weighted by importance \
                     in [0,1]. Respond with JSON {\"keywords\": [{\"token\": string, \"weight\": number}]}.",
            user: "Question: {question}",
        },
    );
    m.insert(
        "sql_basic",
        Template {
            system: "You write a single {dialect} SQL statement answering the question using \
                     only the schema below. Respond with JSON {\"sql\": string}.\nSchema:\n{used_mschema}",
            user: "Question: {question}\nEvidence:\n{evidence}\nExamples:\n{examples}",
        },
    );
    m.insert(
        "sql_advanced",
        Template {
            system: "You are an expert {dialect} SQL author. Favor window functions and CTEs \
                     where they simplify the query. Respond with JSON {\"sql\": string}.\nSchema:\n{used_mschema}",
            user: "Question: {question}\nEvidence:\n{evidence}\nExamples:\n{examples}",
        },
    );
    m.insert(
        "sql_expert",
        Template {
            system: "You are a principal {dialect} SQL author handling the hardest questions. \
                     Consider edge cases in NULL handling, joins, and aggregation precedence. \
                     Respond with JSON {\"sql\": string}.\nSchema:\n{used_mschema}",
            user: "Question: {question}\nEvidence:\n{evidence}\nExamples:\n{examples}",
        },
    );
    m.insert(
        "test_gen",
        Template {
            system: "You write executable test assertions that check whether a candidate SQL \
                     query correctly answers the question. Respond with JSON \
                     {\"tests\": [{\"text\": string, \"expected_behavior\": string}]}.\nSchema:\n{used_mschema}",
            user: "Question: {question}\nEvidence:\n{evidence}",
        },
    );
    m.insert(
        "selector",
        Template {
            system: "Multiple SQL candidates pass all tests. Pick the best one considering \
                     clarity and the original question's intent. Respond with JSON \
                     {\"index\": number, \"reasoning\": string}.",
            user: "Question: {question}\nCandidates:\n{candidates}",
        },
    );
    m.insert(
        "supervisor",
        Template {
            system: "A SQL candidate passes most but not all tests. Decide whether it is an \
                     acceptable answer to the question. Respond with JSON \
                     {\"approved\": bool, \"reasoning\": string}.",
            user: "Question: {question}\nCandidate SQL:\n{sql}\nPass rate: {pass_rate}",
        },
    );
    m.insert(
        "test_reducer",
        Template {
            system: "Collapse this list of tests into a smaller set by merging near-duplicates, \
                     preserving distinct assertions. Respond with JSON \
                     {\"kept_indices\": [number]}.",
            user: "Tests:\n{tests}",
        },
    );
    m.insert(
        "explainer",
        Template {
            system: "Explain a SQL query in {question_language} for a non-technical reader. \
                     Respond with JSON {\"explanation\": string}.\nSchema:\n{used_mschema}",
            user: "Question: {question}\nSQL:\n{sql}\nEvidence:\n{evidence}\nReasoning so far:\n{chain_of_thought}",
        },
    );
    m
});

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub struct TemplateLoader;

impl TemplateLoader {
    pub fn resolve(key: &str) -> Result<&'static Template, CoreError> {
        REGISTRY
            .get(key)
            .ok_or_else(|| CoreError::TemplateError(format!("unknown template key '{key}'")))
    }

    /// Substitutes every `{name}` placeholder in `text` with `vars[name]`,
    /// where a placeholder name is an identifier (letters, digits,
    /// underscore). Brace spans containing anything else — the literal
    /// JSON-shape hints embedded in these prompts — are left untouched.
    /// A genuine placeholder with no matching variable is a fatal
    /// construction error rather than being left in place or blanked.
    pub fn render(text: &str, vars: &HashMap<&str, String>) -> Result<String, CoreError> {
        let mut out = String::with_capacity(text.len());
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'{' {
                if let Some(end) = text[i + 1..].find('}') {
                    let name = &text[i + 1..i + 1 + end];
                    if is_identifier(name) {
                        match vars.get(name) {
                            Some(value) => {
                                out.push_str(value);
                                i = i + 1 + end + 1;
                                continue;
                            },
                            None => {
                                return Err(CoreError::TemplateError(format!(
                                    "missing template variable '{name}'"
                                )));
                            },
                        }
                    }
                }
            }
            let ch = text[i..].chars().next().unwrap();
            out.push(ch);
            i += ch.len_utf8();
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_agent_kind_default_template_key() {
        for key in [
            "validator",
            "translator",
            "keyword_extractor",
            "sql_basic",
            "sql_advanced",
            "sql_expert",
            "test_gen",
            "selector",
            "supervisor",
            "test_reducer",
            "explainer",
        ] {
            assert!(TemplateLoader::resolve(key).is_ok(), "missing template for '{key}'");
        }
    }

    #[test]
    fn unknown_template_key_is_an_error() {
        assert!(TemplateLoader::resolve("no_such_template").is_err());
    }

    #[test]
    fn render_substitutes_named_placeholders() {
        let mut vars = HashMap::new();
        vars.insert("question", "how many schools?".to_string());
        let out = TemplateLoader::render("Question: {question}", &vars).unwrap();
        assert_eq!(out, "Question: how many schools?");
    }

    #[test]
    fn render_leaves_json_shape_braces_untouched() {
        let vars = HashMap::new();
        let out = TemplateLoader::render("Return {\"valid\": bool}", &vars).unwrap();
        assert_eq!(out, "Return {\"valid\": bool}");
    }

    #[test]
    fn render_fails_on_missing_variable() {
        let vars = HashMap::new();
        let err = TemplateLoader::render("Question: {question}", &vars).unwrap_err();
        assert!(matches!(err, CoreError::TemplateError(_)));
    }
}
