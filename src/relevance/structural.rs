//! Structural-anchor scoring: counts occurrences of schema entities
//! (table and column identifiers) in a test's text (spec §4.7).

pub fn structural_score(test_text: &str, schema_identifiers: &[String]) -> f32 {
    if schema_identifiers.is_empty() {
        return 0.0;
    }
    let lowered = test_text.to_lowercase();
    let hits = schema_identifiers
        .iter()
        .filter(|ident| lowered.contains(&ident.to_lowercase()))
        .count();
    (hits as f32 / schema_identifiers.len() as f32).clamp(0.0, 1.0)
}

pub fn structural_hit_count(test_text: &str, schema_identifiers: &[String]) -> usize {
    let lowered = test_text.to_lowercase();
    schema_identifiers.iter().filter(|ident| lowered.contains(&ident.to_lowercase())).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_zero_with_no_schema_identifiers() {
        assert_eq!(structural_score("anything at all", &[]), 0.0);
    }

    #[test]
    fn score_counts_case_insensitive_matches() {
        let idents = vec!["Schools".to_string(), "District".to_string()];
        let score = structural_score("count rows where SCHOOLS.district = 'x'", &idents);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn hit_count_matches_number_of_identifiers_present() {
        let idents = vec!["schools".to_string(), "county".to_string(), "zip".to_string()];
        assert_eq!(structural_hit_count("schools in this county", &idents), 2);
    }
}
