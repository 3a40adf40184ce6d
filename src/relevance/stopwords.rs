//! Per-language stopword lists and the morphologically-rich-language set
//! that triggers the structural-weight override in `RelevanceGuard`
//! (spec §4.7).

use std::collections::HashSet;

/// Languages whose derivational morphology makes raw lexical overlap an
/// unreliable signal, so structural anchors are weighted higher once
/// they hit at all.
pub const MORPHOLOGICALLY_RICH: &[&str] = &["fi", "hu", "tr", "el", "ru", "uk", "pl", "cs", "sk", "bg", "ro", "sl", "hr", "sr"];

pub fn is_morphologically_rich(language: &str) -> bool {
    MORPHOLOGICALLY_RICH.contains(&language)
}

const ENGLISH: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "of", "in", "on", "at", "to", "for", "and", "or", "with",
    "by", "that", "this", "it", "as", "from", "has", "have", "had",
];

pub fn stopwords(language: &str) -> HashSet<&'static str> {
    match language {
        "en" => ENGLISH.iter().copied().collect(),
        _ => ENGLISH.iter().copied().collect(),
    }
}

/// `union(stopwords[question_language], stopwords[database_language])`,
/// per spec §4.7 ("defaulting to English").
pub fn union_stopwords(question_language: &str, database_language: &str) -> HashSet<&'static str> {
    let mut set = stopwords(question_language);
    set.extend(stopwords(database_language));
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_rich_languages_are_flagged() {
        assert!(is_morphologically_rich("fi"));
        assert!(is_morphologically_rich("tr"));
        assert!(!is_morphologically_rich("en"));
    }

    #[test]
    fn union_stopwords_combines_both_languages() {
        let set = union_stopwords("en", "en");
        assert!(set.contains("the"));
        assert!(set.contains("and"));
    }
}
