//! SQL candidates as they flow out of `AgentPool` and through
//! `SqlOutputValidator`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorLevel {
    Basic,
    Advanced,
    Expert,
}

impl GeneratorLevel {
    pub fn escalate(self) -> Option<Self> {
        match self {
            Self::Basic => Some(Self::Advanced),
            Self::Advanced => Some(Self::Expert),
            Self::Expert => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub raw: String,
    pub normalized: String,
    pub probe_ok: bool,
    pub probe_error: Option<String>,
    pub generator_level: GeneratorLevel,
    pub generated_at: DateTime<Utc>,
    /// Token-count proxy used by `Selector` tie-breaking and by
    /// `Evaluator`'s complexity metric (spec §4.8/§4.9 Open Question:
    /// formula underspecified upstream, token-count proxy adopted here).
    pub complexity: u32,
}

impl Candidate {
    pub fn new(raw: String, generator_level: GeneratorLevel, generated_at: DateTime<Utc>) -> Self {
        Self {
            raw,
            normalized: String::new(),
            probe_ok: false,
            probe_error: None,
            generator_level,
            generated_at,
            complexity: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalation_follows_basic_advanced_expert_then_stops() {
        assert_eq!(GeneratorLevel::Basic.escalate(), Some(GeneratorLevel::Advanced));
        assert_eq!(GeneratorLevel::Advanced.escalate(), Some(GeneratorLevel::Expert));
        assert_eq!(GeneratorLevel::Expert.escalate(), None);
    }
}
