//! Brand profile — knowledge base and policy supplied to each decision.
//!
//! Owned by the brand-settings collaborator; the triage policy only
//! reads a serialized snapshot of the facts at decision time. A race
//! between a fact edit and an in-flight decision is acceptable and not
//! modeled.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A single user-curated fact the drafter may cite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeFact {
    /// Stable fact ID (settings-side key).
    pub id: String,
    /// The fact itself, e.g. "Store hours are 9am-6pm on weekdays".
    pub text: String,
}

impl KnowledgeFact {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Brand settings read by the triage policy.
///
/// Passed explicitly into every decision call — never ambient state —
/// so the policy stays testable with no hidden coupling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandProfile {
    /// Business display name, used in prompts.
    pub business_name: String,
    /// Language replies are drafted in (e.g. "Turkish").
    pub language: String,
    /// Curated knowledge base. Unordered; read-only to the policy.
    #[serde(default)]
    pub facts: Vec<KnowledgeFact>,
    /// Operating guidelines the drafter must obey verbatim.
    #[serde(default)]
    pub policy: String,
}

impl BrandProfile {
    /// Serialized concatenation of the current facts, the form the
    /// drafter reads. Empty string when the knowledge base is empty.
    pub fn facts_digest(&self) -> String {
        let mut digest = String::new();
        for fact in &self.facts {
            digest.push_str("- ");
            digest.push_str(fact.text.trim());
            digest.push('\n');
        }
        digest
    }

    /// Load a profile from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl Default for BrandProfile {
    fn default() -> Self {
        Self {
            business_name: "My Business".into(),
            language: "Turkish".into(),
            facts: Vec::new(),
            policy: "Be polite and concise. Never promise unavailable features. \
                     If you don't know the answer, say a human will follow up."
                .into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facts_digest_lists_each_fact() {
        let profile = BrandProfile {
            facts: vec![
                KnowledgeFact::new("hours", "Store hours are 9am-6pm on weekdays"),
                KnowledgeFact::new("price-x", "Product X costs 129.99 TL"),
            ],
            ..Default::default()
        };
        let digest = profile.facts_digest();
        assert!(digest.contains("- Store hours are 9am-6pm on weekdays\n"));
        assert!(digest.contains("- Product X costs 129.99 TL\n"));
    }

    #[test]
    fn facts_digest_empty_knowledge_base() {
        let profile = BrandProfile::default();
        assert!(profile.facts_digest().is_empty());
    }

    #[test]
    fn profile_deserializes_with_missing_optionals() {
        let profile: BrandProfile = serde_json::from_str(
            r#"{"business_name": "Çiçekçi Ada", "language": "Turkish"}"#,
        )
        .unwrap();
        assert!(profile.facts.is_empty());
        assert!(profile.policy.is_empty());
    }
}
