//! Pre-LLM signal rules for conservative fast-path labeling.
//!
//! Runs before the classifier call to short-circuit messages with
//! strong textual signals for the gated labels:
//! - legal/health/safety/discrimination terms → Sensitive
//! - explicit dissatisfaction phrases → Complaint
//!
//! Rules only ever produce Complaint or Sensitive. Anything that looks
//! like a normal question or compliment falls through to the model —
//! a rules false positive costs one human review, a false negative on
//! a gated label costs an auto-drafted reply to an angry customer.
//!
//! Sensitive rules are checked before Complaint rules, matching the
//! label tie-break (most conservative wins).

use regex::Regex;
use tracing::debug;

use crate::triage::types::{InboundMessage, Label};

/// A single signal rule with a compiled regex.
#[derive(Debug, Clone)]
pub struct SignalRule {
    /// Human-readable pattern description.
    pub pattern: String,
    /// Compiled regex for matching message text.
    pub regex: Regex,
    /// Label this rule short-circuits to.
    pub label: Label,
}

/// Deterministic signal rules evaluated before the classifier.
pub struct SignalRules {
    rules: Vec<SignalRule>,
}

impl SignalRules {
    /// Default rule set, English and Turkish.
    pub fn default_rules() -> Self {
        let rules = vec![
            // Legal topics
            SignalRule {
                pattern: "legal terms".into(),
                regex: Regex::new(
                    r"(?i)\b(lawyer|attorney|lawsuit|sue you|legal action|avukat|dava a[cç])",
                )
                .unwrap(),
                label: Label::Sensitive,
            },
            // Health/safety topics
            SignalRule {
                pattern: "health/safety terms".into(),
                regex: Regex::new(
                    r"(?i)\b(allerg|hospital|injur|poison|side effect|unsafe|alerji|hastane|zehir|yan etki)",
                )
                .unwrap(),
                label: Label::Sensitive,
            },
            // Discrimination/harassment
            SignalRule {
                pattern: "discrimination/harassment terms".into(),
                regex: Regex::new(r"(?i)\b(discriminat|harass|racis|ayr[ıi]mc[ıi]|taciz)").unwrap(),
                label: Label::Sensitive,
            },
            // Explicit dissatisfaction
            SignalRule {
                pattern: "dissatisfaction phrases".into(),
                regex: Regex::new(
                    r"(?i)(memnun kalmad[ıi]|hayal k[ıi]r[ıi]kl[ıi][gğ][ıi]|şikayet|rezalet|berbat|not happy|very disappointed|worst (service|product)|want (a|my) refund|para iades?i)",
                )
                .unwrap(),
                label: Label::Complaint,
            },
        ];

        Self { rules }
    }

    /// Create an empty rule set (for testing).
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a custom rule. Only gated labels are accepted — the fast
    /// path must never pre-empt the classifier toward a draftable
    /// label.
    pub fn add_rule(
        &mut self,
        pattern: &str,
        label: Label,
    ) -> Result<(), regex::Error> {
        assert!(label.requires_human(), "signal rules may only gate");
        self.rules.push(SignalRule {
            pattern: pattern.into(),
            regex: Regex::new(pattern)?,
            label,
        });
        Ok(())
    }

    /// Evaluate a message against all rules.
    ///
    /// Returns `Some(label)` when a rule matches (skips the model
    /// call), `None` to fall through to the classifier. With several
    /// matches the most conservative label wins.
    pub fn evaluate(&self, message: &InboundMessage) -> Option<Label> {
        let hit = self
            .rules
            .iter()
            .filter(|rule| rule.regex.is_match(&message.text))
            .max_by_key(|rule| rule.label.rank())?;

        debug!(
            id = %message.id,
            rule = %hit.pattern,
            label = %hit.label,
            "Message matched signal rule"
        );
        Some(hit.label)
    }
}

impl Default for SignalRules {
    fn default() -> Self {
        Self::default_rules()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::types::Platform;

    fn make_message(text: &str) -> InboundMessage {
        InboundMessage::new("test-1", Platform::Instagram, "user_1", text)
    }

    #[test]
    fn legal_terms_are_sensitive() {
        let rules = SignalRules::default_rules();
        let msg = make_message("I will talk to my lawyer about this");
        assert_eq!(rules.evaluate(&msg), Some(Label::Sensitive));
    }

    #[test]
    fn turkish_legal_terms_are_sensitive() {
        let rules = SignalRules::default_rules();
        let msg = make_message("Avukatımla görüşüp dava açacağım");
        assert_eq!(rules.evaluate(&msg), Some(Label::Sensitive));
    }

    #[test]
    fn health_terms_are_sensitive() {
        let rules = SignalRules::default_rules();
        let msg = make_message("Ürününüz alerjik reaksiyon yaptı");
        assert_eq!(rules.evaluate(&msg), Some(Label::Sensitive));
    }

    #[test]
    fn dissatisfaction_is_complaint() {
        let rules = SignalRules::default_rules();
        let msg = make_message("Bu hizmetinizden hiç memnun kalmadım.");
        assert_eq!(rules.evaluate(&msg), Some(Label::Complaint));
    }

    #[test]
    fn refund_request_is_complaint() {
        let rules = SignalRules::default_rules();
        let msg = make_message("This is broken, I want a refund");
        assert_eq!(rules.evaluate(&msg), Some(Label::Complaint));
    }

    #[test]
    fn sensitive_outranks_complaint_when_both_match() {
        let rules = SignalRules::default_rules();
        let msg = make_message("Berbat ürün, alerji yaptı");
        assert_eq!(rules.evaluate(&msg), Some(Label::Sensitive));
    }

    #[test]
    fn ordinary_question_falls_through() {
        let rules = SignalRules::default_rules();
        let msg = make_message("Bu ürünün fiyatı nedir?");
        assert_eq!(rules.evaluate(&msg), None);
    }

    #[test]
    fn compliment_falls_through() {
        let rules = SignalRules::default_rules();
        let msg = make_message("Harika bir ürün, çok teşekkürler!");
        assert_eq!(rules.evaluate(&msg), None);
    }

    #[test]
    fn empty_rules_pass_everything() {
        let rules = SignalRules::empty();
        let msg = make_message("I will sue you");
        assert_eq!(rules.evaluate(&msg), None);
    }

    #[test]
    fn custom_rule() {
        let mut rules = SignalRules::empty();
        rules.add_rule(r"(?i)\bchargeback\b", Label::Complaint).unwrap();
        let msg = make_message("Filing a chargeback today");
        assert_eq!(rules.evaluate(&msg), Some(Label::Complaint));
    }

    #[test]
    #[should_panic(expected = "signal rules may only gate")]
    fn custom_rule_rejects_draftable_label() {
        let mut rules = SignalRules::empty();
        let _ = rules.add_rule(r"price", Label::Faq);
    }
}
