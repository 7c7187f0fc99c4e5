//! Reply drafter — produces a localized reply plus a confidence score.
//!
//! Only legal for FAQ and Engagement labels; the orchestrator enforces
//! the gate, and implementations fail fast if it is violated.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::brand::BrandProfile;
use crate::config::FollowUpPolicy;
use crate::error::{LlmError, TriageError};
use crate::llm::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};
use crate::triage::classifier::extract_json_object;
use crate::triage::types::{InboundMessage, Label};

/// Max tokens for the drafting call.
const DRAFT_MAX_TOKENS: u32 = 256;

/// Temperature for drafting — a little room for natural phrasing.
const DRAFT_TEMPERATURE: f32 = 0.3;

/// A drafted reply with the drafter's self-reported calibration.
///
/// Confidence is a signal for downstream escalation decisions, not a
/// correctness proof.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyDraft {
    pub reply: String,
    pub confidence: f32,
}

/// Drafting capability.
///
/// When no fact in the knowledge base is relevant, implementations
/// still return a polite deflection with low confidence rather than
/// fail — whether to show it belongs to the orchestrator and the
/// human reviewer.
#[async_trait]
pub trait ReplyDrafter: Send + Sync {
    async fn draft(
        &self,
        label: Label,
        message: &InboundMessage,
        brand: &BrandProfile,
    ) -> Result<ReplyDraft, TriageError>;
}

/// Model-backed drafter.
pub struct LlmDrafter {
    llm: Arc<dyn LlmProvider>,
    follow_up: FollowUpPolicy,
}

impl LlmDrafter {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            follow_up: FollowUpPolicy::default(),
        }
    }

    pub fn with_follow_up(mut self, follow_up: FollowUpPolicy) -> Self {
        self.follow_up = follow_up;
        self
    }
}

#[async_trait]
impl ReplyDrafter for LlmDrafter {
    async fn draft(
        &self,
        label: Label,
        message: &InboundMessage,
        brand: &BrandProfile,
    ) -> Result<ReplyDraft, TriageError> {
        if label.requires_human() {
            return Err(TriageError::InvalidLabelForDrafting { label });
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_draft_system_prompt(brand, self.follow_up)),
            ChatMessage::user(build_draft_user_prompt(label, message, brand)),
        ])
        .with_temperature(DRAFT_TEMPERATURE)
        .with_max_tokens(DRAFT_MAX_TOKENS);

        let response = self.llm.complete(request).await.map_err(map_llm_error)?;

        if response.finish_reason == FinishReason::Refusal {
            return Err(TriageError::SafetyBlocked {
                reason: "drafting call refused by model safety filtering".into(),
            });
        }

        let draft = parse_draft_response(&response.content).map_err(|e| {
            warn!(
                raw_response = %response.content,
                error = %e,
                "Failed to parse draft response"
            );
            TriageError::DraftingUnavailable {
                reason: format!("unparsable draft: {e}"),
            }
        })?;

        debug!(
            id = %message.id,
            confidence = draft.confidence,
            reply_len = draft.reply.len(),
            "Reply drafted"
        );
        Ok(draft)
    }
}

fn map_llm_error(e: LlmError) -> TriageError {
    match e {
        LlmError::Refused { reason, .. } => TriageError::SafetyBlocked { reason },
        other => TriageError::DraftingUnavailable {
            reason: other.to_string(),
        },
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_draft_system_prompt(brand: &BrandProfile, follow_up: FollowUpPolicy) -> String {
    let follow_up_rule = match follow_up {
        FollowUpPolicy::Always => {
            "- For engagement messages, always end with one short follow-up question."
        }
        FollowUpPolicy::WhenNatural => {
            "- For engagement messages, you may end with one short follow-up question \
             when it fits naturally."
        }
        FollowUpPolicy::Never => "- Never append follow-up questions.",
    };

    format!(
        "You draft customer replies for \"{business}\". Write in {language}.\n\n\
         Rules:\n\
         - 1-2 sentences, polite and concise.\n\
         - Use ONLY the facts listed under \"Knowledge base\". Never state a claim \
           the facts don't support.\n\
         - Follow every directive under \"Policy\" verbatim. Policy overrides anything \
           you might infer from the facts.\n\
         - If no fact answers the question, write a polite hand-off \
           (a human will follow up) and report low confidence.\n\
         {follow_up_rule}\n\n\
         Respond with ONLY a JSON object:\n\
         {{\"reply\": \"...\", \"confidence\": 0.0}}\n\n\
         Confidence is how well the knowledge base supports your reply: above 0.9 only \
         when a fact answers the question directly and unambiguously, below 0.5 when \
         you had to deflect or extrapolate.",
        business = brand.business_name,
        language = brand.language,
    )
}

fn build_draft_user_prompt(label: Label, message: &InboundMessage, brand: &BrandProfile) -> String {
    let facts = brand.facts_digest();
    let mut prompt = String::with_capacity(512);

    prompt.push_str(&format!("Label: {}\n", label));
    prompt.push_str(&format!("Platform: {}\n", message.platform));
    prompt.push_str(&format!(
        "From: {}\n",
        message.sender_name.as_deref().unwrap_or(&message.sender)
    ));
    prompt.push_str("\nKnowledge base:\n");
    if facts.is_empty() {
        prompt.push_str("(no facts configured)\n");
    } else {
        prompt.push_str(&facts);
    }
    prompt.push_str(&format!("\nPolicy:\n{}\n", brand.policy));

    let text_preview: String = message.text.chars().take(1000).collect();
    prompt.push_str(&format!("\nMessage:\n{}", text_preview));
    prompt
}

// ── Response parsing ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DraftResponse {
    #[serde(default)]
    reply: String,
    #[serde(default)]
    confidence: f32,
}

/// Parse the model's draft output.
///
/// An empty reply is invalid — the contract requires a deflection
/// rather than silence when nothing in the knowledge base helps.
fn parse_draft_response(raw: &str) -> Result<ReplyDraft, String> {
    let json_str = extract_json_object(raw);
    let response: DraftResponse =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))?;

    if response.reply.trim().is_empty() {
        return Err("draft reply is empty".into());
    }

    Ok(ReplyDraft {
        reply: response.reply,
        confidence: response.confidence.clamp(0.0, 1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brand::KnowledgeFact;
    use crate::llm::CompletionResponse;
    use crate::triage::types::Platform;
    use rust_decimal::Decimal;

    fn make_message(text: &str) -> InboundMessage {
        InboundMessage::new("test-1", Platform::Instagram, "ayse_y", text)
    }

    fn make_brand() -> BrandProfile {
        BrandProfile {
            business_name: "Çiçekçi Ada".into(),
            language: "Turkish".into(),
            facts: vec![KnowledgeFact::new("price-x", "Product X costs 129.99 TL")],
            policy: "Never promise unavailable features.".into(),
        }
    }

    // ── Prompt tests ────────────────────────────────────────────────

    #[test]
    fn system_prompt_carries_language_and_confidence_rubric() {
        let prompt = build_draft_system_prompt(&make_brand(), FollowUpPolicy::WhenNatural);
        assert!(prompt.contains("Turkish"));
        assert!(prompt.contains("Çiçekçi Ada"));
        assert!(prompt.contains("above 0.9"));
        assert!(prompt.contains("below 0.5"));
    }

    #[test]
    fn system_prompt_reflects_follow_up_policy() {
        let always = build_draft_system_prompt(&make_brand(), FollowUpPolicy::Always);
        assert!(always.contains("always end with one short follow-up question"));
        let never = build_draft_system_prompt(&make_brand(), FollowUpPolicy::Never);
        assert!(never.contains("Never append follow-up questions"));
    }

    #[test]
    fn user_prompt_embeds_facts_and_policy_verbatim() {
        let brand = make_brand();
        let msg = make_message("Bu ürünün fiyatı nedir?");
        let prompt = build_draft_user_prompt(Label::Faq, &msg, &brand);
        assert!(prompt.contains("- Product X costs 129.99 TL"));
        assert!(prompt.contains("Never promise unavailable features."));
        assert!(prompt.contains("fiyatı nedir"));
    }

    #[test]
    fn user_prompt_marks_empty_knowledge_base() {
        let brand = BrandProfile {
            facts: vec![],
            ..make_brand()
        };
        let prompt = build_draft_user_prompt(Label::Faq, &make_message("hi"), &brand);
        assert!(prompt.contains("(no facts configured)"));
    }

    // ── Parse tests ─────────────────────────────────────────────────

    #[test]
    fn parse_draft() {
        let draft =
            parse_draft_response(r#"{"reply": "129,99 TL efendim.", "confidence": 0.95}"#).unwrap();
        assert_eq!(draft.reply, "129,99 TL efendim.");
        assert!((draft.confidence - 0.95).abs() < 0.001);
    }

    #[test]
    fn parse_draft_clamps_confidence() {
        let draft = parse_draft_response(r#"{"reply": "ok", "confidence": 1.4}"#).unwrap();
        assert_eq!(draft.confidence, 1.0);
    }

    #[test]
    fn parse_empty_reply_fails() {
        assert!(parse_draft_response(r#"{"reply": "", "confidence": 0.2}"#).is_err());
        assert!(parse_draft_response(r#"{"confidence": 0.2}"#).is_err());
    }

    #[test]
    fn parse_markdown_wrapped_draft() {
        let raw = "```json\n{\"reply\": \"Teşekkürler!\", \"confidence\": 0.8}\n```";
        let draft = parse_draft_response(raw).unwrap();
        assert_eq!(draft.reply, "Teşekkürler!");
    }

    // ── Drafter behavior ────────────────────────────────────────────

    struct MockLlm {
        result: std::sync::Mutex<Option<Result<CompletionResponse, LlmError>>>,
    }

    impl MockLlm {
        fn text(content: &str) -> Self {
            Self {
                result: std::sync::Mutex::new(Some(Ok(CompletionResponse {
                    content: content.to_string(),
                    input_tokens: 100,
                    output_tokens: 40,
                    finish_reason: FinishReason::Stop,
                    response_id: None,
                }))),
            }
        }

        fn refusal() -> Self {
            Self {
                result: std::sync::Mutex::new(Some(Ok(CompletionResponse {
                    content: String::new(),
                    input_tokens: 100,
                    output_tokens: 0,
                    finish_reason: FinishReason::Refusal,
                    response_id: None,
                }))),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock"
        }
        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.result.lock().unwrap().take().expect("mock called twice")
        }
    }

    #[tokio::test]
    async fn drafts_from_model_output() {
        let drafter = LlmDrafter::new(Arc::new(MockLlm::text(
            r#"{"reply": "Ürünün fiyatı 129,99 TL'dir.", "confidence": 0.95}"#,
        )));
        let draft = drafter
            .draft(Label::Faq, &make_message("Fiyat nedir?"), &make_brand())
            .await
            .unwrap();
        assert!(draft.reply.contains("129,99 TL"));
        assert!(draft.confidence > 0.9);
    }

    #[tokio::test]
    async fn gated_label_fails_fast_without_model_call() {
        // MockLlm panics if called twice; here it must not be called
        // even once, so leave a poison result in place.
        let drafter = LlmDrafter::new(Arc::new(MockLlm::refusal()));
        for label in [Label::Complaint, Label::Sensitive] {
            let result = drafter
                .draft(label, &make_message("text"), &make_brand())
                .await;
            assert!(matches!(
                result,
                Err(TriageError::InvalidLabelForDrafting { label: l }) if l == label
            ));
        }
    }

    #[tokio::test]
    async fn refusal_maps_to_safety_blocked() {
        let drafter = LlmDrafter::new(Arc::new(MockLlm::refusal()));
        let result = drafter
            .draft(Label::Faq, &make_message("text"), &make_brand())
            .await;
        assert!(matches!(result, Err(TriageError::SafetyBlocked { .. })));
    }
}
