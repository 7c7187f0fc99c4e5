//! Classifier — assigns one label to an inbound message.
//!
//! The label must depend only on message content, never on whether a
//! good reply exists: classification and drafting are separate calls
//! so the gate between them stays honest.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{LlmError, TriageError};
use crate::llm::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};
use crate::triage::types::{InboundMessage, Label};

/// Max tokens for the classification call (runs on every message).
const CLASSIFY_MAX_TOKENS: u32 = 64;

/// Temperature for classification (deterministic-ish).
const CLASSIFY_TEMPERATURE: f32 = 0.0;

/// Classification capability.
///
/// Implementations must be pure with respect to message content:
/// the same message yields the same label while the backend is
/// unchanged. On service failure they must return
/// `ClassificationUnavailable` — never a fabricated label.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, message: &InboundMessage) -> Result<Label, TriageError>;
}

/// Model-backed classifier.
pub struct LlmClassifier {
    llm: Arc<dyn LlmProvider>,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, message: &InboundMessage) -> Result<Label, TriageError> {
        message.validate()?;

        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_classify_system_prompt()),
            ChatMessage::user(build_classify_user_prompt(message)),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let response = self.llm.complete(request).await.map_err(map_llm_error)?;

        if response.finish_reason == FinishReason::Refusal {
            return Err(TriageError::SafetyBlocked {
                reason: "classification call refused by model safety filtering".into(),
            });
        }

        let label = parse_label_response(&response.content).map_err(|e| {
            warn!(
                raw_response = %response.content,
                error = %e,
                "Failed to parse classification response"
            );
            TriageError::ClassificationUnavailable {
                reason: format!("unparsable classification: {e}"),
            }
        })?;

        debug!(id = %message.id, label = %label, "Message classified");
        Ok(label)
    }
}

fn map_llm_error(e: LlmError) -> TriageError {
    match e {
        LlmError::Refused { reason, .. } => TriageError::SafetyBlocked { reason },
        other => TriageError::ClassificationUnavailable {
            reason: other.to_string(),
        },
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_classify_system_prompt() -> String {
    "You are a message triage classifier for a small business inbox. \
     Assign exactly one label to the inbound message.\n\n\
     Labels:\n\
     - \"faq\": factual question about price, hours, address, or availability.\n\
     - \"engagement\": compliment or positive feedback.\n\
     - \"complaint\": expression of dissatisfaction.\n\
     - \"sensitive\": legal, health, safety, or discrimination topics that need human judgment.\n\n\
     If a message matches more than one label, pick the higher one in this order: \
     sensitive > complaint > faq > engagement. When unsure, pick the more conservative label.\n\n\
     Respond with ONLY a JSON object: {\"label\": \"...\"}"
        .to_string()
}

fn build_classify_user_prompt(message: &InboundMessage) -> String {
    let mut prompt = String::with_capacity(256);
    prompt.push_str(&format!("Platform: {}\n", message.platform));
    prompt.push_str(&format!("From: {}", message.sender));
    if let Some(ref name) = message.sender_name {
        prompt.push_str(&format!(" ({})", name));
    }
    prompt.push('\n');

    // Truncated for token efficiency
    let text_preview: String = message.text.chars().take(1000).collect();
    prompt.push_str(&format!("\nMessage:\n{}", text_preview));
    prompt
}

// ── Response parsing ────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct LabelResponse {
    label: String,
}

/// Parse the model's classification output into a `Label`.
fn parse_label_response(raw: &str) -> Result<Label, String> {
    let json_str = extract_json_object(raw);
    let response: LabelResponse =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))?;
    response.label.parse()
}

/// Extract a JSON object from model output (handles markdown wrapping).
pub(crate) fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionResponse;
    use crate::triage::types::Platform;
    use rust_decimal::Decimal;

    fn make_message(text: &str) -> InboundMessage {
        InboundMessage::new("test-1", Platform::Instagram, "ayse_y", text)
    }

    // ── Prompt tests ────────────────────────────────────────────────

    #[test]
    fn system_prompt_lists_labels_and_tie_break() {
        let prompt = build_classify_system_prompt();
        for label in ["faq", "engagement", "complaint", "sensitive"] {
            assert!(prompt.contains(label));
        }
        assert!(prompt.contains("sensitive > complaint > faq > engagement"));
    }

    #[test]
    fn user_prompt_includes_platform_and_text() {
        let msg = make_message("Bu ürünün fiyatı nedir?").with_sender_name("Ayşe");
        let prompt = build_classify_user_prompt(&msg);
        assert!(prompt.contains("instagram"));
        assert!(prompt.contains("ayse_y"));
        assert!(prompt.contains("Ayşe"));
        assert!(prompt.contains("fiyatı nedir"));
    }

    #[test]
    fn user_prompt_truncates_long_text() {
        let msg = make_message(&"x".repeat(3000));
        let prompt = build_classify_user_prompt(&msg);
        assert!(prompt.len() < 1200);
    }

    // ── Parse tests ─────────────────────────────────────────────────

    #[test]
    fn parse_plain_label() {
        assert_eq!(parse_label_response(r#"{"label": "faq"}"#).unwrap(), Label::Faq);
        assert_eq!(
            parse_label_response(r#"{"label": "sensitive"}"#).unwrap(),
            Label::Sensitive
        );
    }

    #[test]
    fn parse_markdown_wrapped_label() {
        let raw = "```json\n{\"label\": \"complaint\"}\n```";
        assert_eq!(parse_label_response(raw).unwrap(), Label::Complaint);
    }

    #[test]
    fn parse_label_with_surrounding_text() {
        let raw = "The message is positive: {\"label\": \"engagement\"} as shown.";
        assert_eq!(parse_label_response(raw).unwrap(), Label::Engagement);
    }

    #[test]
    fn parse_unknown_label_fails() {
        assert!(parse_label_response(r#"{"label": "urgent"}"#).is_err());
    }

    #[test]
    fn parse_non_json_fails() {
        assert!(parse_label_response("definitely an faq").is_err());
    }

    // ── Classifier behavior ─────────────────────────────────────────

    /// Mock LLM returning a fixed response or error.
    struct MockLlm {
        result: std::sync::Mutex<Option<Result<CompletionResponse, LlmError>>>,
    }

    impl MockLlm {
        fn text(content: &str) -> Self {
            Self {
                result: std::sync::Mutex::new(Some(Ok(CompletionResponse {
                    content: content.to_string(),
                    input_tokens: 50,
                    output_tokens: 10,
                    finish_reason: FinishReason::Stop,
                    response_id: None,
                }))),
            }
        }

        fn refusal() -> Self {
            Self {
                result: std::sync::Mutex::new(Some(Ok(CompletionResponse {
                    content: String::new(),
                    input_tokens: 50,
                    output_tokens: 0,
                    finish_reason: FinishReason::Refusal,
                    response_id: None,
                }))),
            }
        }

        fn failing(error: LlmError) -> Self {
            Self {
                result: std::sync::Mutex::new(Some(Err(error))),
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
    async fn classifies_from_model_output() {
        let classifier = LlmClassifier::new(Arc::new(MockLlm::text(r#"{"label": "faq"}"#)));
        let label = classifier.classify(&make_message("Fiyat nedir?")).await.unwrap();
        assert_eq!(label, Label::Faq);
    }

    #[tokio::test]
    async fn empty_message_rejected_before_model_call() {
        // The mock would panic on a second take; validation must fail
        // before any call happens at all.
        let classifier = LlmClassifier::new(Arc::new(MockLlm::failing(LlmError::AuthFailed {
            provider: "mock".into(),
        })));
        let result = classifier.classify(&make_message("   ")).await;
        assert!(matches!(result, Err(TriageError::Validation { .. })));
    }

    #[tokio::test]
    async fn provider_failure_maps_to_unavailable() {
        let classifier = LlmClassifier::new(Arc::new(MockLlm::failing(
            LlmError::RequestFailed {
                provider: "anthropic".into(),
                reason: "connection reset".into(),
            },
        )));
        let result = classifier.classify(&make_message("hello")).await;
        assert!(matches!(
            result,
            Err(TriageError::ClassificationUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn provider_refusal_maps_to_safety_blocked() {
        let classifier = LlmClassifier::new(Arc::new(MockLlm::refusal()));
        let result = classifier.classify(&make_message("some content")).await;
        assert!(matches!(result, Err(TriageError::SafetyBlocked { .. })));
    }

    #[tokio::test]
    async fn unparsable_output_is_unavailable_not_a_guess() {
        let classifier = LlmClassifier::new(Arc::new(MockLlm::text("no idea, sorry")));
        let result = classifier.classify(&make_message("hello")).await;
        assert!(matches!(
            result,
            Err(TriageError::ClassificationUnavailable { .. })
        ));
    }
}
