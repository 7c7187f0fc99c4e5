//! Triage orchestrator — sequences classification and drafting and
//! enforces the gating invariant.
//!
//! **Core invariant: no reply is ever drafted for a message labeled
//! Complaint or Sensitive.** Structurally guaranteed here by never
//! invoking the drafter on a gated label; neither sub-component can
//! break it on its own.
//!
//! Flow for one message:
//! 1. Validation (fail fast, no external calls)
//! 2. Signal rules (fast, no LLM) → may short-circuit to a gated label
//! 3. Classification (timeout + bounded retry)
//! 4. Gate: Complaint/Sensitive → escalated decision
//! 5. Drafting (timeout + bounded retry)
//!
//! Safety blocks at either stage fail closed into an escalation.
//! Classification failure fails the whole decision — the orchestrator
//! never guesses a label.

use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use crate::brand::BrandProfile;
use crate::config::{DraftFailureMode, TriageConfig};
use crate::error::{TriageError, TriageStage};
use crate::triage::classifier::Classifier;
use crate::triage::drafter::ReplyDrafter;
use crate::triage::rules::SignalRules;
use crate::triage::types::{EscalationReason, InboundMessage, Label, TriageDecision};

/// Orchestrates one triage decision per inbound message.
///
/// Decisions are independent across messages; the only shared state is
/// the read-only brand snapshot passed into each call, so instances
/// can serve concurrent messages without locking.
pub struct TriageOrchestrator {
    classifier: Arc<dyn Classifier>,
    drafter: Arc<dyn ReplyDrafter>,
    rules: SignalRules,
    config: TriageConfig,
}

impl TriageOrchestrator {
    /// Create an orchestrator with the default signal rules.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        drafter: Arc<dyn ReplyDrafter>,
        config: TriageConfig,
    ) -> Self {
        Self {
            classifier,
            drafter,
            rules: SignalRules::default_rules(),
            config,
        }
    }

    /// Replace the signal rules (e.g. `SignalRules::empty()` to force
    /// every message through the classifier).
    pub fn with_rules(mut self, rules: SignalRules) -> Self {
        self.rules = rules;
        self
    }

    /// Triage one message against a brand snapshot.
    ///
    /// Cancellation is cooperative: callers that no longer need the
    /// result should let the in-flight call complete and drop the
    /// decision, rather than aborting mid-stage.
    pub async fn decide(
        &self,
        message: &InboundMessage,
        brand: &BrandProfile,
    ) -> Result<TriageDecision, TriageError> {
        message.validate()?;

        info!(
            id = %message.id,
            platform = %message.platform,
            sender = %message.sender,
            "Triaging inbound message"
        );

        // Step 1: deterministic signal rules (no LLM)
        let (label, classify_retries) = if let Some(label) = self.rules.evaluate(message) {
            (label, 0)
        } else {
            // Step 2: classification
            let classifier = &self.classifier;
            let (result, retries) = self
                .run_stage(TriageStage::Classification, self.config.classify_timeout, || {
                    classifier.classify(message)
                })
                .await;

            match result {
                Ok(label) => (label, retries),
                // Fail closed: the provider refused even to look at the
                // content, so a human has to.
                Err(TriageError::SafetyBlocked { reason }) => {
                    warn!(id = %message.id, reason = %reason, "Classification safety-blocked, escalating");
                    return Ok(TriageDecision::escalated(
                        message,
                        Label::Sensitive,
                        EscalationReason::SafetyBlocked,
                        retries,
                    ));
                }
                Err(e @ TriageError::Validation { .. }) => return Err(e),
                // Retries exhausted or a non-recoverable failure: the
                // whole decision fails, no guessed label.
                Err(e) => {
                    return Err(TriageError::Failed {
                        stage: TriageStage::Classification,
                        reason: e.to_string(),
                    });
                }
            }
        };

        // Step 3: gate
        if label.requires_human() {
            info!(id = %message.id, label = %label, "Gated label, escalating to human queue");
            return Ok(TriageDecision::escalated(
                message,
                label,
                EscalationReason::GatedLabel,
                classify_retries,
            ));
        }

        // Step 4: drafting
        let drafter = &self.drafter;
        let (result, draft_retries) = self
            .run_stage(TriageStage::Drafting, self.config.draft_timeout, || {
                drafter.draft(label, message, brand)
            })
            .await;
        let retries = classify_retries + draft_retries;

        match result {
            Ok(draft) => {
                info!(
                    id = %message.id,
                    label = %label,
                    confidence = draft.confidence,
                    "Decision drafted"
                );
                Ok(TriageDecision::drafted(
                    message,
                    label,
                    draft.reply,
                    draft.confidence,
                    retries,
                ))
            }
            Err(TriageError::SafetyBlocked { reason }) => {
                warn!(id = %message.id, reason = %reason, "Drafting safety-blocked, escalating");
                Ok(TriageDecision::escalated(
                    message,
                    label,
                    EscalationReason::SafetyBlocked,
                    retries,
                ))
            }
            // Gate violation is a programming error — propagate, don't mask.
            Err(e @ TriageError::InvalidLabelForDrafting { .. }) => Err(e),
            Err(e) => match self.config.on_draft_failure {
                DraftFailureMode::Escalate => {
                    warn!(
                        id = %message.id,
                        label = %label,
                        error = %e,
                        "Drafting failed, downgrading to escalation"
                    );
                    Ok(TriageDecision::escalated(
                        message,
                        label,
                        EscalationReason::DraftingFailed,
                        retries,
                    ))
                }
                DraftFailureMode::Surface => Err(TriageError::Failed {
                    stage: TriageStage::Drafting,
                    reason: e.to_string(),
                }),
            },
        }
    }

    /// Triage a batch of messages concurrently against one brand
    /// snapshot. Results keep input order; failures on individual
    /// messages don't affect the rest.
    pub async fn decide_batch(
        &self,
        messages: &[InboundMessage],
        brand: &BrandProfile,
    ) -> Vec<Result<TriageDecision, TriageError>> {
        let count = messages.len();
        info!(count, "Triaging message batch");
        futures::future::join_all(messages.iter().map(|message| self.decide(message, brand)))
            .await
    }

    /// Run one pipeline stage with a per-call timeout and bounded
    /// retry-with-backoff for transient failures. Returns the final
    /// result and how many retries occurred, so retried decisions are
    /// surfaced rather than silent. Never retries validation, safety,
    /// or contract errors.
    async fn run_stage<T, F, Fut>(
        &self,
        stage: TriageStage,
        timeout: std::time::Duration,
        mut call: F,
    ) -> (Result<T, TriageError>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TriageError>>,
    {
        let mut retries = 0u32;
        let mut attempt = 1u32;
        loop {
            let result = match tokio::time::timeout(timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(stage_timeout_error(stage, timeout)),
            };

            match result {
                Ok(value) => return (Ok(value), retries),
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    let backoff = self.config.retry_backoff * 2u32.pow(attempt - 1);
                    warn!(
                        stage = %stage,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying with backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                    retries += 1;
                }
                Err(e) => return (Err(e), retries),
            }
        }
    }
}

fn stage_timeout_error(stage: TriageStage, timeout: std::time::Duration) -> TriageError {
    let reason = format!("timed out after {:?}", timeout);
    match stage {
        TriageStage::Classification => TriageError::ClassificationUnavailable { reason },
        TriageStage::Drafting => TriageError::DraftingUnavailable { reason },
    }
}
