//! Message triage — the classify → gate → draft decision pipeline.
//!
//! Every inbound message flows through:
//! 1. `InboundMessage::validate()` — reject malformed input, no external calls
//! 2. `SignalRules::evaluate()` — deterministic fast path (no LLM)
//! 3. `Classifier::classify()` — one label per message
//! 4. The gating invariant — Complaint/Sensitive never reach the drafter
//! 5. `ReplyDrafter::draft()` — fact-grounded reply + confidence
//!
//! **No auto-send path exists.** Every decision lands in the review
//! queue for a human to approve, edit, or dismiss.

pub mod classifier;
pub mod drafter;
pub mod orchestrator;
pub mod rules;
pub mod types;

pub use classifier::{Classifier, LlmClassifier};
pub use drafter::{LlmDrafter, ReplyDraft, ReplyDrafter};
pub use orchestrator::TriageOrchestrator;
pub use rules::SignalRules;
pub use types::{
    EscalationReason, InboundMessage, Label, Outcome, Platform, TriageDecision,
};
