//! Shared types for the triage pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TriageError;

// ── Platform ────────────────────────────────────────────────────────

/// Social platform a message arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Facebook,
    Linkedin,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Instagram => write!(f, "instagram"),
            Self::Facebook => write!(f, "facebook"),
            Self::Linkedin => write!(f, "linkedin"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instagram" => Ok(Self::Instagram),
            "facebook" => Ok(Self::Facebook),
            "linkedin" => Ok(Self::Linkedin),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}

// ── Inbound message ─────────────────────────────────────────────────

/// A comment or DM pulled from a platform inbox.
///
/// Immutable once constructed; consumed exactly once by the
/// orchestrator. Ingestion (webhook or poll) happens upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform-native or generated ID.
    pub id: String,
    /// Where the message came from.
    pub platform: Platform,
    /// Sender identifier (handle or profile id).
    pub sender: String,
    /// Human-readable sender name (if available).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Message body.
    pub text: String,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Create a message received now.
    pub fn new(
        id: impl Into<String>,
        platform: Platform,
        sender: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            platform,
            sender: sender.into(),
            sender_name: None,
            text: text.into(),
            received_at: Utc::now(),
        }
    }

    /// Set the display name.
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Reject malformed messages before any external call is made.
    pub fn validate(&self) -> Result<(), TriageError> {
        if self.text.trim().is_empty() {
            return Err(TriageError::Validation {
                field: "text".into(),
                reason: "message text is empty".into(),
            });
        }
        if self.sender.trim().is_empty() {
            return Err(TriageError::Validation {
                field: "sender".into(),
                reason: "sender is empty".into(),
            });
        }
        Ok(())
    }
}

// ── Label ───────────────────────────────────────────────────────────

/// Classification label for an inbound message.
///
/// Exhaustive and mutually exclusive — every message resolves to
/// exactly one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Faq,
    Engagement,
    Complaint,
    Sensitive,
}

impl Label {
    /// Labels that gate drafting — these always go to a human.
    pub fn requires_human(&self) -> bool {
        matches!(self, Self::Complaint | Self::Sensitive)
    }

    /// Tie-break rank. When a message carries signals for more than one
    /// label, the highest rank wins: a false negative on Sensitive or
    /// Complaint is costlier than a false positive.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Sensitive => 3,
            Self::Complaint => 2,
            Self::Faq => 1,
            Self::Engagement => 0,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Faq => write!(f, "faq"),
            Self::Engagement => write!(f, "engagement"),
            Self::Complaint => write!(f, "complaint"),
            Self::Sensitive => write!(f, "sensitive"),
        }
    }
}

impl std::str::FromStr for Label {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "faq" => Ok(Self::Faq),
            "engagement" => Ok(Self::Engagement),
            "complaint" => Ok(Self::Complaint),
            "sensitive" => Ok(Self::Sensitive),
            _ => Err(format!("Unknown label: {}", s)),
        }
    }
}

// ── Decision outcome ────────────────────────────────────────────────

/// Why a decision was escalated instead of drafted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// The label itself gates drafting (Complaint/Sensitive).
    GatedLabel,
    /// Drafting failed after classification succeeded.
    DraftingFailed,
    /// The model service refused the content; fail closed.
    SafetyBlocked,
}

/// How the decision resolved.
///
/// A distinguishable signal, not just an empty reply string — the
/// review UI renders a dedicated affordance for escalations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A reply was drafted and awaits human review.
    Drafted,
    /// Routed to the human queue with no draft.
    Escalated { reason: EscalationReason },
}

// ── Triage decision ─────────────────────────────────────────────────

/// The result of triaging one inbound message.
///
/// Invariant: `label ∈ {Complaint, Sensitive}` or any escalated outcome
/// implies `suggested_reply == ""` and `confidence == 0.0`. The
/// constructors are the only way to build one, so the invariant holds
/// structurally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageDecision {
    /// ID of the message this decision is for.
    pub message_id: String,
    /// Classification label.
    pub label: Label,
    /// Draft reply, empty when escalated.
    pub suggested_reply: String,
    /// Drafter confidence in [0, 1]; 0.0 when escalated.
    pub confidence: f32,
    /// Drafted or escalated, with the escalation reason.
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Transient-failure retries that occurred while deciding. Surfaced
    /// so a retried decision is never silent.
    #[serde(default)]
    pub retries: u32,
    /// When the decision was produced.
    pub decided_at: DateTime<Utc>,
}

impl TriageDecision {
    /// Build a drafted decision. Panics in debug builds if called with
    /// a gated label — the orchestrator must never do that.
    pub fn drafted(
        message: &InboundMessage,
        label: Label,
        reply: impl Into<String>,
        confidence: f32,
        retries: u32,
    ) -> Self {
        debug_assert!(!label.requires_human(), "drafted decision for gated label");
        Self {
            message_id: message.id.clone(),
            label,
            suggested_reply: reply.into(),
            confidence: confidence.clamp(0.0, 1.0),
            outcome: Outcome::Drafted,
            retries,
            decided_at: Utc::now(),
        }
    }

    /// Build an escalated decision: empty reply, zero confidence.
    pub fn escalated(
        message: &InboundMessage,
        label: Label,
        reason: EscalationReason,
        retries: u32,
    ) -> Self {
        Self {
            message_id: message.id.clone(),
            label,
            suggested_reply: String::new(),
            confidence: 0.0,
            outcome: Outcome::Escalated { reason },
            retries,
            decided_at: Utc::now(),
        }
    }

    /// Whether this decision needs manual action.
    pub fn needs_human(&self) -> bool {
        matches!(self.outcome, Outcome::Escalated { .. })
    }
}
