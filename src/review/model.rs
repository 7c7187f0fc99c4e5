//! Review card data model — triage decisions shaped for human review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::triage::types::{
    EscalationReason, InboundMessage, Label, Outcome, Platform, TriageDecision,
};

/// Status of a review card in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    /// Waiting for user action.
    Pending,
    /// Approved — reply will be delivered.
    Approved,
    /// User dismissed the card.
    Dismissed,
    /// Card expired without action.
    Expired,
    /// Reply was delivered to the platform.
    Sent,
}

/// What kind of review this card asks for.
///
/// Escalations get a dedicated affordance in the UI — not a blank
/// reply box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    /// A drafted reply awaiting approve/edit/dismiss.
    Reply,
    /// Needs a human to act; there is no draft.
    Escalation,
}

/// A triage decision queued for human review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCard {
    /// Unique card ID.
    pub id: Uuid,
    /// ID of the inbound message this card reviews.
    pub message_id: String,
    /// Platform the message arrived from.
    pub platform: Platform,
    /// Who sent the original message.
    pub sender: String,
    /// The message being replied to.
    pub source_message: String,
    /// Classification label.
    pub label: Label,
    /// Reply vs escalation.
    pub kind: CardKind,
    /// Why this card is an escalation (when it is one).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<EscalationReason>,
    /// Draft reply text; empty for escalations until a human edits.
    pub suggested_reply: String,
    /// Drafter confidence (0.0–1.0); 0.0 for escalations.
    pub confidence: f32,
    /// Current card status.
    pub status: CardStatus,
    /// When the card was created.
    pub created_at: DateTime<Utc>,
    /// When the card expires (auto-dismiss).
    pub expires_at: DateTime<Utc>,
    /// When the card was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ReviewCard {
    /// Build a pending card from a triage decision.
    pub fn from_decision(
        message: &InboundMessage,
        decision: &TriageDecision,
        expire_minutes: u32,
    ) -> Self {
        let (kind, escalation_reason) = match decision.outcome {
            Outcome::Drafted => (CardKind::Reply, None),
            Outcome::Escalated { reason } => (CardKind::Escalation, Some(reason)),
        };
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            message_id: message.id.clone(),
            platform: message.platform,
            sender: message.sender.clone(),
            source_message: message.text.clone(),
            label: decision.label,
            kind,
            escalation_reason,
            suggested_reply: decision.suggested_reply.clone(),
            confidence: decision.confidence.clamp(0.0, 1.0),
            status: CardStatus::Pending,
            created_at: now,
            expires_at: now + chrono::Duration::minutes(expire_minutes as i64),
            updated_at: now,
        }
    }

    /// Check if this card has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Actions a client can take on a card.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CardAction {
    /// Approve and deliver the suggested reply.
    Approve { card_id: Uuid },
    /// Dismiss the card without replying.
    Dismiss { card_id: Uuid },
    /// Edit the reply text, then approve.
    Edit { card_id: Uuid, new_text: String },
}

/// Messages sent over WebSocket (server → client).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// A new card is available.
    NewCard { card: ReviewCard },
    /// A card's status changed.
    CardUpdate { id: Uuid, status: CardStatus },
    /// A card expired.
    CardExpired { id: Uuid },
    /// Full queue sync (sent on connect).
    CardsSync { cards: Vec<ReviewCard> },
    /// Keepalive ping.
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::types::{EscalationReason, Label, Platform};

    fn make_message(text: &str) -> InboundMessage {
        InboundMessage::new("m-1", Platform::Instagram, "ayse_y", text)
    }

    #[test]
    fn drafted_decision_becomes_reply_card() {
        let msg = make_message("Fiyat nedir?");
        let decision = TriageDecision::drafted(&msg, Label::Faq, "129,99 TL.", 0.95, 0);
        let card = ReviewCard::from_decision(&msg, &decision, 60);

        assert_eq!(card.kind, CardKind::Reply);
        assert_eq!(card.status, CardStatus::Pending);
        assert_eq!(card.suggested_reply, "129,99 TL.");
        assert!(card.escalation_reason.is_none());
        assert!(!card.is_expired());
        assert!(card.expires_at > card.created_at);
    }

    #[test]
    fn escalated_decision_becomes_escalation_card() {
        let msg = make_message("Avukatımla görüşeceğim");
        let decision =
            TriageDecision::escalated(&msg, Label::Sensitive, EscalationReason::GatedLabel, 0);
        let card = ReviewCard::from_decision(&msg, &decision, 60);

        assert_eq!(card.kind, CardKind::Escalation);
        assert_eq!(card.escalation_reason, Some(EscalationReason::GatedLabel));
        assert_eq!(card.suggested_reply, "");
        assert_eq!(card.confidence, 0.0);
    }

    #[test]
    fn card_serializes_kind_distinguishably() {
        let msg = make_message("şikayet!");
        let decision =
            TriageDecision::escalated(&msg, Label::Complaint, EscalationReason::GatedLabel, 0);
        let card = ReviewCard::from_decision(&msg, &decision, 60);

        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["kind"], "escalation");
        assert_eq!(json["escalation_reason"], "gated_label");
        assert_eq!(json["label"], "complaint");
    }

    #[test]
    fn card_action_serde_roundtrip() {
        let action = CardAction::Edit {
            card_id: Uuid::new_v4(),
            new_text: "edited".into(),
        };
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains("\"action\":\"edit\""));
        let parsed: CardAction = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, CardAction::Edit { .. }));
    }

    #[test]
    fn ws_message_serde_roundtrip() {
        let msg = make_message("hello");
        let decision = TriageDecision::drafted(&msg, Label::Engagement, "hi!", 0.9, 0);
        let card = ReviewCard::from_decision(&msg, &decision, 15);
        let ws = WsMessage::NewCard { card };

        let json = serde_json::to_string(&ws).unwrap();
        assert!(json.contains("\"type\":\"new_card\""));

        let parsed: WsMessage = serde_json::from_str(&json).unwrap();
        match parsed {
            WsMessage::NewCard { card } => assert_eq!(card.sender, "ayse_y"),
            _ => panic!("Expected NewCard"),
        }
    }
}
