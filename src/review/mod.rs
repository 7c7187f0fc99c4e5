//! Human review queue — every triage decision lands here.
//!
//! Cards carry either a draft reply (approve/edit/dismiss) or an
//! escalation marker (a human writes the reply, or dismisses). The
//! queue broadcasts state changes to connected WebSocket clients.

pub mod model;
pub mod queue;
pub mod ws;

pub use model::{CardAction, CardKind, CardStatus, ReviewCard, WsMessage};
pub use queue::{ReviewQueue, spawn_expiry_task};
pub use ws::{AppState, inbox_routes};
