//! WebSocket server + REST endpoints for the triage inbox.
//!
//! `POST /api/messages` runs the triage pipeline on an inbound message
//! and enqueues the resulting card; the rest of the surface is the
//! review workflow (list, approve, dismiss, edit, live WS feed) plus
//! brand settings and simulated platform connections.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::{CardAction, ReviewCard, WsMessage};
use super::queue::ReviewQueue;
use crate::brand::BrandProfile;
use crate::connectors::ConnectorHub;
use crate::error::TriageError;
use crate::triage::orchestrator::TriageOrchestrator;
use crate::triage::types::{InboundMessage, Platform};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<ReviewQueue>,
    pub orchestrator: Arc<TriageOrchestrator>,
    pub brand: Arc<tokio::sync::RwLock<BrandProfile>>,
    pub connectors: Arc<ConnectorHub>,
    /// Card expiry applied to newly triaged messages.
    pub card_expire_minutes: u32,
}

/// Build the Axum router with triage, card, brand, and connector routes.
pub fn inbox_routes(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/api/messages", post(triage_message))
        .route("/api/cards", get(list_cards))
        .route("/api/cards/{id}/approve", post(approve_card))
        .route("/api/cards/{id}/dismiss", post(dismiss_card))
        .route("/api/cards/{id}/edit", post(edit_card))
        .route("/api/brand", get(get_brand).put(put_brand))
        .route("/api/connections", get(list_connections))
        .route("/api/connections/{platform}/connect", post(connect_platform))
        .route("/api/connections/{platform}/disconnect", post(disconnect_platform))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "inbox-pilot"
    }))
}

// ── Triage entry ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TriageRequest {
    /// Platform-native message ID; generated when omitted.
    #[serde(default)]
    id: Option<String>,
    platform: Platform,
    sender: String,
    #[serde(default)]
    sender_name: Option<String>,
    text: String,
}

async fn triage_message(
    State(state): State<AppState>,
    Json(body): Json<TriageRequest>,
) -> impl IntoResponse {
    let mut message = InboundMessage::new(
        body.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        body.platform,
        body.sender,
        body.text,
    );
    message.sender_name = body.sender_name;

    let brand = state.brand.read().await.clone();
    match state.orchestrator.decide(&message, &brand).await {
        Ok(decision) => {
            let card = ReviewCard::from_decision(&message, &decision, state.card_expire_minutes);
            let card_id = card.id;
            state.queue.push(card).await;
            (
                StatusCode::CREATED,
                Json(serde_json::json!({"card_id": card_id, "decision": decision})),
            )
        }
        Err(TriageError::Validation { field, reason }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": format!("invalid {field}: {reason}")})),
        ),
        Err(e @ TriageError::Failed { .. }) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({"error": e.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        ),
    }
}

// ── WebSocket ───────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    info!("WebSocket client connected");

    // Send all pending cards on connect
    let pending = state.queue.pending().await;
    let sync_msg = WsMessage::CardsSync { cards: pending };
    if let Ok(json) = serde_json::to_string(&sync_msg) {
        if socket.send(Message::Text(json.into())).await.is_err() {
            warn!("Failed to send initial sync, client disconnected");
            return;
        }
    }

    // Subscribe to broadcast channel for real-time updates
    let mut rx = state.queue.subscribe();

    loop {
        tokio::select! {
            // Forward broadcast events to this client
            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if let Ok(json) = serde_json::to_string(&msg) {
                            if socket.send(Message::Text(json.into())).await.is_err() {
                                debug!("Client disconnected during send");
                                break;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "WS client lagged behind broadcast");
                        // Re-sync by sending all pending cards
                        let pending = state.queue.pending().await;
                        let sync = WsMessage::CardsSync { cards: pending };
                        if let Ok(json) = serde_json::to_string(&sync) {
                            if socket.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }

            // Receive actions from client
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(&text, &state).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

async fn handle_client_message(text: &str, state: &AppState) {
    match serde_json::from_str::<CardAction>(text) {
        Ok(action) => match action {
            CardAction::Approve { card_id } => {
                if let Some(card) = state.queue.approve(card_id).await {
                    info!(card_id = %card_id, "Card approved via WS");
                    deliver_card_reply(&card, state).await;
                } else {
                    warn!(card_id = %card_id, "Approve failed — card not found, not pending, or has no reply");
                }
            }
            CardAction::Dismiss { card_id } => {
                if state.queue.dismiss(card_id).await {
                    info!(card_id = %card_id, "Card dismissed via WS");
                } else {
                    warn!(card_id = %card_id, "Dismiss failed — card not found or not pending");
                }
            }
            CardAction::Edit { card_id, new_text } => {
                if let Some(card) = state.queue.edit(card_id, new_text).await {
                    info!(card_id = %card_id, "Card edited and approved via WS");
                    deliver_card_reply(&card, state).await;
                } else {
                    warn!(card_id = %card_id, "Edit failed — card not found or not pending");
                }
            }
        },
        Err(e) => {
            debug!(error = %e, text = text, "Unrecognized WS message from client");
        }
    }
}

/// Deliver an approved/edited card's reply through the (simulated)
/// platform connector and mark the card sent on success.
async fn deliver_card_reply(card: &ReviewCard, state: &AppState) {
    match state
        .connectors
        .deliver_reply(card.platform, &card.sender, &card.suggested_reply)
        .await
    {
        Ok(()) => {
            state.queue.mark_sent(card.id).await;
            info!(card_id = %card.id, platform = %card.platform, "Reply delivered");
        }
        Err(e) => {
            warn!(
                card_id = %card.id,
                platform = %card.platform,
                error = %e,
                "Reply approved but delivery failed — card stays approved"
            );
        }
    }
}

// ── REST: cards ─────────────────────────────────────────────────────

async fn list_cards(State(state): State<AppState>) -> impl IntoResponse {
    let cards = state.queue.pending().await;
    Json(cards)
}

async fn approve_card(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let card_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid card ID"})),
            );
        }
    };

    match state.queue.approve(card_id).await {
        Some(card) => {
            deliver_card_reply(&card, &state).await;
            (StatusCode::OK, Json(serde_json::json!(card)))
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Card not found, not pending, or has no reply"})),
        ),
    }
}

async fn dismiss_card(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let card_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid card ID"})),
            );
        }
    };

    if state.queue.dismiss(card_id).await {
        (
            StatusCode::OK,
            Json(serde_json::json!({"status": "dismissed"})),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Card not found or not pending"})),
        )
    }
}

#[derive(Deserialize)]
struct EditRequest {
    text: String,
}

async fn edit_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<EditRequest>,
) -> impl IntoResponse {
    let card_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid card ID"})),
            );
        }
    };

    match state.queue.edit(card_id, body.text).await {
        Some(card) => {
            deliver_card_reply(&card, &state).await;
            (StatusCode::OK, Json(serde_json::json!(card)))
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Card not found or not pending"})),
        ),
    }
}

// ── REST: brand settings ────────────────────────────────────────────

async fn get_brand(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.brand.read().await.clone())
}

async fn put_brand(
    State(state): State<AppState>,
    Json(profile): Json<BrandProfile>,
) -> impl IntoResponse {
    info!(
        business = %profile.business_name,
        facts = profile.facts.len(),
        "Brand profile replaced"
    );
    *state.brand.write().await = profile;
    StatusCode::NO_CONTENT
}

// ── REST: connections ───────────────────────────────────────────────

async fn list_connections(State(state): State<AppState>) -> impl IntoResponse {
    let connections = state.connectors.connections().await;
    let list: Vec<serde_json::Value> = connections
        .into_iter()
        .map(|(platform, account)| {
            serde_json::json!({"platform": platform, "account_name": account})
        })
        .collect();
    Json(list)
}

async fn connect_platform(
    State(state): State<AppState>,
    Path(platform): Path<String>,
) -> impl IntoResponse {
    let platform: Platform = match platform.parse() {
        Ok(p) => p,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Unknown platform"})),
            );
        }
    };

    match state.connectors.connect(platform).await {
        Ok(account_name) => (
            StatusCode::OK,
            Json(serde_json::json!({"platform": platform, "account_name": account_name})),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": e.to_string()})),
        ),
    }
}

async fn disconnect_platform(
    State(state): State<AppState>,
    Path(platform): Path<String>,
) -> impl IntoResponse {
    let platform: Platform = match platform.parse() {
        Ok(p) => p,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Unknown platform"})),
            );
        }
    };

    state.connectors.disconnect(platform).await;
    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "disconnected"})),
    )
}
