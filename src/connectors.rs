//! Simulated social-platform connectors.
//!
//! Stands in for a backend that would run the real OAuth 2.0 flows and
//! platform send APIs. Connections live in memory, calls have fake
//! latency, and Instagram occasionally reports "busy" so callers
//! exercise their transient-failure paths.

use std::collections::HashMap;

use rand::Rng;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::ConnectorError;
use crate::triage::types::Platform;

/// Simulated latency for a connect handshake.
const CONNECT_DELAY_MS: u64 = 300;
/// Simulated latency for a reply delivery.
const SEND_DELAY_MS: u64 = 150;
/// Probability that a connect attempt hits a busy platform.
const BUSY_PROBABILITY: f64 = 0.2;

/// Simulated connection state for the three supported platforms.
pub struct ConnectorHub {
    connected: RwLock<HashMap<Platform, String>>,
    /// Whether to simulate random transient failures (off in tests).
    simulate_flakiness: bool,
}

impl ConnectorHub {
    pub fn new() -> Self {
        Self {
            connected: RwLock::new(HashMap::new()),
            simulate_flakiness: true,
        }
    }

    /// A hub that never fails randomly, for deterministic tests.
    pub fn reliable() -> Self {
        Self {
            connected: RwLock::new(HashMap::new()),
            simulate_flakiness: false,
        }
    }

    /// Simulate the OAuth connect handshake. Resolves with the mock
    /// account name on success.
    pub async fn connect(&self, platform: Platform) -> Result<String, ConnectorError> {
        info!(platform = %platform, "Simulating platform connect");
        tokio::time::sleep(std::time::Duration::from_millis(CONNECT_DELAY_MS)).await;

        if self.simulate_flakiness
            && platform == Platform::Instagram
            && rand::thread_rng().gen_bool(BUSY_PROBABILITY)
        {
            return Err(ConnectorError::PlatformBusy {
                platform,
                reason: "Instagram API is busy. Please try again.".into(),
            });
        }

        let account_name = format!("My {} Account", capitalize(&platform.to_string()));
        self.connected
            .write()
            .await
            .insert(platform, account_name.clone());
        Ok(account_name)
    }

    /// Simulate revoking the token and dropping the connection.
    pub async fn disconnect(&self, platform: Platform) {
        info!(platform = %platform, "Simulating platform disconnect");
        tokio::time::sleep(std::time::Duration::from_millis(CONNECT_DELAY_MS / 2)).await;
        self.connected.write().await.remove(&platform);
    }

    /// Connected account name, if any.
    pub async fn account_name(&self, platform: Platform) -> Option<String> {
        self.connected.read().await.get(&platform).cloned()
    }

    /// All current connections.
    pub async fn connections(&self) -> HashMap<Platform, String> {
        self.connected.read().await.clone()
    }

    /// Simulate delivering an approved reply through the platform.
    /// Refuses when the platform is not connected.
    pub async fn deliver_reply(
        &self,
        platform: Platform,
        recipient: &str,
        text: &str,
    ) -> Result<(), ConnectorError> {
        if self.connected.read().await.get(&platform).is_none() {
            return Err(ConnectorError::NotConnected { platform });
        }

        tokio::time::sleep(std::time::Duration::from_millis(SEND_DELAY_MS)).await;
        info!(
            platform = %platform,
            recipient = %recipient,
            reply_len = text.len(),
            "Simulated reply delivery"
        );
        Ok(())
    }
}

impl Default for ConnectorHub {
    fn default() -> Self {
        Self::new()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
