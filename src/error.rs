//! Error types for inbox-pilot.

use std::time::Duration;

use crate::triage::types::{Label, Platform};

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Triage error: {0}")]
    Triage(#[from] TriageError),

    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} refused the content: {reason}")]
    Refused { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Whether a retry with backoff could plausibly succeed.
    ///
    /// Refusals and auth failures are deterministic — retrying them
    /// burns quota without changing the outcome.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed { .. } | Self::RateLimited { .. } | Self::Timeout { .. }
        )
    }
}

/// Triage policy errors — the taxonomy the decision pipeline speaks.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    /// Malformed input message. Rejected before any external call,
    /// surfaced to the caller, never retried.
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// The classification service is unavailable (timeout, rate limit,
    /// transport error). Recoverable via caller-controlled retry.
    #[error("Classification unavailable: {reason}")]
    ClassificationUnavailable { reason: String },

    /// The drafting service is unavailable. Recoverable via retry.
    #[error("Drafting unavailable: {reason}")]
    DraftingUnavailable { reason: String },

    /// The model service refused to process the content on safety
    /// grounds. Must map to an escalated outcome, never be swallowed
    /// or retried.
    #[error("Content blocked by model safety filtering: {reason}")]
    SafetyBlocked { reason: String },

    /// The drafter was invoked for a gated label. Programming error,
    /// not user-facing.
    #[error("Drafter invoked for gated label {label}")]
    InvalidLabelForDrafting { label: Label },

    /// Terminal failure of a whole triage decision after retries were
    /// exhausted.
    #[error("Triage failed during {stage}: {reason}")]
    Failed { stage: TriageStage, reason: String },
}

impl TriageError {
    /// Whether the orchestrator may retry the failed call.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ClassificationUnavailable { .. } | Self::DraftingUnavailable { .. }
        )
    }
}

/// Which pipeline stage a terminal triage failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriageStage {
    Classification,
    Drafting,
}

impl std::fmt::Display for TriageStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classification => write!(f, "classification"),
            Self::Drafting => write!(f, "drafting"),
        }
    }
}

/// Simulated platform connector errors.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("Platform {platform} is not connected")]
    NotConnected { platform: Platform },

    #[error("Platform {platform} is busy: {reason}")]
    PlatformBusy { platform: Platform, reason: String },

    #[error("Delivery to {platform} failed: {reason}")]
    DeliveryFailed { platform: Platform, reason: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
