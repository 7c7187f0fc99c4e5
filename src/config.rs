//! Configuration types.

use std::time::Duration;

/// Whether Engagement replies get a follow-up question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowUpPolicy {
    /// Every Engagement reply ends with a follow-up question.
    Always,
    /// Only when it fits naturally without violating policy.
    #[default]
    WhenNatural,
    /// Never append one.
    Never,
}

impl std::str::FromStr for FollowUpPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "when_natural" => Ok(Self::WhenNatural),
            "never" => Ok(Self::Never),
            other => Err(format!("unknown follow-up policy '{}'", other)),
        }
    }
}

/// What the caller sees when drafting fails after a successful,
/// non-gated classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DraftFailureMode {
    /// Route into the human queue as an escalation-shaped decision.
    /// The escalation reason marks that drafting failed, so the
    /// routing is visible rather than silent.
    #[default]
    Escalate,
    /// Surface the failure to the caller as an error.
    Surface,
}

impl std::str::FromStr for DraftFailureMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "escalate" => Ok(Self::Escalate),
            "surface" => Ok(Self::Surface),
            other => Err(format!("unknown draft failure mode '{}'", other)),
        }
    }
}

/// Triage pipeline configuration.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// Upper bound on one classification call. Hosted model calls have
    /// no intrinsic limit; timeout counts as a transient failure.
    pub classify_timeout: Duration,
    /// Upper bound on one drafting call.
    pub draft_timeout: Duration,
    /// Total attempts per stage (1 = no retries).
    pub max_attempts: u32,
    /// Base backoff between attempts; doubles each retry.
    pub retry_backoff: Duration,
    /// Follow-up question behavior for Engagement replies.
    pub follow_up: FollowUpPolicy,
    /// Behavior when drafting fails after classification.
    pub on_draft_failure: DraftFailureMode,
    /// Review card expiry in minutes.
    pub card_expire_minutes: u32,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            classify_timeout: Duration::from_secs(20),
            draft_timeout: Duration::from_secs(30),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            follow_up: FollowUpPolicy::default(),
            on_draft_failure: DraftFailureMode::default(),
            card_expire_minutes: 60,
        }
    }
}

impl TriageConfig {
    /// Build from `INBOX_PILOT_*` environment variables, falling back
    /// to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            classify_timeout: env_secs("INBOX_PILOT_CLASSIFY_TIMEOUT_SECS")
                .unwrap_or(defaults.classify_timeout),
            draft_timeout: env_secs("INBOX_PILOT_DRAFT_TIMEOUT_SECS")
                .unwrap_or(defaults.draft_timeout),
            max_attempts: env_parse("INBOX_PILOT_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts),
            retry_backoff: env_millis("INBOX_PILOT_RETRY_BACKOFF_MS")
                .unwrap_or(defaults.retry_backoff),
            follow_up: env_parse("INBOX_PILOT_FOLLOW_UP").unwrap_or(defaults.follow_up),
            on_draft_failure: env_parse("INBOX_PILOT_ON_DRAFT_FAILURE")
                .unwrap_or(defaults.on_draft_failure),
            card_expire_minutes: env_parse("INBOX_PILOT_CARD_EXPIRE_MIN")
                .unwrap_or(defaults.card_expire_minutes),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_secs)
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}
