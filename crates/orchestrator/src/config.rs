//! Configuration for the turn orchestrator.

use std::env;
use std::time::Duration;

use tracing::warn;

/// Default number of transcript entries shown to the models.
pub const DEFAULT_HISTORY_LENGTH: usize = 25;
/// Default attempt budget for speaker selection and generation.
pub const DEFAULT_ATTEMPTS: u32 = 3;
/// Default per-call timeout in seconds.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;
/// Default speaker used when selection keeps failing.
pub const DEFAULT_FALLBACK_SPEAKER: &str = "Narrator";
/// Default latest-user line for continue turns.
pub const DEFAULT_CONTINUE_PLACEHOLDER: &str = "(continue)";

/// Which load-spreading policy the model pool uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolPolicyKind {
    /// Uniform random among active endpoints.
    #[default]
    Random,
    /// Oldest (or never) used endpoint first.
    LeastRecentlyUsed,
    /// Lowest usage counter first.
    LeastUsed,
}

impl PoolPolicyKind {
    /// Parse a policy name (`random`, `lru`, `least_used`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "random" => Some(Self::Random),
            "lru" | "least_recently_used" => Some(Self::LeastRecentlyUsed),
            "least_used" | "least-used" => Some(Self::LeastUsed),
            _ => None,
        }
    }
}

/// Configuration for the Orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Transcript entries included in selection and generation prompts.
    pub history_length: usize,

    /// Attempts for speaker selection before falling back.
    pub selection_attempts: u32,

    /// Attempts to open a generation stream before surfacing the error.
    pub generation_attempts: u32,

    /// Timeout for each model call (and each wait for a streamed chunk).
    pub call_timeout: Duration,

    /// Speaker named when selection keeps failing.
    pub fallback_speaker: String,

    /// Latest-user line used for continue turns.
    pub continue_placeholder: String,

    /// Endpoint selection policy.
    pub pool_policy: PoolPolicyKind,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            history_length: DEFAULT_HISTORY_LENGTH,
            selection_attempts: DEFAULT_ATTEMPTS,
            generation_attempts: DEFAULT_ATTEMPTS,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            fallback_speaker: DEFAULT_FALLBACK_SPEAKER.to_string(),
            continue_placeholder: DEFAULT_CONTINUE_PLACEHOLDER.to_string(),
            pool_policy: PoolPolicyKind::Random,
        }
    }
}

impl OrchestratorConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `TROUPE_HISTORY_LENGTH` - History window size (default: 25)
    /// - `TROUPE_SELECTION_ATTEMPTS` - Speaker selection attempts (default: 3)
    /// - `TROUPE_GENERATION_ATTEMPTS` - Generation attempts (default: 3)
    /// - `TROUPE_CALL_TIMEOUT_SECS` - Per-call timeout (default: 60)
    /// - `TROUPE_FALLBACK_SPEAKER` - Fallback speaker name (default: Narrator)
    /// - `TROUPE_CONTINUE_PLACEHOLDER` - Continue-turn user line (default: "(continue)")
    /// - `TROUPE_POOL_POLICY` - `random`, `lru` or `least_used` (default: random)
    ///
    /// Unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let history_length = env::var("TROUPE_HISTORY_LENGTH")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.history_length);

        let selection_attempts = env::var("TROUPE_SELECTION_ATTEMPTS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.selection_attempts);

        let generation_attempts = env::var("TROUPE_GENERATION_ATTEMPTS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.generation_attempts);

        let call_timeout = env::var("TROUPE_CALL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.call_timeout);

        let fallback_speaker = env::var("TROUPE_FALLBACK_SPEAKER")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.fallback_speaker);

        let continue_placeholder = env::var("TROUPE_CONTINUE_PLACEHOLDER")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.continue_placeholder);

        let pool_policy = match env::var("TROUPE_POOL_POLICY") {
            Ok(value) => PoolPolicyKind::parse(&value).unwrap_or_else(|| {
                warn!(value = %value, "Unknown TROUPE_POOL_POLICY, using random");
                PoolPolicyKind::Random
            }),
            Err(_) => defaults.pool_policy,
        };

        Self {
            history_length,
            selection_attempts: selection_attempts.max(1),
            generation_attempts: generation_attempts.max(1),
            call_timeout,
            fallback_speaker,
            continue_placeholder,
            pool_policy,
        }
    }

    /// Create a new config builder.
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::default()
    }
}

/// Builder for OrchestratorConfig.
#[derive(Debug, Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    /// Set the history window size.
    pub fn history_length(mut self, length: usize) -> Self {
        self.config.history_length = length;
        self
    }

    /// Set the speaker selection attempt budget (at least 1).
    pub fn selection_attempts(mut self, attempts: u32) -> Self {
        self.config.selection_attempts = attempts.max(1);
        self
    }

    /// Set the generation attempt budget (at least 1).
    pub fn generation_attempts(mut self, attempts: u32) -> Self {
        self.config.generation_attempts = attempts.max(1);
        self
    }

    /// Set the per-call timeout.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    /// Set the fallback speaker name.
    pub fn fallback_speaker(mut self, name: impl Into<String>) -> Self {
        self.config.fallback_speaker = name.into();
        self
    }

    /// Set the continue-turn placeholder.
    pub fn continue_placeholder(mut self, text: impl Into<String>) -> Self {
        self.config.continue_placeholder = text.into();
        self
    }

    /// Set the pool policy.
    pub fn pool_policy(mut self, policy: PoolPolicyKind) -> Self {
        self.config.pool_policy = policy;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> OrchestratorConfig {
        self.config
    }
}
