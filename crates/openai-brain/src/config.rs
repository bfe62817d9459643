//! Configuration for OpenAiBrain.

use brain_core::BrainError;
use std::env;
use std::time::Duration;

/// Default TCP connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default User-Agent header.
pub const DEFAULT_USER_AGENT: &str = concat!("troupe-openai-brain/", env!("CARGO_PKG_VERSION"));

/// Configuration for OpenAiBrain.
///
/// Per-call timeouts are applied by the caller; this only bounds connection
/// setup so a dead host fails fast.
#[derive(Debug, Clone)]
pub struct OpenAiBrainConfig {
    /// Connect timeout for the HTTP client.
    pub connect_timeout: Duration,

    /// User-Agent sent with every request.
    pub user_agent: String,
}

impl Default for OpenAiBrainConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl OpenAiBrainConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `OPENAI_BRAIN_CONNECT_TIMEOUT_SECS` - Connect timeout (default: 10)
    /// - `OPENAI_BRAIN_USER_AGENT` - User-Agent header
    pub fn from_env() -> Result<Self, BrainError> {
        let connect_timeout_secs = match env::var("OPENAI_BRAIN_CONNECT_TIMEOUT_SECS") {
            Ok(value) => value.trim().parse::<u64>().map_err(|_| {
                BrainError::Configuration(format!(
                    "OPENAI_BRAIN_CONNECT_TIMEOUT_SECS must be a whole number of seconds, got {:?}",
                    value
                ))
            })?,
            Err(_) => DEFAULT_CONNECT_TIMEOUT_SECS,
        };

        if connect_timeout_secs == 0 {
            return Err(BrainError::Configuration(
                "OPENAI_BRAIN_CONNECT_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        let user_agent = env::var("OPENAI_BRAIN_USER_AGENT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        Ok(Self {
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            user_agent,
        })
    }

    /// Create a new config builder.
    pub fn builder() -> OpenAiBrainConfigBuilder {
        OpenAiBrainConfigBuilder::default()
    }
}

/// Builder for OpenAiBrainConfig.
#[derive(Debug, Default)]
pub struct OpenAiBrainConfigBuilder {
    config: OpenAiBrainConfig,
}

impl OpenAiBrainConfigBuilder {
    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the configuration.
    pub fn build(self) -> OpenAiBrainConfig {
        self.config
    }
}
