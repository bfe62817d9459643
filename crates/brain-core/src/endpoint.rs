//! Credentialed model endpoints and their sampling parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default sampling temperature when an endpoint leaves it unset.
const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Default completion budget when an endpoint leaves it unset.
const DEFAULT_MAX_TOKENS: u32 = 2000;
/// Default nucleus sampling value when an endpoint leaves it unset.
const DEFAULT_TOP_P: f32 = 1.0;

/// What an endpoint is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityClass {
    /// Character dialogue generation (streaming).
    Dialogue,
    /// Small utility calls such as speaker selection.
    Utility,
    /// Text to image generation.
    TextToImage,
    /// Image to text description.
    ImageToText,
}

impl CapabilityClass {
    /// Stable string form used in storage and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dialogue => "dialogue",
            Self::Utility => "utility",
            Self::TextToImage => "t2i",
            Self::ImageToText => "i2t",
        }
    }

    /// Parse the storage form. Accepts the legacy `chat`/`other` names too.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "dialogue" | "chat" => Some(Self::Dialogue),
            "utility" | "other" => Some(Self::Utility),
            "t2i" | "text_to_image" => Some(Self::TextToImage),
            "i2t" | "image_to_text" => Some(Self::ImageToText),
            _ => None,
        }
    }
}

impl std::fmt::Display for CapabilityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an endpoint may be picked.
///
/// Only an external admin process flips endpoints to `Inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    #[default]
    Active,
    Inactive,
}

impl EndpointStatus {
    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// Parse the storage form; anything unknown is treated as inactive.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("active") {
            Self::Active
        } else {
            Self::Inactive
        }
    }
}

/// Sampling parameters sent with every request to an endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
}

impl SamplingParams {
    /// Temperature, falling back to 0.7.
    pub fn temperature_or_default(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    /// Max tokens, falling back to 2000.
    pub fn max_tokens_or_default(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    /// Top-p, falling back to 1.0.
    pub fn top_p_or_default(&self) -> f32 {
        self.top_p.unwrap_or(DEFAULT_TOP_P)
    }

    /// Presence penalty, falling back to 0.0.
    pub fn presence_penalty_or_default(&self) -> f32 {
        self.presence_penalty.unwrap_or(0.0)
    }

    /// Frequency penalty, falling back to 0.0.
    pub fn frequency_penalty_or_default(&self) -> f32 {
        self.frequency_penalty.unwrap_or(0.0)
    }
}

/// A callable language-model credential plus its usage accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEndpoint {
    /// Unique endpoint identifier (e.g. "deepseek-chat-1").
    pub id: String,
    /// Capability class this endpoint serves.
    pub capability: CapabilityClass,
    /// Base URL of an OpenAI-compatible API (e.g. "https://api.openai.com/v1").
    pub base_url: String,
    /// Bearer credential.
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Model name passed to the API.
    pub model: String,
    /// Sampling parameters.
    #[serde(default)]
    pub sampling: SamplingParams,
    /// Number of calls accounted against this endpoint.
    #[serde(default)]
    pub usage_count: i64,
    /// When the endpoint was last used, if ever.
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    /// Active/inactive flag.
    #[serde(default)]
    pub status: EndpointStatus,
}

impl ModelEndpoint {
    /// Create an active, unused endpoint with default sampling.
    pub fn new(
        id: impl Into<String>,
        capability: CapabilityClass,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            capability,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            sampling: SamplingParams::default(),
            usage_count: 0,
            last_used: None,
            status: EndpointStatus::Active,
        }
    }

    /// Replace the sampling parameters.
    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    /// Whether the endpoint may be selected.
    pub fn is_active(&self) -> bool {
        self.status == EndpointStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_round_trip_and_legacy_names() {
        for class in [
            CapabilityClass::Dialogue,
            CapabilityClass::Utility,
            CapabilityClass::TextToImage,
            CapabilityClass::ImageToText,
        ] {
            assert_eq!(CapabilityClass::parse(class.as_str()), Some(class));
        }
        assert_eq!(CapabilityClass::parse("chat"), Some(CapabilityClass::Dialogue));
        assert_eq!(CapabilityClass::parse("OTHER"), Some(CapabilityClass::Utility));
        assert_eq!(CapabilityClass::parse("video"), None);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(EndpointStatus::parse("active"), EndpointStatus::Active);
        assert_eq!(EndpointStatus::parse("inactive"), EndpointStatus::Inactive);
        assert_eq!(EndpointStatus::parse("paused"), EndpointStatus::Inactive);
    }

    #[test]
    fn test_sampling_defaults() {
        let sampling = SamplingParams::default();
        assert_eq!(sampling.temperature_or_default(), 0.7);
        assert_eq!(sampling.max_tokens_or_default(), 2000);
        assert_eq!(sampling.top_p_or_default(), 1.0);
        assert_eq!(sampling.presence_penalty_or_default(), 0.0);
        assert_eq!(sampling.frequency_penalty_or_default(), 0.0);
    }

    #[test]
    fn test_new_endpoint_is_active_and_unused() {
        let endpoint = ModelEndpoint::new(
            "chat-1",
            CapabilityClass::Dialogue,
            "https://api.example.com/v1",
            "sk-test",
            "deepseek-chat",
        );
        assert!(endpoint.is_active());
        assert_eq!(endpoint.usage_count, 0);
        assert!(endpoint.last_used.is_none());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let endpoint = ModelEndpoint::new(
            "chat-1",
            CapabilityClass::Dialogue,
            "https://api.example.com/v1",
            "sk-secret",
            "deepseek-chat",
        );
        let json = serde_json::to_string(&endpoint).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
