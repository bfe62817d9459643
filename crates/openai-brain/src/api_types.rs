//! OpenAI chat completions request and response types.

use brain_core::{ChatTurn, ModelEndpoint};
use serde::{Deserialize, Serialize};

/// Chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Model to use
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<ChatTurn>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature for generation
    pub temperature: f32,
    /// Nucleus sampling
    pub top_p: f32,
    /// Presence penalty
    pub presence_penalty: f32,
    /// Frequency penalty
    pub frequency_penalty: f32,
    /// Whether to stream the response as SSE
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Build a request for an endpoint: system prompt first, then prior turns.
    pub fn for_endpoint(
        endpoint: &ModelEndpoint,
        system_prompt: &str,
        prior_turns: &[ChatTurn],
        stream: bool,
    ) -> Self {
        let mut messages = Vec::with_capacity(prior_turns.len() + 1);
        messages.push(ChatTurn::system(system_prompt));
        messages.extend(prior_turns.iter().cloned());

        let sampling = &endpoint.sampling;
        Self {
            model: endpoint.model.clone(),
            messages,
            max_tokens: sampling.max_tokens_or_default(),
            temperature: sampling.temperature_or_default(),
            top_p: sampling.top_p_or_default(),
            presence_penalty: sampling.presence_penalty_or_default(),
            frequency_penalty: sampling.frequency_penalty_or_default(),
            stream,
        }
    }
}

/// Chat completion response (non-streaming).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    /// Response choices
    pub choices: Vec<Choice>,
    /// Token usage
    pub usage: Option<Usage>,
}

/// A response choice.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// The message
    pub message: ResponseMessage,
    /// Finish reason
    pub finish_reason: Option<String>,
}

/// Response message.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    /// Content (may be null)
    pub content: Option<String>,
}

/// One SSE frame of a streaming completion.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChunk {
    /// Chunk choices (empty on trailing usage frames)
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// A streamed choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    /// Incremental content
    #[serde(default)]
    pub delta: ChunkDelta,
    /// Set on the last content frame
    pub finish_reason: Option<String>,
}

/// Incremental message content.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    /// Content fragment
    pub content: Option<String>,
}

/// Token usage information.
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    /// Error details
    pub error: ApiErrorDetails,
}

/// API error details.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetails {
    /// Error message
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use brain_core::{CapabilityClass, SamplingParams};

    fn endpoint() -> ModelEndpoint {
        ModelEndpoint::new(
            "chat-1",
            CapabilityClass::Dialogue,
            "https://api.example.com/v1",
            "sk-test",
            "deepseek-chat",
        )
    }

    #[test]
    fn test_request_applies_sampling_defaults() {
        let request =
            ChatCompletionRequest::for_endpoint(&endpoint(), "be brief", &[], false);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "deepseek-chat");
        assert_eq!(json["max_tokens"], 2000);
        assert_eq!(json["top_p"], 1.0);
        assert_eq!(json["presence_penalty"], 0.0);
        assert!(json.get("stream").is_none());
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "be brief");
    }

    #[test]
    fn test_request_uses_endpoint_sampling_and_prior_turns() {
        let endpoint = endpoint().with_sampling(SamplingParams {
            temperature: Some(1.2),
            max_tokens: Some(300),
            ..Default::default()
        });
        let turns = vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")];
        let request = ChatCompletionRequest::for_endpoint(&endpoint, "sys", &turns, true);

        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[2], ChatTurn::assistant("hello"));
        assert_eq!(request.max_tokens, 300);
        assert_eq!(request.temperature, 1.2);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn test_chunk_without_choices_parses() {
        let chunk: ChatCompletionChunk =
            serde_json::from_str(r#"{"usage":{"prompt_tokens":1}}"#).unwrap();
        assert!(chunk.choices.is_empty());
    }

    #[test]
    fn test_chunk_with_delta_parses() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"choices":[{"index":0,"delta":{"content":"Sure"},"finish_reason":null}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Sure"));
        assert!(chunk.choices[0].finish_reason.is_none());
    }
}
