//! OpenAiBrain implementation using an OpenAI-compatible API.

use brain_core::{
    async_trait, BrainError, ChatTurn, FragmentStream, ModelBackend, ModelEndpoint, StreamChunk,
};
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{retry, Event, EventSource, RequestBuilderExt};
use tracing::{debug, info, warn};

use crate::api_types::{ApiError, ChatCompletionRequest, ChatCompletionResponse};
use crate::config::OpenAiBrainConfig;
use crate::stream::{interpret_frame, ChunkStream, Frame};

/// A backend that calls `/chat/completions` on whichever endpoint it is given.
pub struct OpenAiBrain {
    client: Client,
    config: OpenAiBrainConfig,
}

impl OpenAiBrain {
    /// Create a new OpenAiBrain with the given configuration.
    pub fn new(config: OpenAiBrainConfig) -> Result<Self, BrainError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                BrainError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        info!(
            "OpenAiBrain initialized (connect timeout: {:?})",
            config.connect_timeout
        );

        Ok(Self { client, config })
    }

    /// Create an OpenAiBrain from environment variables.
    ///
    /// See [`OpenAiBrainConfig::from_env`] for the variables read.
    pub fn from_env() -> Result<Self, BrainError> {
        let config = OpenAiBrainConfig::from_env()?;
        Self::new(config)
    }

    /// Get the configuration.
    pub fn config(&self) -> &OpenAiBrainConfig {
        &self.config
    }

    fn request(
        &self,
        endpoint: &ModelEndpoint,
        body: &ChatCompletionRequest,
    ) -> Result<reqwest::RequestBuilder, BrainError> {
        if endpoint.api_key.trim().is_empty() {
            return Err(BrainError::Configuration(format!(
                "endpoint {} has no API key",
                endpoint.id
            )));
        }

        Ok(self
            .client
            .post(completions_url(&endpoint.base_url))
            .bearer_auth(&endpoint.api_key)
            .json(body))
    }
}

#[async_trait]
impl ModelBackend for OpenAiBrain {
    async fn complete(
        &self,
        endpoint: &ModelEndpoint,
        system_prompt: &str,
        prior_turns: &[ChatTurn],
    ) -> Result<String, BrainError> {
        let body = ChatCompletionRequest::for_endpoint(endpoint, system_prompt, prior_turns, false);
        debug!(endpoint = %endpoint.id, model = %body.model, "Sending completion request");

        let response = self
            .request(endpoint, &body)?
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &error_text));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            BrainError::MalformedResponse(format!("Failed to parse response: {}", e))
        })?;

        if let Some(usage) = &completion.usage {
            debug!(
                "Token usage - prompt: {}, completion: {}, total: {}",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BrainError::MalformedResponse("no choices in response".to_string()))?;

        if let Some(reason) = choice.finish_reason.as_deref() {
            debug!(endpoint = %endpoint.id, finish_reason = reason, "Completion finished");
        }

        choice
            .message
            .content
            .ok_or_else(|| BrainError::MalformedResponse("no content in response".to_string()))
    }

    async fn complete_streaming(
        &self,
        endpoint: &ModelEndpoint,
        system_prompt: &str,
        prior_turns: &[ChatTurn],
    ) -> Result<FragmentStream, BrainError> {
        let body = ChatCompletionRequest::for_endpoint(endpoint, system_prompt, prior_turns, true);
        debug!(endpoint = %endpoint.id, model = %body.model, "Opening completion stream");

        let mut event_source = self.request(endpoint, &body)?.eventsource().map_err(|e| {
            BrainError::Configuration(format!("Failed to build streaming request: {}", e))
        })?;
        event_source.set_retry_policy(Box::new(retry::Never));

        // Wait for the connection to open so request failures surface here,
        // before any output exists.
        let pending = match open(&mut event_source).await {
            Ok(pending) => pending,
            Err(e) => {
                event_source.close();
                return Err(e);
            }
        };

        Ok(Box::pin(ChunkStream::new(event_source, pending)))
    }

    fn name(&self) -> &str {
        "OpenAiBrain"
    }
}

/// Drive the event source until it opens. Returns the first chunk if one
/// arrives in the same breath as the open.
async fn open(event_source: &mut EventSource) -> Result<Option<StreamChunk>, BrainError> {
    loop {
        match event_source.next().await {
            Some(Ok(Event::Open)) => return Ok(None),
            Some(Ok(Event::Message(msg))) => match interpret_frame(&msg.data) {
                Frame::Chunk(chunk) => return Ok(Some(chunk)),
                Frame::Done => return Ok(Some(StreamChunk::finished(""))),
                Frame::Skip => continue,
            },
            Some(Err(reqwest_eventsource::Error::InvalidStatusCode(status, response))) => {
                let error_text = response.text().await.unwrap_or_default();
                return Err(api_error(status.as_u16(), &error_text));
            }
            Some(Err(e)) => return Err(event_source_error(e)),
            None => {
                return Err(BrainError::Network(
                    "stream closed before opening".to_string(),
                ))
            }
        }
    }
}

/// Join a base URL and the completions path.
pub(crate) fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Build an `Api` error from a non-success status and its body.
pub(crate) fn api_error(status: u16, body: &str) -> BrainError {
    let message = match serde_json::from_str::<ApiError>(body) {
        Ok(api_error) => api_error.error.message,
        Err(_) => body.trim().to_string(),
    };
    warn!(status, "API error: {}", message);
    BrainError::Api { status, message }
}

/// Map a reqwest failure to a transport error.
pub(crate) fn transport_error(e: reqwest::Error) -> BrainError {
    if e.is_timeout() {
        BrainError::Timeout
    } else {
        BrainError::Network(format!("Failed to send request: {}", e))
    }
}

/// Map an event source failure once the body can no longer be read.
pub(crate) fn event_source_error(e: reqwest_eventsource::Error) -> BrainError {
    use reqwest_eventsource::Error;

    match e {
        Error::Transport(e) => transport_error(e),
        Error::InvalidStatusCode(status, _) => BrainError::Api {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string(),
        },
        Error::InvalidContentType(content_type, _) => BrainError::MalformedResponse(format!(
            "unexpected content type: {:?}",
            content_type
        )),
        other => BrainError::Network(other.to_string()),
    }
}
