//! Turn sinks: where a turn's progress is delivered for presentation.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::OrchestratorError;
use crate::transcript::Message;

/// Receives a turn's progress as it happens.
///
/// Abstracted to support different presentation layers (SSE, websockets,
/// tests). An `Err` from any method except `speaker_failed` means the
/// presentation side is gone and the turn should be cancelled.
#[async_trait]
pub trait TurnSink: Send + Sync {
    /// The ordered speakers chosen for this turn.
    async fn speakers_selected(&self, speakers: &[String]) -> Result<(), OrchestratorError>;

    /// One cleaned fragment of `speaker`'s reply.
    async fn fragment(&self, speaker: &str, text: &str) -> Result<(), OrchestratorError>;

    /// A reply was persisted.
    async fn message_persisted(&self, message: &Message) -> Result<(), OrchestratorError>;

    /// `speaker` will not be heard from this turn.
    async fn speaker_failed(&self, speaker: &str, error: &OrchestratorError);
}

/// A sink that discards everything.
#[derive(Debug, Clone, Default)]
pub struct NoOpSink;

#[async_trait]
impl TurnSink for NoOpSink {
    async fn speakers_selected(&self, _speakers: &[String]) -> Result<(), OrchestratorError> {
        Ok(())
    }

    async fn fragment(&self, _speaker: &str, _text: &str) -> Result<(), OrchestratorError> {
        Ok(())
    }

    async fn message_persisted(&self, _message: &Message) -> Result<(), OrchestratorError> {
        Ok(())
    }

    async fn speaker_failed(&self, _speaker: &str, _error: &OrchestratorError) {}
}

/// A sink that logs every event.
#[derive(Debug, Clone, Default)]
pub struct LoggingSink;

#[async_trait]
impl TurnSink for LoggingSink {
    async fn speakers_selected(&self, speakers: &[String]) -> Result<(), OrchestratorError> {
        tracing::info!("Speakers selected: {:?}", speakers);
        Ok(())
    }

    async fn fragment(&self, speaker: &str, text: &str) -> Result<(), OrchestratorError> {
        tracing::debug!("[{}] {}", speaker, text);
        Ok(())
    }

    async fn message_persisted(&self, message: &Message) -> Result<(), OrchestratorError> {
        tracing::info!(
            "Persisted #{} from {}: {}",
            message.sequence,
            message.speaker_label(),
            message.content
        );
        Ok(())
    }

    async fn speaker_failed(&self, speaker: &str, error: &OrchestratorError) {
        tracing::warn!("Speaker {} failed: {}", speaker, error);
    }
}

/// A turn event, as delivered by [`ChannelSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    SpeakersSelected { speakers: Vec<String> },
    Fragment { speaker: String, text: String },
    MessagePersisted { message: Message },
    SpeakerFailed { speaker: String, error: String },
}

/// Forwards events over an unbounded channel.
///
/// Sends never wait on the receiver. Once the receiver is dropped the sink
/// reports cancellation.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TurnEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TurnEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: TurnEvent) -> Result<(), OrchestratorError> {
        self.tx.send(event).map_err(|_| OrchestratorError::Cancelled)
    }
}

#[async_trait]
impl TurnSink for ChannelSink {
    async fn speakers_selected(&self, speakers: &[String]) -> Result<(), OrchestratorError> {
        self.send(TurnEvent::SpeakersSelected {
            speakers: speakers.to_vec(),
        })
    }

    async fn fragment(&self, speaker: &str, text: &str) -> Result<(), OrchestratorError> {
        self.send(TurnEvent::Fragment {
            speaker: speaker.to_string(),
            text: text.to_string(),
        })
    }

    async fn message_persisted(&self, message: &Message) -> Result<(), OrchestratorError> {
        self.send(TurnEvent::MessagePersisted {
            message: message.clone(),
        })
    }

    async fn speaker_failed(&self, speaker: &str, error: &OrchestratorError) {
        let _ = self.send(TurnEvent::SpeakerFailed {
            speaker: speaker.to_string(),
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpSink;
        assert!(sink.speakers_selected(&["Alice".to_string()]).await.is_ok());
        assert!(sink.fragment("Alice", "hi").await.is_ok());
    }

    #[tokio::test]
    async fn test_logging_sink_never_cancels() {
        let sink = LoggingSink;
        let message = Message {
            conversation_id: "c".to_string(),
            role: crate::transcript::EmitterRole::Character,
            character_id: Some("a".to_string()),
            character_name: Some("Alice".to_string()),
            content: "Hi".to_string(),
            sequence: 2,
            created_at: chrono::Utc::now(),
        };
        assert!(sink.speakers_selected(&["Alice".to_string()]).await.is_ok());
        assert!(sink.fragment("Alice", "Hi").await.is_ok());
        assert!(sink.message_persisted(&message).await.is_ok());
        sink.speaker_failed("Bob", &OrchestratorError::Cancelled).await;
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.speakers_selected(&["Alice".to_string()]).await.unwrap();
        sink.fragment("Alice", "Hi").await.unwrap();
        sink.speaker_failed("Alice", &OrchestratorError::Cancelled).await;

        assert_eq!(
            rx.recv().await,
            Some(TurnEvent::SpeakersSelected {
                speakers: vec!["Alice".to_string()]
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(TurnEvent::Fragment {
                speaker: "Alice".to_string(),
                text: "Hi".to_string()
            })
        );
        assert!(matches!(rx.recv().await, Some(TurnEvent::SpeakerFailed { .. })));
    }

    #[tokio::test]
    async fn test_channel_sink_reports_disconnect() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        assert!(matches!(
            sink.fragment("Alice", "Hi").await,
            Err(OrchestratorError::Cancelled)
        ));
    }

    #[test]
    fn test_event_serialization() {
        let event = TurnEvent::Fragment {
            speaker: "Alice".to_string(),
            text: "Hi".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "fragment");
        assert_eq!(json["speaker"], "Alice");
    }
}
