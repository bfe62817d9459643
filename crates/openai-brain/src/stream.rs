//! Server-Sent Events stream of completion chunks.

use std::pin::Pin;
use std::task::{Context, Poll};

use brain_core::{BrainError, StreamChunk};
use futures::stream::Stream;
use reqwest_eventsource::{Event, EventSource};
use tracing::{debug, warn};

use crate::api_types::ChatCompletionChunk;
use crate::brain::event_source_error;

/// Terminal data frame sent by OpenAI-compatible APIs.
const DONE_MARKER: &str = "[DONE]";

/// What a single SSE data frame means for the caller.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame {
    /// A content fragment (possibly the last one).
    Chunk(StreamChunk),
    /// The `[DONE]` marker.
    Done,
    /// Nothing to forward (role-only deltas, usage frames, unparsable data).
    Skip,
}

/// Interpret one SSE `data:` payload.
pub(crate) fn interpret_frame(data: &str) -> Frame {
    let data = data.trim();
    if data == DONE_MARKER {
        return Frame::Done;
    }

    let chunk = match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Failed to parse SSE chunk: {}", e);
            debug!("Raw data: {}", data);
            return Frame::Skip;
        }
    };

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Frame::Skip;
    };

    let text = choice.delta.content.unwrap_or_default();
    if choice.finish_reason.is_some() {
        Frame::Chunk(StreamChunk::finished(text))
    } else if text.is_empty() {
        Frame::Skip
    } else {
        Frame::Chunk(StreamChunk::delta(text))
    }
}

/// A stream of completion chunks over an open SSE connection.
///
/// Yields `Ok` chunks until one is flagged finished (or `[DONE]` arrives),
/// then ends. A connection that drops before either is reported as
/// `BrainError::Network` and the stream ends.
pub struct ChunkStream {
    event_source: EventSource,
    pending: Option<StreamChunk>,
    done: bool,
}

impl ChunkStream {
    pub(crate) fn new(event_source: EventSource, pending: Option<StreamChunk>) -> Self {
        Self {
            event_source,
            pending,
            done: false,
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.event_source.close();
    }
}

impl Stream for ChunkStream {
    type Item = Result<StreamChunk, BrainError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(chunk) = self.pending.take() {
            if chunk.finished {
                self.finish();
            }
            return Poll::Ready(Some(Ok(chunk)));
        }

        loop {
            if self.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.event_source).poll_next(cx) {
                Poll::Ready(Some(Ok(Event::Open))) => continue,
                Poll::Ready(Some(Ok(Event::Message(msg)))) => match interpret_frame(&msg.data) {
                    Frame::Chunk(chunk) => {
                        if chunk.finished {
                            self.finish();
                        }
                        return Poll::Ready(Some(Ok(chunk)));
                    }
                    Frame::Done => {
                        self.finish();
                        return Poll::Ready(Some(Ok(StreamChunk::finished(""))));
                    }
                    Frame::Skip => continue,
                },
                Poll::Ready(Some(Err(reqwest_eventsource::Error::StreamEnded)))
                | Poll::Ready(None) => {
                    warn!("SSE stream ended before completion");
                    self.finish();
                    return Poll::Ready(Some(Err(BrainError::Network(
                        "stream ended before completion".to_string(),
                    ))));
                }
                Poll::Ready(Some(Err(e))) => {
                    warn!("SSE error: {}", e);
                    self.finish();
                    return Poll::Ready(Some(Err(event_source_error(e))));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
