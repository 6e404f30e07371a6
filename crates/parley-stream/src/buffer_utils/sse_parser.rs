use anyhow::Result;
use futures::{Stream, StreamExt};
use std::pin::Pin;

use super::buffering::CircularLineBuffer;

const DEFAULT_EVENT_TYPE: &str = "message";

/// One dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type; `"message"` when the frame carried no `event:` field
    pub event: String,
    /// `data:` lines joined with `\n`
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
        }
    }
}

/// Incremental SSE decoder
///
/// Chunks may split frames anywhere, including inside a UTF-8 sequence or
/// between `\r` and `\n`. Malformed lines are skipped; the decoder never
/// fails as a whole.
pub struct SseDecoder {
    buffer: CircularLineBuffer,
    event_type: Option<String>,
    data_lines: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            buffer: CircularLineBuffer::with_capacity(8192),
            event_type: None,
            data_lines: Vec::new(),
            id: None,
        }
    }

    /// Feed one transport chunk, returning every event it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(chunk);
        self.drain_lines()
    }

    /// Signal end of stream
    ///
    /// A frame still missing its blank-line terminator is discarded.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        self.buffer.close();
        let events = self.drain_lines();

        if !self.buffer.is_empty() || self.has_pending() {
            tracing::debug!(
                buffered = self.buffer.len(),
                "Discarding incomplete trailing SSE event"
            );
        }
        self.buffer.clear();
        self.reset();
        events
    }

    fn drain_lines(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();

        while let Some(line_result) = self.buffer.next_line() {
            match line_result {
                Ok(line) => {
                    if let Some(event) = self.process_line(&line) {
                        events.push(event);
                    }
                }
                Err(e) => tracing::warn!("Skipping malformed SSE line: {}", e),
            }
        }

        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }

        // Comment
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event_type = Some(value.to_string()),
            "data" => {
                if !value.is_empty() {
                    self.data_lines.push(value.to_string());
                }
            }
            "id" => self.id = Some(value.to_string()),
            "retry" => {}
            other => tracing::debug!(field = other, "Ignoring unknown SSE field"),
        }

        None
    }

    fn has_pending(&self) -> bool {
        self.event_type.is_some() || !self.data_lines.is_empty()
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if !self.has_pending() {
            self.reset();
            return None;
        }

        let event = SseEvent {
            event: self
                .event_type
                .take()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string()),
            data: self.data_lines.join("\n"),
            id: self.id.take(),
        };
        self.reset();
        Some(event)
    }

    fn reset(&mut self) {
        self.event_type = None;
        self.data_lines.clear();
        self.id = None;
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a chunked byte stream into per-chunk batches of events
///
/// Each item holds every event completed by one transport chunk, so a
/// consumer can apply a delivered chunk in full before checking for
/// cancellation. Transport errors end the stream after being yielded.
pub fn decode_sse_stream<S>(bytes: S) -> Pin<Box<dyn Stream<Item = Result<Vec<SseEvent>>> + Send>>
where
    S: Stream<Item = Result<Vec<u8>>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(bytes);
        let mut decoder = SseDecoder::new();
        let mut failed = false;

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(chunk) => {
                    let events = decoder.feed(&chunk);
                    if !events.is_empty() {
                        yield Ok(events);
                    }
                }
                Err(e) => {
                    failed = true;
                    yield Err(e);
                    break;
                }
            }
        }

        if !failed {
            let trailing = decoder.finish();
            if !trailing.is_empty() {
                yield Ok(trailing);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(chunks: &[&str]) -> Vec<SseEvent> {
        let mut decoder = SseDecoder::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(decoder.feed(chunk.as_bytes()));
        }
        events.extend(decoder.finish());
        events
    }

    #[test]
    fn test_single_event() {
        let events = feed_all(&["event: streaming\ndata: {\"a\":1}\n\n"]);

        assert_eq!(events, vec![SseEvent::new("streaming", "{\"a\":1}")]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let events = feed_all(&["da", "ta: hel", "lo\n", "\n"]);

        assert_eq!(events, vec![SseEvent::new("message", "hello")]);
    }

    #[test]
    fn test_missing_type_defaults_to_message() {
        let events = feed_all(&["data: x\n\n"]);
        assert_eq!(events[0].event, "message");
    }

    #[test]
    fn test_multiple_data_lines_joined() {
        let events = feed_all(&["data: a\ndata: b\n\n"]);
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn test_empty_data_lines_ignored() {
        let events = feed_all(&["data:\ndata: a\ndata:\n\n"]);
        assert_eq!(events[0].data, "a");
    }

    #[test]
    fn test_bare_blank_lines_emit_nothing() {
        let events = feed_all(&["\n\n\n"]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_typed_event_without_data_is_emitted() {
        let events = feed_all(&["event: streaming\n\n"]);
        assert_eq!(events, vec![SseEvent::new("streaming", "")]);
    }

    #[test]
    fn test_trailing_incomplete_event_discarded() {
        let events = feed_all(&["data: one\n\n", "data: two\n"]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "one");
    }

    #[test]
    fn test_comments_and_unknown_fields_ignored() {
        let events = feed_all(&[": keep-alive\nretry: 100\nfoo: bar\nid: 7\ndata: x\n\n"]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_crlf_framing() {
        let events = feed_all(&["data: a\r", "\n\r", "\ndata: b\r\n\r\n"]);

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].data, "b");
    }

    #[test]
    fn test_lone_cr_at_end_of_stream() {
        let events = feed_all(&["data: a\r\r"]);
        assert_eq!(events, vec![SseEvent::new("message", "a")]);
    }

    #[test]
    fn test_malformed_line_skipped() {
        let mut decoder = SseDecoder::new();
        let mut events = decoder.feed(b"data: \xff\xfe\n\ndata: ok\n\n");
        events.extend(decoder.finish());

        assert_eq!(events, vec![SseEvent::new("message", "ok")]);
    }

    #[test]
    fn test_multibyte_char_split() {
        let bytes = "data: olá\n\n".as_bytes();
        let (head, tail) = bytes.split_at(9);

        let mut decoder = SseDecoder::new();
        let mut events = decoder.feed(head);
        events.extend(decoder.feed(tail));

        assert_eq!(events[0].data, "olá");
    }

    #[tokio::test]
    async fn test_decode_stream_batches_per_chunk() {
        let chunks: Vec<Result<Vec<u8>>> = vec![
            Ok(b"data: a\n\ndata: b\n\n".to_vec()),
            Ok(b"data: c".to_vec()),
            Ok(b"\n\n".to_vec()),
        ];
        let batches: Vec<Vec<SseEvent>> = decode_sse_stream(futures::stream::iter(chunks))
            .map(|b| b.unwrap())
            .collect()
            .await;

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1][0].data, "c");
    }

    #[tokio::test]
    async fn test_decode_stream_yields_transport_error() {
        let chunks: Vec<Result<Vec<u8>>> = vec![
            Ok(b"data: a\n\n".to_vec()),
            Err(anyhow::anyhow!("connection reset")),
            Ok(b"data: b\n\n".to_vec()),
        ];
        let items: Vec<Result<Vec<SseEvent>>> =
            decode_sse_stream(futures::stream::iter(chunks)).collect().await;

        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }
}
