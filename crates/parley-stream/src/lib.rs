pub mod buffer_utils;
pub mod client;
pub mod config;
pub mod streaming;
pub mod traits;

pub use buffer_utils::{decode_sse_stream, CircularLineBuffer, SseDecoder, SseEvent};
pub use client::HttpChatClient;
pub use config::TransportConfig;
pub use streaming::{DeltaPayload, STREAMING_EVENT};
pub use traits::{ByteStream, ChatRequest, ChatResponse, ChatTransport, HistoryEntry};
