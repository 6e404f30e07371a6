//! # Parley
//!
//! Client-side engine for chat widgets that talk to a streaming backend.
//!
//! ## Overview
//!
//! - **Decode** server-sent events incrementally, whatever the chunking
//! - **Assemble** streamed deltas into one assistant message, with
//!   intermediate reasoning steps and step-aware paragraph breaks
//! - **Resolve** opaque references found in the answer in one batched call
//! - **Persist** conversations per user under a fixed storage budget,
//!   evicting the user's oldest sessions first
//! - **Orchestrate** turns, cancellation, session switching and feedback
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = Arc::new(HttpChatClient::new(
//!         TransportConfig::new("https://chat.example.com/api/stream"),
//!     )?);
//!
//!     let (events, mut rx) = EventSink::channel();
//!     tokio::spawn(async move {
//!         while let Some(event) = rx.recv().await {
//!             if let RenderEvent::TextUpdated { text, .. } = event {
//!                 println!("{}", text);
//!             }
//!         }
//!     });
//!
//!     let mut orchestrator = SessionOrchestrator::builder()
//!         .transport(transport)
//!         .store(ConversationStore::in_memory())
//!         .events(events)
//!         .config(SessionConfig::new("user-42"))
//!         .build()?;
//!
//!     orchestrator.send("Hello!", Vec::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`parley-types`**: messages, sessions and render events
//! - **`parley-stream`**: SSE decoder, delta payloads and the HTTP transport
//! - **`parley-persist`**: size-bounded conversation store over a storage medium
//! - **`parley-engine`**: message assembler, reference resolver and orchestrator
//!
//! ## License
//!
//! MIT

pub mod prelude;

pub use parley_types::{
    Attachment, ConversationSession, Feedback, IntermediateStep, Message, RenderEvent, Role,
};

pub use parley_stream::{
    decode_sse_stream, ChatRequest, ChatResponse, ChatTransport, DeltaPayload, HistoryEntry,
    HttpChatClient, SseDecoder, SseEvent, TransportConfig,
};

pub use parley_persist::{
    ConversationStore, ConversationStoreBuilder, FileMedium, MemoryMedium, PersistError,
    StorageMedium, StoreConfig,
};

pub use parley_engine::{
    ContentRenderer, EngineError, EventSink, MessageAssembler, OrchestratorBuilder,
    ReferenceLookup, ReferenceResolver, ReferenceScanner, ResolvedValue, SessionConfig,
    SessionOrchestrator, TurnCanceller, TurnOutcome,
};
