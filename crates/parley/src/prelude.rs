//! Prelude module for convenient imports
//!
//! ```rust
//! use parley::prelude::*;
//! ```

pub use crate::{
    Attachment, ConversationSession, Feedback, Message, RenderEvent, Role,
    ChatTransport, HttpChatClient, TransportConfig,
    ConversationStore, FileMedium, MemoryMedium, StoreConfig,
    EventSink, ReferenceLookup, ResolvedValue, SessionConfig, SessionOrchestrator,
    TurnCanceller, TurnOutcome,
};
