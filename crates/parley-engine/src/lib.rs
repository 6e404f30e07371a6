pub mod assembler;
pub mod builder;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod render;
pub mod resolver;
pub mod session;

pub use assembler::{AssemblerState, MessageAssembler, ERROR_PLACEHOLDER};
pub use builder::OrchestratorBuilder;
pub use config::SessionConfig;
pub use error::{EngineError, Result};
pub use events::EventSink;
pub use orchestrator::{SessionOrchestrator, TurnCanceller, TurnOutcome, NO_RESPONSE_MESSAGE};
pub use render::{normalize_display_text, ContentRenderer, ReferenceScanner, RenderedContent};
pub use resolver::{ReferenceLookup, ReferenceOutcome, ReferenceResolver, ResolvedValue};
pub use session::ActiveSession;
