use std::sync::Arc;

use parley_persist::ConversationStore;
use parley_stream::ChatTransport;

use crate::config::SessionConfig;
use crate::error::{EngineError, Result};
use crate::events::EventSink;
use crate::orchestrator::SessionOrchestrator;
use crate::render::{ContentRenderer, ReferenceScanner};
use crate::resolver::{ReferenceLookup, ReferenceResolver};

/// Builder for constructing a SessionOrchestrator with optional components
pub struct OrchestratorBuilder {
    transport: Option<Arc<dyn ChatTransport>>,
    store: Option<ConversationStore>,
    renderer: Option<Arc<dyn ContentRenderer>>,
    lookup: Option<Arc<dyn ReferenceLookup>>,
    events: EventSink,
    config: Option<SessionConfig>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            store: None,
            renderer: None,
            lookup: None,
            events: EventSink::disabled(),
            config: None,
        }
    }

    /// Set the backend transport
    pub fn transport(mut self, transport: Arc<dyn ChatTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the conversation store (defaults to an in-memory one)
    pub fn store(mut self, store: ConversationStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the default reference scanner
    pub fn renderer(mut self, renderer: Arc<dyn ContentRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Enable reference resolution
    pub fn lookup(mut self, lookup: Arc<dyn ReferenceLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the SessionOrchestrator
    pub fn build(self) -> Result<SessionOrchestrator> {
        let transport = self
            .transport
            .ok_or_else(|| EngineError::Config("transport is required".to_string()))?;
        let config = self
            .config
            .ok_or_else(|| EngineError::Config("session config is required".to_string()))?;
        if config.user_id.trim().is_empty() {
            return Err(EngineError::Config("user_id must not be empty".to_string()));
        }

        Ok(SessionOrchestrator::from_parts(
            transport,
            self.renderer.unwrap_or_else(|| Arc::new(ReferenceScanner)),
            ReferenceResolver::new(self.lookup),
            self.events,
            self.store.unwrap_or_else(ConversationStore::in_memory),
            config,
        ))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
