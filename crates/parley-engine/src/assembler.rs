//! Per-turn assistant message state machine
//!
//! ```text
//! Idle --start--> Streaming --finalize--> Finalizing --> Committed
//!                     |
//!                     +--abort--> Aborted            (no text yet)
//!                     +--abort--> Finalizing ...     (partial text kept)
//! ```

use std::sync::Arc;

use parley_stream::{DeltaPayload, SseEvent, STREAMING_EVENT};
use parley_types::{IntermediateStep, Message, RenderEvent};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::events::EventSink;
use crate::render::ContentRenderer;
use crate::resolver::ReferenceResolver;
use crate::session::ActiveSession;

/// Shown when a `streaming` event arrives before any answer text
pub const ERROR_PLACEHOLDER: &str =
    "Sorry, there was an error processing your message. Please try again later.";

const STEP_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    Idle,
    Streaming,
    Finalizing,
    Committed,
    Aborted,
}

/// Accumulation bookkeeping for the message being streamed
#[derive(Debug, Default)]
struct StreamCursor {
    text: String,
    /// Step id of the last text fragment, `None` included
    step: Option<String>,
    loop_num: Option<i64>,
    cancelled: bool,
}

pub struct MessageAssembler {
    state: AssemblerState,
    message: Option<Message>,
    cursor: StreamCursor,
    renderer: Arc<dyn ContentRenderer>,
    events: EventSink,
    intermediate_steps: bool,
}

impl MessageAssembler {
    pub fn new(renderer: Arc<dyn ContentRenderer>, events: EventSink) -> Self {
        Self {
            state: AssemblerState::Idle,
            message: None,
            cursor: StreamCursor::default(),
            renderer,
            events,
            intermediate_steps: true,
        }
    }

    pub fn with_intermediate_steps(mut self, enabled: bool) -> Self {
        self.intermediate_steps = enabled;
        self
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Text accumulated from deltas so far, without any placeholder
    pub fn text(&self) -> &str {
        &self.cursor.text
    }

    fn expect_state(&self, expected: AssemblerState) -> Result<()> {
        if self.state != expected {
            return Err(EngineError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Open an empty assistant message
    pub fn start(&mut self) -> Result<&Message> {
        self.expect_state(AssemblerState::Idle)?;

        let message = Message::assistant("");
        debug!(message_id = %message.id, "Assistant message started");
        self.events.emit(RenderEvent::MessageStarted {
            message_id: message.id.clone(),
        });

        self.cursor = StreamCursor::default();
        self.state = AssemblerState::Streaming;
        Ok(&*self.message.insert(message))
    }

    /// No further deltas are applied once set
    pub fn mark_cancelled(&mut self) {
        self.cursor.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cursor.cancelled
    }

    /// Apply one decoded stream event
    ///
    /// Malformed payloads are logged and skipped; the stream goes on.
    /// Returns whether the event changed the message.
    pub fn apply_event(&mut self, event: &SseEvent, resolver: &mut ReferenceResolver) -> bool {
        if self.state != AssemblerState::Streaming || self.cursor.cancelled {
            return false;
        }

        let mut changed = false;
        let parsed = if event.data.is_empty() {
            Ok(None)
        } else {
            DeltaPayload::parse(&event.data)
        };
        match parsed {
            Ok(Some(payload)) => {
                changed = self.apply_delta(payload, resolver).is_ok();
            }
            Ok(None) => {}
            Err(e) => {
                warn!(event = %event.event, "Skipping malformed stream payload: {:#}", e);
            }
        }

        if event.event == STREAMING_EVENT && self.cursor.text.is_empty() {
            changed |= self.show_placeholder();
        }

        changed
    }

    /// Fold one delta into the message
    pub fn apply_delta(&mut self, payload: DeltaPayload, resolver: &mut ReferenceResolver) -> Result<()> {
        self.expect_state(AssemblerState::Streaming)?;
        if self.cursor.cancelled {
            return Ok(());
        }

        match payload {
            DeltaPayload::Text { content, step } => {
                if let Some(next) = &step {
                    if self.cursor.step.as_ref() != Some(next) {
                        self.cursor.text.push_str(STEP_SEPARATOR);
                    }
                }
                self.cursor.text.push_str(&content);
                self.cursor.step = step;
                let text = self.cursor.text.clone();
                self.publish_text(text, resolver);
            }
            DeltaPayload::Thought { thought, loop_num } => {
                if !self.intermediate_steps {
                    return Ok(());
                }
                self.apply_thought(thought, loop_num);
            }
        }
        Ok(())
    }

    fn apply_thought(&mut self, thought: String, loop_num: i64) {
        let Some(message) = self.message.as_mut() else {
            return;
        };
        self.cursor.loop_num = Some(loop_num);

        match message.steps.last_mut() {
            Some(last) if last.loop_num == loop_num => {
                last.thought.push_str(&thought);
                self.events.emit(RenderEvent::StepExtended {
                    message_id: message.id.clone(),
                    step: last.clone(),
                });
            }
            _ => {
                let step = IntermediateStep::new(thought, loop_num);
                message.steps.push(step.clone());
                self.events.emit(RenderEvent::StepAppended {
                    message_id: message.id.clone(),
                    step,
                });
            }
        }
    }

    fn show_placeholder(&mut self) -> bool {
        let already_shown = self
            .message
            .as_ref()
            .is_some_and(|m| m.text == ERROR_PLACEHOLDER);
        if already_shown {
            return false;
        }
        let Some(message) = self.message.as_mut() else {
            return false;
        };
        message.text = ERROR_PLACEHOLDER.to_string();
        self.events.emit(RenderEvent::TextUpdated {
            message_id: message.id.clone(),
            text: message.text.clone(),
            rendered: message.text.clone(),
        });
        true
    }

    fn publish_text(&mut self, text: String, resolver: &mut ReferenceResolver) {
        let Some(message) = self.message.as_mut() else {
            return;
        };
        let rendered = self.renderer.render(&text);
        resolver.collect(&message.id, rendered.references);
        message.text = text;
        self.events.emit(RenderEvent::TextUpdated {
            message_id: message.id.clone(),
            text: message.text.clone(),
            rendered: rendered.display,
        });
    }

    /// Resolve references, commit the message to the session and close the
    /// turn
    pub async fn finalize(
        &mut self,
        resolver: &mut ReferenceResolver,
        session: &mut ActiveSession,
    ) -> Result<Message> {
        self.expect_state(AssemblerState::Streaming)?;
        let Some(mut message) = self.message.take() else {
            return Err(EngineError::InvalidState {
                expected: AssemblerState::Streaming,
                actual: AssemblerState::Idle,
            });
        };
        self.state = AssemblerState::Finalizing;

        let outcome = resolver.resolve(&mut message, &self.events).await;
        if !outcome.is_empty() {
            debug!(
                message_id = %message.id,
                resolved = outcome.resolved.len(),
                failed = outcome.failed.len(),
                "References settled"
            );
        }

        session.push_message(message.clone());
        self.state = AssemblerState::Committed;
        debug!(message_id = %message.id, "Assistant message committed");

        self.events.emit(RenderEvent::TurnFinalized {
            message: message.clone(),
        });
        self.events.emit(RenderEvent::LoadingChanged { loading: false });

        self.message = Some(message.clone());
        Ok(message)
    }

    /// End the turn early
    ///
    /// With no accumulated text yet (a showing placeholder included) the
    /// message is discarded and nothing is persisted.
    /// Otherwise the partial answer goes through a normal finalize.
    pub async fn abort(
        &mut self,
        resolver: &mut ReferenceResolver,
        session: &mut ActiveSession,
    ) -> Result<Option<Message>> {
        self.expect_state(AssemblerState::Streaming)?;
        self.cursor.cancelled = true;

        // The placeholder is display only; it never counts as an answer
        if self.cursor.text.is_empty() {
            if let Some(message) = self.message.take() {
                resolver.abandon(&message.id);
                debug!(message_id = %message.id, "Empty assistant message discarded");
            }
            self.state = AssemblerState::Aborted;
            self.events.emit(RenderEvent::TurnAborted { message: None });
            self.events.emit(RenderEvent::LoadingChanged { loading: false });
            return Ok(None);
        }

        let message = self.finalize(resolver, session).await?;
        self.events.emit(RenderEvent::TurnAborted {
            message: Some(message.clone()),
        });
        Ok(Some(message))
    }
}
