use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt;
use parley_persist::ConversationStore;
use parley_stream::{decode_sse_stream, ByteStream, ChatRequest, ChatResponse, ChatTransport, DeltaPayload};
use parley_types::{Attachment, ConversationSession, Feedback, Message, RenderEvent, Role};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::assembler::{MessageAssembler, ERROR_PLACEHOLDER};
use crate::builder::OrchestratorBuilder;
use crate::config::SessionConfig;
use crate::error::{EngineError, Result};
use crate::events::EventSink;
use crate::render::ContentRenderer;
use crate::resolver::ReferenceResolver;
use crate::session::ActiveSession;

/// Committed when a non-streaming reply carries no `output`
pub const NO_RESPONSE_MESSAGE: &str = "I received your message but I don't have a response.";

/// How a call to [`SessionOrchestrator::send`] ended
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// Blank input with no attachments; nothing happened
    Ignored,
    Committed(Message),
    /// Cancelled; carries the partial answer when there was text to keep
    Aborted(Option<Message>),
    /// The transport failed; an error message was committed in its place
    Failed {
        partial: Option<Message>,
        error: Message,
    },
}

/// Cloneable handle that cancels the turn in flight, if any
///
/// Lives outside the orchestrator's `&mut` borrow so a signal handler or
/// UI task can stop a running `send`.
#[derive(Clone, Default)]
pub struct TurnCanceller {
    slot: Arc<Mutex<Option<CancellationToken>>>,
}

impl TurnCanceller {
    fn lock(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns whether a turn was running
    pub fn cancel(&self) -> bool {
        match self.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().is_some()
    }

    fn begin(&self) -> Result<TurnGuard> {
        let mut slot = self.lock();
        if slot.is_some() {
            return Err(EngineError::TurnInFlight);
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        Ok(TurnGuard {
            canceller: self.clone(),
            token,
        })
    }
}

/// Clears the in-flight slot however the turn ends
struct TurnGuard {
    canceller: TurnCanceller,
    token: CancellationToken,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.canceller.lock().take();
    }
}

/// Drives conversation turns: sends user input, assembles the streamed
/// answer and keeps the session and store in step
pub struct SessionOrchestrator {
    transport: Arc<dyn ChatTransport>,
    renderer: Arc<dyn ContentRenderer>,
    resolver: ReferenceResolver,
    events: EventSink,
    session: ActiveSession,
    config: SessionConfig,
    canceller: TurnCanceller,
}

impl SessionOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub(crate) fn from_parts(
        transport: Arc<dyn ChatTransport>,
        renderer: Arc<dyn ContentRenderer>,
        resolver: ReferenceResolver,
        events: EventSink,
        store: ConversationStore,
        config: SessionConfig,
    ) -> Self {
        let session_id = config
            .session_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let session = ActiveSession::new(store, config.user_id.clone(), session_id);

        Self {
            transport,
            renderer,
            resolver,
            events,
            session,
            config,
            canceller: TurnCanceller::default(),
        }
    }

    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    pub fn user_id(&self) -> &str {
        self.session.user_id()
    }

    pub fn messages(&self) -> &[Message] {
        self.session.messages()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn canceller(&self) -> TurnCanceller {
        self.canceller.clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.canceller.is_in_flight()
    }

    /// Cancel the running turn; returns whether there was one
    pub fn cancel(&self) -> bool {
        self.canceller.cancel()
    }

    /// Run one conversation turn
    ///
    /// Blank input without attachments is ignored. A second call while a
    /// turn is running fails with [`EngineError::TurnInFlight`].
    pub async fn send(&mut self, text: &str, files: Vec<Attachment>) -> Result<TurnOutcome> {
        let text = text.trim();
        if text.is_empty() && files.is_empty() {
            return Ok(TurnOutcome::Ignored);
        }

        let guard = self.canceller.begin()?;
        let token = guard.token.clone();

        let user_message = Message::user(text).with_attachments(files);
        self.session.push_message(user_message.clone());

        // History replay includes the message being sent
        let request = ChatRequest::new(text, self.session.user_id(), self.session.session_id())
            .with_history(self.session.history())
            .with_params(self.config.params.clone())
            .with_files(user_message.attachments.clone());

        self.events.emit(RenderEvent::UserMessageAdded {
            message: user_message,
        });
        self.events.emit(RenderEvent::LoadingChanged { loading: true });

        info!(session_id = %self.session.session_id(), "Sending chat turn");

        let transport = Arc::clone(&self.transport);
        let response = tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("Turn cancelled before the backend answered");
                self.events.emit(RenderEvent::TurnAborted { message: None });
                self.events.emit(RenderEvent::LoadingChanged { loading: false });
                return Ok(TurnOutcome::Aborted(None));
            }
            response = transport.send(request) => response,
        };

        let outcome = match response {
            Ok(ChatResponse::Streaming(body)) => self.drive_stream(body, &token).await?,
            Ok(ChatResponse::Complete { output }) => self.complete_turn(output).await?,
            Err(e) => {
                error!("Chat request failed: {:#}", e);
                self.fail_turn(None)
            }
        };

        drop(guard);
        Ok(outcome)
    }

    async fn drive_stream(&mut self, body: ByteStream, token: &CancellationToken) -> Result<TurnOutcome> {
        let mut assembler = self.assembler();
        assembler.start()?;

        let mut batches = decode_sse_stream(body);
        let mut failure = None;
        let mut cancelled = false;

        loop {
            // A delivered batch is applied in full before cancellation is
            // looked at again
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = batches.next() => match next {
                    Some(Ok(events)) => {
                        for event in &events {
                            assembler.apply_event(event, &mut self.resolver);
                        }
                    }
                    Some(Err(e)) => {
                        failure = Some(e);
                        break;
                    }
                    None => break,
                },
            }
        }
        // Dropping the decoder closes the response body
        drop(batches);

        if cancelled {
            info!("Turn cancelled mid-stream");
            assembler.mark_cancelled();
            let partial = assembler.abort(&mut self.resolver, &mut self.session).await?;
            return Ok(TurnOutcome::Aborted(partial));
        }

        if let Some(e) = failure {
            error!("Stream failed: {:#}", e);
            let partial = assembler.abort(&mut self.resolver, &mut self.session).await?;
            return Ok(self.fail_turn(partial));
        }

        let message = assembler.finalize(&mut self.resolver, &mut self.session).await?;
        debug!(message_id = %message.id, chars = message.text.len(), "Turn committed");
        Ok(TurnOutcome::Committed(message))
    }

    /// A non-streaming reply runs through the same assemble/finalize cycle
    /// as a single text delta
    async fn complete_turn(&mut self, output: Option<String>) -> Result<TurnOutcome> {
        let text = output.unwrap_or_else(|| NO_RESPONSE_MESSAGE.to_string());

        let mut assembler = self.assembler();
        assembler.start()?;
        assembler.apply_delta(DeltaPayload::text(text), &mut self.resolver)?;
        let message = assembler.finalize(&mut self.resolver, &mut self.session).await?;
        Ok(TurnOutcome::Committed(message))
    }

    fn fail_turn(&mut self, partial: Option<Message>) -> TurnOutcome {
        let message = Message::assistant(ERROR_PLACEHOLDER);
        self.session.push_message(message.clone());
        self.events.emit(RenderEvent::TurnFinalized {
            message: message.clone(),
        });
        self.events.emit(RenderEvent::LoadingChanged { loading: false });
        TurnOutcome::Failed {
            partial,
            error: message,
        }
    }

    fn assembler(&self) -> MessageAssembler {
        MessageAssembler::new(Arc::clone(&self.renderer), self.events.clone())
            .with_intermediate_steps(self.config.intermediate_steps)
    }

    /// Drop the on-screen conversation and continue under a new session id
    pub fn start_new_session(&mut self) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        self.session.reset(session_id.clone());
        self.resolver.clear();
        info!(session_id = %session_id, "Started new session");
        self.events.emit(RenderEvent::SessionStarted {
            session_id: session_id.clone(),
        });
        session_id
    }

    /// Make a stored session of the current user the active one
    pub fn load_session(&mut self, session_id: &str) -> Result<()> {
        let session = self
            .session
            .store()
            .get(self.session.user_id(), session_id)?
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;

        self.resolver.clear();
        self.session.load(session);
        info!(session_id = %session_id, messages = self.session.messages().len(), "Loaded session");
        self.events.emit(RenderEvent::SessionLoaded {
            session_id: session_id.to_string(),
            messages: self.session.messages().to_vec(),
        });
        Ok(())
    }

    /// Delete a stored session; deleting the active one starts a new session
    pub fn delete_session(&mut self, session_id: &str) -> Result<bool> {
        let owned = self
            .session
            .store()
            .get(self.session.user_id(), session_id)?
            .is_some();
        let is_active = session_id == self.session.session_id();
        if !owned && !is_active {
            return Err(EngineError::SessionNotFound(session_id.to_string()));
        }

        let removed = if owned {
            self.session.store().remove(session_id)?
        } else {
            false
        };
        if is_active {
            self.start_new_session();
        }
        Ok(removed)
    }

    /// Rate an assistant message of the active session
    pub fn set_feedback(&mut self, message_id: &str, feedback: Feedback) -> Result<()> {
        let messages = self.session.messages();
        let index = messages
            .iter()
            .position(|m| m.id == message_id && m.is_assistant())
            .ok_or_else(|| EngineError::MessageNotFound(message_id.to_string()))?;

        let mut assistant_message = messages[index].clone();
        let previous = assistant_message.feedback;
        let user_message = index
            .checked_sub(1)
            .map(|i| messages[i].clone())
            .filter(|m| m.role == Role::User);

        assistant_message.feedback = feedback;
        self.session.replace_message(assistant_message.clone());

        debug!(message_id = %message_id, ?feedback, ?previous, "Feedback recorded");
        self.events.emit(RenderEvent::FeedbackChanged {
            session_id: self.session.session_id().to_string(),
            feedback,
            previous,
            user_message,
            assistant_message,
        });
        Ok(())
    }

    /// The current user's stored sessions, most recently updated first
    pub fn history(&self) -> Result<Vec<ConversationSession>> {
        let mut sessions = self.session.store().list(self.session.user_id())?;
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    /// Merge extra request fields; `Null` removes a field
    pub fn update_params(&mut self, params: Map<String, Value>) {
        for (key, value) in params {
            if value.is_null() {
                self.config.params.remove(&key);
            } else {
                self.config.params.insert(key, value);
            }
        }
    }

    /// Act on behalf of another user, starting a fresh session for them
    pub fn switch_user(&mut self, user_id: impl Into<String>) -> String {
        let user_id = user_id.into();
        if user_id == self.session.user_id() {
            return self.session.session_id().to_string();
        }
        let session_id = uuid::Uuid::new_v4().to_string();
        warn!(user_id = %user_id, "Switching user; active session closed");
        self.config.user_id = user_id.clone();
        self.session.switch_user(user_id, session_id.clone());
        self.resolver.clear();
        self.events.emit(RenderEvent::SessionStarted {
            session_id: session_id.clone(),
        });
        session_id
    }
}
