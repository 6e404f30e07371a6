use chrono::Utc;
use parley_persist::ConversationStore;
use parley_stream::HistoryEntry;
use parley_types::{ConversationSession, Message};
use tracing::{debug, error};

/// The conversation currently on screen, mirrored into the store
///
/// The in-memory messages are authoritative for the running widget. Store
/// writes that fail are logged and the session carries on.
pub struct ActiveSession {
    store: ConversationStore,
    user_id: String,
    session_id: String,
    messages: Vec<Message>,
}

impl ActiveSession {
    pub fn new(store: ConversationStore, user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            session_id: session_id.into(),
            messages: Vec::new(),
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Prior turns as sent with the next request
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.messages.iter().map(HistoryEntry::from).collect()
    }

    /// Append a message and persist it
    ///
    /// The first message opens a new stored session titled after it; later
    /// ones are pushed onto the stored copy.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message.clone());

        let result = if self.messages.len() == 1 {
            self.store.append(ConversationSession::start(
                self.session_id.clone(),
                self.user_id.clone(),
                message,
            ))
        } else {
            match self.store.get(&self.user_id, &self.session_id) {
                Ok(Some(mut stored)) => {
                    stored.push(message);
                    self.store.update(stored)
                }
                // Evicted or never written: rebuild from what we hold
                Ok(None) => {
                    debug!(session_id = %self.session_id, "Stored session missing, re-saving");
                    self.store.save(self.snapshot())
                }
                Err(e) => Err(e),
            }
        };

        if let Err(e) = result {
            error!(session_id = %self.session_id, "Failed to persist message: {}", e);
        }
    }

    /// Swap in an edited copy of an existing message
    pub fn replace_message(&mut self, message: Message) -> bool {
        let Some(slot) = self.messages.iter_mut().find(|m| m.id == message.id) else {
            return false;
        };
        *slot = message.clone();

        let result = match self.store.get(&self.user_id, &self.session_id) {
            Ok(Some(mut stored)) => {
                match stored.message_mut(&message.id) {
                    Some(slot) => *slot = message,
                    None => stored.messages = self.messages.clone(),
                }
                self.store.update(stored)
            }
            Ok(None) => self.store.save(self.snapshot()),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            error!(session_id = %self.session_id, "Failed to persist message update: {}", e);
        }
        true
    }

    /// Start over under a fresh session id
    pub fn reset(&mut self, session_id: impl Into<String>) {
        self.session_id = session_id.into();
        self.messages.clear();
    }

    /// Adopt a stored session wholesale
    pub fn load(&mut self, session: ConversationSession) {
        self.session_id = session.session_id;
        self.messages = session.messages;
    }

    /// Follow a different user; the old session does not carry over
    pub fn switch_user(&mut self, user_id: impl Into<String>, session_id: impl Into<String>) {
        self.user_id = user_id.into();
        self.reset(session_id);
    }

    fn snapshot(&self) -> ConversationSession {
        let mut session = ConversationSession {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            title: self
                .messages
                .first()
                .map(|m| m.text.clone())
                .unwrap_or_default(),
            updated_at: Utc::now(),
            messages: self.messages.clone(),
        };
        session.touch();
        session
    }
}
