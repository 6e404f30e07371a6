use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use parley_types::{Attachment, Message};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::pin::Pin;

/// Raw response body chunks, in arrival order
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Transport to the completion backend
///
/// Implementations fail on network errors and non-2xx statuses; dropping the
/// returned stream stops the read.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: ChatRequest) -> Result<ChatResponse>;
}

pub enum ChatResponse {
    /// Server-sent events, still to be decoded
    Streaming(ByteStream),

    /// Whole answer; `None` when the body had no `output`
    Complete { output: Option<String> },
}

impl std::fmt::Debug for ChatResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Streaming(_) => f.write_str("Streaming(..)"),
            Self::Complete { output } => f.debug_struct("Complete").field("output", output).finish(),
        }
    }
}

/// One replayed turn of chat history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.text.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub input: String,
    pub user_id: String,
    pub session_id: String,
    pub chat_history: Vec<HistoryEntry>,
    /// Extra fields merged into the `input` JSON
    pub params: Map<String, Value>,
    pub files: Vec<Attachment>,
}

impl ChatRequest {
    pub fn new(
        input: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            chat_history: Vec::new(),
            params: Map::new(),
            files: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.chat_history = history;
        self
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_files(mut self, files: Vec<Attachment>) -> Self {
        self.files = files;
        self
    }

    /// JSON carried by the `input` form field
    pub fn input_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("input".to_string(), Value::String(self.input.clone()));
        payload.insert("user_id".to_string(), Value::String(self.user_id.clone()));
        payload.insert("session_id".to_string(), Value::String(self.session_id.clone()));

        if !self.chat_history.is_empty() {
            payload.insert(
                "chat_history".to_string(),
                serde_json::to_value(&self.chat_history).unwrap_or(Value::Null),
            );
        }

        for (key, value) in &self.params {
            payload.insert(key.clone(), value.clone());
        }

        Value::Object(payload)
    }

    /// Text fields of the multipart form, in the order they are sent
    pub fn form_fields(&self, stream: bool) -> Result<Vec<(&'static str, String)>> {
        let mut fields = Vec::with_capacity(5);

        if !self.chat_history.is_empty() {
            fields.push(("chat_history", serde_json::to_string(&self.chat_history)?));
        }
        fields.push(("input", serde_json::to_string(&self.input_payload())?));
        fields.push(("stream", if stream { "true" } else { "false" }.to_string()));
        fields.push(("user_id", self.user_id.clone()));
        fields.push(("session_id", self.session_id.clone()));

        Ok(fields)
    }
}
