use serde::{Deserialize, Serialize};

use crate::message::{Feedback, IntermediateStep, Message};

/// Notifications emitted by the engine for the rendering layer
///
/// Text updates always carry the full reconstruction, never a delta, so a
/// consumer that misses one update is corrected by the next.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderEvent {
    /// A turn is waiting on the backend (true) or has settled (false)
    LoadingChanged {
        loading: bool,
    },

    /// A new assistant message is being streamed
    MessageStarted {
        message_id: String,
    },

    /// `text` is the raw accumulation, `rendered` what the content
    /// renderer made of it
    TextUpdated {
        message_id: String,
        text: String,
        rendered: String,
    },

    /// A new intermediate step was opened
    StepAppended {
        message_id: String,
        step: IntermediateStep,
    },

    /// The last intermediate step grew (same `loop_num`)
    StepExtended {
        message_id: String,
        step: IntermediateStep,
    },

    ReferenceResolved {
        message_id: String,
        reference_id: String,
        url: String,
    },

    /// Resolution failed or came back short; placeholders should be hidden
    ReferenceFailed {
        message_id: String,
        reference_id: String,
    },

    TurnFinalized {
        message: Message,
    },

    TurnAborted {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<Message>,
    },

    /// A user message was appended to the active session
    UserMessageAdded {
        message: Message,
    },

    FeedbackChanged {
        session_id: String,
        feedback: Feedback,
        previous: Feedback,
        #[serde(skip_serializing_if = "Option::is_none")]
        user_message: Option<Message>,
        assistant_message: Message,
    },

    SessionStarted {
        session_id: String,
    },

    SessionLoaded {
        session_id: String,
        messages: Vec<Message>,
    },
}
