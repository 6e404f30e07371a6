pub mod events;
pub mod message;
pub mod session;

pub use events::RenderEvent;
pub use message::{Attachment, Feedback, IntermediateStep, Message, Role};
pub use session::ConversationSession;
