pub mod conversation;
pub mod message;

pub use conversation::{ConversationSummary, Participants};
pub use message::Message;
