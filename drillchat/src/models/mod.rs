//! Data models shared by the chat session, its transports and the backend.

mod message;
mod session;

pub use message::{Message, MessageRole};
pub use session::SessionId;
