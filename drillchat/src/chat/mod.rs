//! Chat session state: the message log and the controller driving one conversation.

mod controller;
mod store;

pub use controller::{
    ChatEvent, ChatSession, SendOutcome, SessionOptions, DRILLING_WELCOME, GENERIC_APOLOGY,
};
pub use store::MessageStore;
