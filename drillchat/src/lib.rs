//! Drillchat - AI drilling assistant.
//!
//! A chat client for drilling-operations questions and the small backend
//! that keeps per-session conversation history.
//!
//! Architecture:
//! - [`chat::ChatSession`] owns one conversation and its request state
//! - Transports turn a user message into a reply: the language model
//!   directly, or the session-backed chat backend
//! - [`server`] is that backend, generating replies with the language model
//!
//! # Example
//!
//! ```rust,no_run
//! use drillchat::chat::{ChatSession, SessionOptions, DRILLING_WELCOME};
//! use drillchat::transport::SessionTransport;
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = SessionTransport::new("http://localhost:3000/api");
//!     let chat = ChatSession::open(transport, SessionOptions::new().welcome(DRILLING_WELCOME)).await;
//!
//!     chat.send("What is ROP?").await;
//!     for message in chat.messages().await {
//!         println!("{}: {}", message.role, message.text);
//!     }
//! }
//! ```

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod transport;
