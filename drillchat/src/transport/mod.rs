//! Chat transports: the network calls that turn a user message into an assistant reply.
//!
//! Two interchangeable implementations exist:
//! - [`GeminiTransport`] calls the language model directly, one turn at a time.
//! - [`SessionTransport`] talks to the chat backend, which keeps per-session history.

mod gemini;
mod session;

use std::future::Future;

use crate::error::TransportError;
use crate::models::{Message, SessionId};

pub use gemini::{
    GeminiConfig, GeminiTransport, GenerationConfig, SafetySetting, DEFAULT_GEMINI_URL,
    DRILLING_PREAMBLE,
};
pub use session::{ErrorBody, SendMessageRequest, SendMessageResponse, SessionTransport, DEFAULT_API_URL};

/// Capability set a chat session needs from its backend.
///
/// Only `exchange` is required. Transports that keep no server-side history
/// leave `history` returning `Ok(None)` and `clear_history` as a no-op.
pub trait ChatTransport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Send one user message and wait for the assistant's reply.
    fn exchange(
        &self,
        text: &str,
        session: &SessionId,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;

    /// Fetch prior messages for a session, or `None` if this transport keeps no history.
    fn history(
        &self,
        _session: &SessionId,
    ) -> impl Future<Output = Result<Option<Vec<Message>>, TransportError>> + Send {
        async { Ok(None) }
    }

    /// Delete server-side history for a session.
    fn clear_history(
        &self,
        _session: &SessionId,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        async { Ok(()) }
    }
}

/// Map a failed `send()`/`json()` into a transport error for `service`.
fn http_error(service: &'static str) -> impl FnOnce(reqwest::Error) -> TransportError {
    move |source| TransportError::Http { service, source }
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::Router;

    /// Serve `router` on an ephemeral local port and return its base URL.
    pub async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }
}
