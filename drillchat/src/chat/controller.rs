//! Chat session controller.
//!
//! Drives one request/response cycle at a time over any [`ChatTransport`]:
//!
//! ```text
//! Idle --send(valid)--> Sending --reply or failure--> Idle
//! Idle --send(blank)--> Idle          Sending --send--> Sending (dropped)
//! Idle|Sending --clear--> Idle        (an in-flight reply is then discarded)
//! ```
//!
//! Every accepted send ends with exactly one assistant message: the reply,
//! or an `is_error` message describing the failure. Nothing escapes as an error.

use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use super::store::MessageStore;
use crate::error::{ChatError, TransportError};
use crate::models::{Message, SessionId};
use crate::transport::ChatTransport;

/// Fallback text for failures that carry no readable reason.
pub const GENERIC_APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

/// Greeting seeded into drilling-assistant surfaces.
pub const DRILLING_WELCOME: &str = "Hello! I'm your AI drilling assistant. I can help you with:\n\n\
• Analyzing drilling data and parameters\n\
• Troubleshooting drilling equipment issues\n\
• Understanding well operations and best practices\n\
• Interpreting well logs and measurements\n\n\
How can I assist you today?";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const EVENT_CAPACITY: usize = 256;

/// Per-surface configuration of a [`ChatSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    session_id: Option<SessionId>,
    welcome: Option<String>,
    request_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            session_id: None,
            welcome: None,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue an existing conversation instead of generating a new id.
    #[must_use]
    pub fn session_id(mut self, id: SessionId) -> Self {
        self.session_id = Some(id);
        self
    }

    /// Seed the conversation (and every clear) with this assistant greeting.
    #[must_use]
    pub fn welcome(mut self, text: impl Into<String>) -> Self {
        self.welcome = Some(text.into());
        self
    }

    /// Give up on a reply after `timeout`; `None` waits forever.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Result of a [`ChatSession::send`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input or a request already in flight; nothing changed.
    Ignored,
    /// The assistant replied.
    Replied,
    /// The transport failed; an error message was appended.
    Failed,
    /// The conversation was cleared while waiting; the reply was dropped.
    Discarded,
}

/// State change notification for views rendering a session.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    MessageAppended(Message),
    LoadingChanged(bool),
    /// The log was reset to its initial contents.
    Cleared,
    /// Prior history replaced the log; carries the number of messages loaded.
    HistoryLoaded(usize),
}

#[derive(Debug)]
struct SessionState {
    store: MessageStore,
    loading: bool,
    /// Bumped on every clear; replies tagged with an older generation are stale.
    generation: u64,
}

/// Controller owning one conversation's messages and request state.
pub struct ChatSession<T> {
    transport: T,
    session_id: SessionId,
    welcome: Option<String>,
    request_timeout: Option<Duration>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<ChatEvent>,
}

impl<T: ChatTransport> ChatSession<T> {
    /// Create an idle session holding only the configured welcome message, if any.
    pub fn new(transport: T, options: SessionOptions) -> Self {
        let SessionOptions {
            session_id,
            welcome,
            request_timeout,
        } = options;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            state: Mutex::new(SessionState {
                store: initial_store(welcome.as_deref()),
                loading: false,
                generation: 0,
            }),
            transport,
            session_id: session_id.unwrap_or_else(SessionId::generate),
            welcome,
            request_timeout,
            events,
        }
    }

    /// Create a session and load its prior history once.
    ///
    /// A failed load is logged and leaves the session in its initial state.
    pub async fn open(transport: T, options: SessionOptions) -> Self {
        let session = Self::new(transport, options);
        let _ = session.load_history().await;
        session
    }

    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the conversation.
    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.store.all()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.loading
    }

    /// Whether `input` would be accepted by [`send`](Self::send) right now.
    pub async fn can_send(&self, input: &str) -> bool {
        !input.trim().is_empty() && !self.is_loading().await
    }

    /// Send a user message and append the assistant's reply or an error message.
    ///
    /// Blank input, or input while a request is in flight, is silently ignored.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let generation = {
            let mut state = self.state.lock().await;
            if text.trim().is_empty() || state.loading {
                debug!(loading = state.loading, "ignoring send");
                return SendOutcome::Ignored;
            }

            let message = Message::user(text).with_session(Some(self.session_id.clone()));
            state.store.append(message.clone());
            state.loading = true;
            self.emit(ChatEvent::MessageAppended(message));
            self.emit(ChatEvent::LoadingChanged(true));
            state.generation
        };

        let result = self.exchange(text).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            debug!(session = %self.session_id, "dropping reply for a cleared conversation");
            return SendOutcome::Discarded;
        }

        let (reply, outcome) = match result {
            Ok(reply) => (Message::assistant(reply), SendOutcome::Replied),
            Err(err) => {
                warn!(
                    transport = self.transport.name(),
                    session = %self.session_id,
                    error = %err,
                    "chat exchange failed"
                );
                let text = err.reason().unwrap_or_else(|| GENERIC_APOLOGY.to_string());
                (Message::error(text), SendOutcome::Failed)
            }
        };
        let reply = reply.with_session(Some(self.session_id.clone()));

        state.store.append(reply.clone());
        state.loading = false;
        self.emit(ChatEvent::MessageAppended(reply));
        self.emit(ChatEvent::LoadingChanged(false));
        outcome
    }

    /// Reset the conversation to its initial contents and forget remote history.
    ///
    /// The local reset always happens first and also abandons any request in
    /// flight. A failed remote delete is logged and returned, never undone.
    pub async fn clear(&self) -> Result<(), ChatError> {
        {
            let mut state = self.state.lock().await;
            state.generation = state.generation.wrapping_add(1);
            state.store = initial_store(self.welcome.as_deref());
            if state.loading {
                state.loading = false;
                self.emit(ChatEvent::LoadingChanged(false));
            }
            self.emit(ChatEvent::Cleared);
        }

        match self.transport.clear_history(&self.session_id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(session = %self.session_id, error = %err, "failed to clear remote history");
                Err(ChatError::HistoryClear(err))
            }
        }
    }

    /// Replace the conversation with the transport's stored history.
    ///
    /// Returns the number of messages loaded. Transports without history load
    /// nothing. If the conversation changed while the history was in transit
    /// the local messages win.
    pub async fn load_history(&self) -> Result<usize, ChatError> {
        let (generation, len) = {
            let state = self.state.lock().await;
            (state.generation, state.store.len())
        };

        let history = match self.transport.history(&self.session_id).await {
            Ok(Some(history)) => history,
            Ok(None) => return Ok(0),
            Err(err) => {
                warn!(session = %self.session_id, error = %err, "failed to load chat history");
                return Err(ChatError::HistoryLoad(err));
            }
        };

        let mut state = self.state.lock().await;
        if state.generation != generation || state.loading || state.store.len() != len {
            debug!(session = %self.session_id, "conversation changed while loading history");
            return Ok(0);
        }

        let count = history.len();
        state.store.replace(history);
        info!(session = %self.session_id, count, "loaded chat history");
        self.emit(ChatEvent::HistoryLoaded(count));
        Ok(count)
    }

    async fn exchange(&self, text: &str) -> Result<String, TransportError> {
        let call = self.transport.exchange(text, &self.session_id);
        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(TransportError::Timeout(limit))),
            None => call.await,
        }
    }

    fn emit(&self, event: ChatEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn initial_store(welcome: Option<&str>) -> MessageStore {
    let mut store = MessageStore::new();
    if let Some(text) = welcome {
        store.append(Message::assistant(text));
    }
    store
}
