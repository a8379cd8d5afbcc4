//! Chat backend - serves the session-backed chat contract over HTTP.
//!
//! History lives in memory per session id; replies come from any
//! [`ChatTransport`] (the language model by default).
//!
//! Endpoints:
//! - POST /api/chat/message - Generate a reply and record both messages
//! - GET /api/chat/history/:sessionId - Ordered messages of a session
//! - DELETE /api/chat/history/:sessionId - Forget a session
//! - GET /api/health - Liveness probe

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    routing::post,
    Json, Router,
};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Message, SessionId};
use crate::transport::{ChatTransport, ErrorBody, SendMessageRequest, SendMessageResponse};

/// Stored conversation of one session.
#[derive(Debug, Default)]
struct Conversation {
    /// Bumped on every DELETE; exchanges started under an older epoch are not recorded.
    epoch: u64,
    messages: Vec<Message>,
}

/// Shared server state.
pub struct ServerState<G> {
    /// Map of session id -> conversation.
    histories: RwLock<HashMap<SessionId, Conversation>>,
    /// Produces assistant replies.
    generator: G,
}

/// Error response carrying a `{ "message": ... }` body.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                message: self.message,
            }),
        )
            .into_response()
    }
}

/// Build the router over a reply generator.
pub fn router<G: ChatTransport + 'static>(generator: G) -> Router {
    let state = Arc::new(ServerState {
        histories: RwLock::new(HashMap::new()),
        generator,
    });

    Router::new()
        .route("/api/health", get(health))
        .route("/api/chat/message", post(post_message::<G>))
        .route(
            "/api/chat/history/{session_id}",
            get(get_history::<G>).delete(delete_history::<G>),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server and run until it fails.
pub async fn start_server<G: ChatTransport + 'static>(port: u16, generator: G) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(%addr, generator = generator.name(), "chat backend listening");
    println!("Chat backend listening on http://{addr}/api");

    axum::serve(listener, router(generator))
        .await
        .context("Server error")
}

// === Handlers ===

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn post_message<G: ChatTransport>(
    State(state): State<Arc<ServerState<G>>>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    if req.session_id.as_str().trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Session id is required"));
    }
    if req.message.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Message is required"));
    }

    let epoch = state
        .histories
        .read()
        .await
        .get(&req.session_id)
        .map_or(0, |c| c.epoch);

    let session = Some(req.session_id.clone());
    let question = Message::user(req.message.clone())
        .with_session(session.clone())
        .with_id(Uuid::now_v7().to_string());

    let reply = state
        .generator
        .exchange(&req.message, &req.session_id)
        .await
        .map_err(|err| {
            warn!(session = %req.session_id, error = %err, "reply generation failed");
            ApiError::new(
                StatusCode::BAD_GATEWAY,
                err.reason()
                    .unwrap_or_else(|| "Failed to generate a response".to_string()),
            )
        })?;

    let answer = Message::assistant(reply.clone())
        .with_session(session)
        .with_id(Uuid::now_v7().to_string());

    let mut histories = state.histories.write().await;
    let conversation = histories.entry(req.session_id.clone()).or_default();
    if conversation.epoch == epoch {
        conversation.messages.extend([question, answer]);
    } else {
        info!(session = %req.session_id, "history cleared during exchange; reply not recorded");
    }

    Ok(Json(SendMessageResponse { response: reply }))
}

async fn get_history<G: ChatTransport>(
    State(state): State<Arc<ServerState<G>>>,
    Path(session_id): Path<SessionId>,
) -> Json<Vec<Message>> {
    let histories = state.histories.read().await;
    Json(
        histories
            .get(&session_id)
            .map(|c| c.messages.clone())
            .unwrap_or_default(),
    )
}

async fn delete_history<G: ChatTransport>(
    State(state): State<Arc<ServerState<G>>>,
    Path(session_id): Path<SessionId>,
) -> StatusCode {
    let mut histories = state.histories.write().await;
    let conversation = histories.entry(session_id.clone()).or_default();
    conversation.epoch = conversation.epoch.wrapping_add(1);
    let removed = std::mem::take(&mut conversation.messages);
    info!(session = %session_id, messages = removed.len(), "cleared chat history");
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use tokio::sync::Notify;

    use super::*;
    use crate::chat::{ChatSession, SendOutcome, SessionOptions};
    use crate::error::TransportError;
    use crate::models::MessageRole;
    use crate::transport::test_support::serve;
    use crate::transport::SessionTransport;

    /// Generator echoing the question back.
    struct Echo;

    impl ChatTransport for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn exchange(&self, text: &str, _session: &SessionId) -> Result<String, TransportError> {
            Ok(format!("echo: {text}"))
        }
    }

    /// Generator that always fails upstream.
    struct Broken;

    impl ChatTransport for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn exchange(&self, _text: &str, _session: &SessionId) -> Result<String, TransportError> {
            Err(TransportError::Upstream {
                service: "Gemini API",
                status: 429,
                message: "quota exceeded".to_string(),
            })
        }
    }

    /// Generator that signals when a request arrives and replies once released.
    struct Held {
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    impl ChatTransport for Held {
        fn name(&self) -> &str {
            "held"
        }

        async fn exchange(&self, text: &str, _session: &SessionId) -> Result<String, TransportError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(format!("late: {text}"))
        }
    }

    async fn client_for<G: ChatTransport + 'static>(generator: G) -> SessionTransport {
        let base = serve(router(generator)).await;
        SessionTransport::new(format!("{base}/api"))
    }

    #[tokio::test]
    async fn test_message_history_and_clear_round_trip() {
        let client = client_for(Echo).await;
        let session = SessionId::generate();

        assert_eq!(client.send_message("What is DT?", &session).await.unwrap(), "echo: What is DT?");
        client.send_message("And GR?", &session).await.unwrap();

        let history = client.get_history(&session).await.unwrap();
        let texts: Vec<_> = history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["What is DT?", "echo: What is DT?", "And GR?", "echo: And GR?"]);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[1].role, MessageRole::Assistant);
        assert!(history.iter().all(|m| m.id.is_some()));

        client.delete_history(&session).await.unwrap();
        assert!(client.get_history(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let client = client_for(Echo).await;
        let a = SessionId::generate();
        let b = SessionId::generate();

        client.send_message("only in a", &a).await.unwrap();
        assert_eq!(client.get_history(&a).await.unwrap().len(), 2);
        assert!(client.get_history(&b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let client = client_for(Echo).await;
        let err = client
            .send_message("   ", &SessionId::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Upstream { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_blank_session_id_is_rejected() {
        let base = serve(router(Echo)).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/chat/message"))
            .json(&serde_json::json!({"message": "hi", "sessionId": "  "}))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = resp.json().await.unwrap();
        assert_eq!(body.message, "Session id is required");
    }

    #[tokio::test]
    async fn test_exchange_finishing_after_delete_is_not_recorded() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let client = Arc::new(
            client_for(Held {
                started: started.clone(),
                release: release.clone(),
            })
            .await,
        );
        let session = SessionId::generate();

        let pending = tokio::spawn({
            let client = client.clone();
            let session = session.clone();
            async move { client.send_message("stale question", &session).await }
        });
        started.notified().await;

        client.delete_history(&session).await.unwrap();
        release.notify_one();
        assert_eq!(pending.await.unwrap().unwrap(), "late: stale question");

        assert!(client.get_history(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_during_request_stays_cleared_after_reopen() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let base = serve(router(Held {
            started: started.clone(),
            release: release.clone(),
        }))
        .await;
        let session_id = SessionId::generate();

        let chat = Arc::new(ChatSession::new(
            SessionTransport::new(format!("{base}/api")),
            SessionOptions::new().session_id(session_id.clone()),
        ));
        let pending = tokio::spawn({
            let chat = chat.clone();
            async move { chat.send("stale question").await }
        });
        started.notified().await;

        chat.clear().await.unwrap();
        release.notify_one();
        assert_eq!(pending.await.unwrap(), SendOutcome::Discarded);

        let reopened = ChatSession::open(
            SessionTransport::new(format!("{base}/api")),
            SessionOptions::new().session_id(session_id),
        )
        .await;
        assert!(reopened.messages().await.is_empty());
    }

    #[tokio::test]
    async fn test_generator_failure_maps_to_bad_gateway() {
        let client = client_for(Broken).await;
        let session = SessionId::generate();

        let err = client.send_message("hi", &session).await.unwrap_err();
        match &err {
            TransportError::Upstream { status, message, .. } => {
                assert_eq!(*status, 502);
                assert_eq!(message, "Gemini API Error: quota exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(client.get_history(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_surface_reloads_history() {
        let base = serve(router(Echo)).await;
        let session_id = SessionId::generate();

        let first = ChatSession::open(
            SessionTransport::new(format!("{base}/api")),
            SessionOptions::new().session_id(session_id.clone()),
        )
        .await;
        assert_eq!(first.send("What is ROP?").await, SendOutcome::Replied);

        let reopened = ChatSession::open(
            SessionTransport::new(format!("{base}/api")),
            SessionOptions::new().session_id(session_id),
        )
        .await;
        let messages = reopened.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, "echo: What is ROP?");

        reopened.clear().await.unwrap();
        assert!(reopened.messages().await.is_empty());
        assert!(first.transport().get_history(first.session_id()).await.unwrap().is_empty());
    }
}
