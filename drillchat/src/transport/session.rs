//! Session-backed transport talking to the chat backend.
//!
//! Endpoints (relative to the API base URL):
//! - POST /chat/message - Send a message, receive the reply
//! - GET /chat/history/:sessionId - Ordered messages of a session
//! - DELETE /chat/history/:sessionId - Forget a session

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{http_error, ChatTransport};
use crate::error::TransportError;
use crate::models::{Message, SessionId};

const SERVICE: &str = "Chat API";

/// Default base URL of the chat backend.
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Body of `POST /chat/message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub message: String,
    pub session_id: SessionId,
}

/// Reply to `POST /chat/message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub response: String,
}

/// Body of any non-2xx backend response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// Transport whose backend persists the conversation under a session id.
pub struct SessionTransport {
    client: reqwest::Client,
    base_url: String,
}

impl SessionTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn history_url(&self, session: &SessionId) -> String {
        format!(
            "{}/chat/history/{}",
            self.base_url,
            urlencoding::encode(session.as_str())
        )
    }

    /// Send one message within a session.
    pub async fn send_message(
        &self,
        message: &str,
        session: &SessionId,
    ) -> Result<String, TransportError> {
        let url = format!("{}/chat/message", self.base_url);
        debug!(%url, session = %session, "sending chat message");

        let body = SendMessageRequest {
            message: message.to_string(),
            session_id: session.clone(),
        };
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(http_error(SERVICE))?;

        let reply: SendMessageResponse = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|_| TransportError::MalformedResponse { service: SERVICE })?;

        if reply.response.trim().is_empty() {
            return Err(TransportError::MalformedResponse { service: SERVICE });
        }
        Ok(reply.response)
    }

    /// Fetch the ordered history of a session.
    pub async fn get_history(&self, session: &SessionId) -> Result<Vec<Message>, TransportError> {
        let resp = self
            .client
            .get(self.history_url(session))
            .send()
            .await
            .map_err(http_error(SERVICE))?;

        check_status(resp)
            .await?
            .json()
            .await
            .map_err(|_| TransportError::MalformedResponse { service: SERVICE })
    }

    /// Delete the history of a session.
    pub async fn delete_history(&self, session: &SessionId) -> Result<(), TransportError> {
        let resp = self
            .client
            .delete(self.history_url(session))
            .send()
            .await
            .map_err(http_error(SERVICE))?;

        check_status(resp).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into [`TransportError::Upstream`], preferring the body's `message`.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = resp
        .json::<ErrorBody>()
        .await
        .map(|body| body.message)
        .unwrap_or_else(|_| status.to_string());

    Err(TransportError::Upstream {
        service: SERVICE,
        status: status.as_u16(),
        message,
    })
}

impl ChatTransport for SessionTransport {
    fn name(&self) -> &str {
        "session"
    }

    async fn exchange(&self, text: &str, session: &SessionId) -> Result<String, TransportError> {
        self.send_message(text, session).await
    }

    async fn history(&self, session: &SessionId) -> Result<Option<Vec<Message>>, TransportError> {
        self.get_history(session).await.map(Some)
    }

    async fn clear_history(&self, session: &SessionId) -> Result<(), TransportError> {
        self.delete_history(session).await
    }
}
