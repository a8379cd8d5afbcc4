//! Error types for the chat session and its transports.

use std::time::Duration;

use thiserror::Error;

/// Failure of a chat backend call: network, non-2xx status, malformed body or timeout.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {service} failed")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} Error: {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Invalid response format from {service}")]
    MalformedResponse { service: &'static str },

    #[error("no reply within {} seconds", .0.as_secs())]
    Timeout(Duration),
}

impl TransportError {
    /// Human-readable reason suitable for an error bubble, if the failure carries one.
    ///
    /// Raw network errors return `None`; callers fall back to a generic apology.
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Http { .. } => None,
            Self::Upstream { .. } | Self::MalformedResponse { .. } => Some(self.to_string()),
            Self::Timeout(after) => Some(format!(
                "The assistant did not reply within {} seconds. Please try again.",
                after.as_secs()
            )),
        }
    }
}

/// Errors surfaced by the chat session outside of the send path.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("session id must not be blank")]
    BlankSessionId,

    #[error("failed to load chat history")]
    HistoryLoad(#[source] TransportError),

    #[error("failed to clear remote chat history")]
    HistoryClear(#[source] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_reason_includes_message() {
        let err = TransportError::Upstream {
            service: "Gemini API",
            status: 400,
            message: "API key not valid".to_string(),
        };
        assert_eq!(err.reason().as_deref(), Some("Gemini API Error: API key not valid"));
    }

    #[test]
    fn test_timeout_reason_mentions_duration() {
        let reason = TransportError::Timeout(Duration::from_secs(30)).reason().unwrap();
        assert!(reason.contains("30 seconds"));
    }
}
