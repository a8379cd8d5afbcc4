//! Session identity for session-backed conversations.

use std::str::FromStr;

use chrono::Utc;
use rand::prelude::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// Opaque token grouping messages into one server-persisted conversation.
///
/// A fresh id is generated once per mounted chat surface and passed
/// explicitly to every message, history and clear call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new id of the form `session_<unix-millis>_<random base-36>`.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| char::from(*SUFFIX_ALPHABET.choose(&mut rng).unwrap_or(&b'0')))
            .collect();

        Self(format!("session_{}_{suffix}", Utc::now().timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SessionId {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ChatError::BlankSessionId);
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
