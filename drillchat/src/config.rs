//! Runtime settings shared by every subcommand.
//!
//! Each value comes from a global command-line flag, falling back to an
//! environment variable and then a built-in default.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use secrecy::SecretString;

use crate::transport::{GeminiConfig, GeminiTransport, SessionTransport, DEFAULT_API_URL, DEFAULT_GEMINI_URL};

#[derive(Args, Clone)]
pub struct Settings {
    /// Base URL of the chat backend API
    #[arg(long, env = "DRILLCHAT_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// API key for the language model
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    pub gemini_api_key: Option<String>,

    /// Generation endpoint of the language model
    #[arg(long, env = "GEMINI_API_URL", default_value = DEFAULT_GEMINI_URL, global = true)]
    pub gemini_url: String,

    /// Seconds to wait for a reply before giving up (0 waits forever)
    #[arg(long, env = "DRILLCHAT_TIMEOUT_SECS", default_value_t = 60, global = true)]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_url", &self.api_url)
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("gemini_url", &self.gemini_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Settings {
    pub const fn request_timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Build the single-shot language-model transport.
    pub fn gemini(&self) -> Result<GeminiTransport> {
        let key = self
            .gemini_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .context("GEMINI_API_KEY is not set (pass --gemini-api-key or export it)")?;

        Ok(GeminiTransport::new(
            GeminiConfig::new(SecretString::from(key)).endpoint(self.gemini_url.clone()),
        ))
    }

    /// Build the session-backed transport for the configured backend.
    pub fn session_backend(&self) -> SessionTransport {
        SessionTransport::new(self.api_url.clone())
    }
}
