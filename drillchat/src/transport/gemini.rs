//! Single-shot language-model transport.
//!
//! Every call is independent: the request carries a fixed drilling-domain
//! preamble followed by the latest user text and nothing else, so the
//! assistant remembers exactly one turn.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{http_error, ChatTransport};
use crate::error::TransportError;
use crate::models::SessionId;

const SERVICE: &str = "Gemini API";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Default generation endpoint.
pub const DEFAULT_GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1/models/gemini-pro:generateContent";

/// Text prepended to every user question.
pub const DRILLING_PREAMBLE: &str = "You are an AI assistant specializing in oil drilling \
operations and analysis. Help the user with their drilling-related questions. Current question: ";

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];
const DEFAULT_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
        }
    }
}

/// Blocking threshold for one harm category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

impl SafetySetting {
    /// The four standard categories, each blocked at medium probability and above.
    pub fn defaults() -> Vec<Self> {
        HARM_CATEGORIES
            .iter()
            .map(|category| Self {
                category: (*category).to_string(),
                threshold: DEFAULT_THRESHOLD.to_string(),
            })
            .collect()
    }
}

/// Settings for [`GeminiTransport`].
pub struct GeminiConfig {
    endpoint: String,
    api_key: SecretString,
    preamble: String,
    generation: GenerationConfig,
    safety: Vec<SafetySetting>,
}

impl GeminiConfig {
    /// Configuration with the default endpoint, preamble and sampling parameters.
    pub fn new(api_key: SecretString) -> Self {
        Self {
            endpoint: DEFAULT_GEMINI_URL.to_string(),
            api_key,
            preamble: DRILLING_PREAMBLE.to_string(),
            generation: GenerationConfig::default(),
            safety: SafetySetting::defaults(),
        }
    }

    /// Override the generation endpoint (proxies, tests).
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    #[must_use]
    pub fn generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }
}

// === Wire Types ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: RequestContent,
    generation_config: &'a GenerationConfig,
    safety_settings: &'a [SafetySetting],
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate, if non-empty.
    fn into_reply(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|text| !text.is_empty())
    }
}

/// Stateless transport calling the generation endpoint directly.
pub struct GeminiTransport {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiTransport {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn build_request(&self, prompt: &str) -> GenerateRequest<'_> {
        GenerateRequest {
            contents: RequestContent {
                role: "user",
                parts: vec![RequestPart {
                    text: format!("{}{prompt}", self.config.preamble),
                }],
            },
            generation_config: &self.config.generation,
            safety_settings: &self.config.safety,
        }
    }

    /// Generate a reply to a single prompt.
    pub async fn generate(&self, prompt: &str) -> Result<String, TransportError> {
        debug!(endpoint = %self.config.endpoint, chars = prompt.len(), "requesting generation");

        let resp = self
            .client
            .post(&self.config.endpoint)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(&self.build_request(prompt))
            .send()
            .await
            .map_err(http_error(SERVICE))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| status.to_string());
            return Err(TransportError::Upstream {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|_| TransportError::MalformedResponse { service: SERVICE })?;

        body.into_reply()
            .ok_or(TransportError::MalformedResponse { service: SERVICE })
    }
}

impl ChatTransport for GeminiTransport {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn exchange(&self, text: &str, _session: &SessionId) -> Result<String, TransportError> {
        self.generate(text).await
    }
}
