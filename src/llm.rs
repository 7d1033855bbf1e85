use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

// Anthropic Messages API endpoint and version header.
const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Model used for both vision analysis and task planning.
pub const MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Debug, Clone)]
pub enum LlmError {
    Network(String),
    Http { status: u16, body: String },
    Timeout,
}

impl LlmError {
    /// Transient failures are worth a retry with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Network(_) | LlmError::Timeout => true,
            LlmError::Http { status, .. } => *status >= 500,
        }
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Network(msg) => write!(f, "network error: {msg}"),
            LlmError::Http { status, body } => {
                let snippet: String = body.chars().take(200).collect();
                write!(f, "HTTP {status}: {snippet}")
            }
            LlmError::Timeout => write!(f, "request timed out"),
        }
    }
}

impl std::error::Error for LlmError {}

/// Transport seam for the remote LLM service. Tests inject scripted
/// implementations; production uses [`HttpLlmTransport`].
#[async_trait]
pub trait LlmTransport: Send + Sync {
    /// Send one Messages API payload and return the raw response body.
    async fn send(&self, payload: Value, timeout: Duration) -> Result<String, LlmError>;
}

/// reqwest-backed transport against the Anthropic Messages API.
pub struct HttpLlmTransport {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl HttpLlmTransport {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: API_URL.to_string(),
        }
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl LlmTransport for HttpLlmTransport {
    async fn send(&self, payload: Value, timeout: Duration) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Network(err.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| LlmError::Network(err.to_string()))?;

        if !status.is_success() {
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

/// Pull the first text block out of a Messages API response body.
pub fn extract_text_content(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("content")?
        .as_array()?
        .iter()
        .find(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .and_then(|block| block.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Total tokens reported in the usage field, zero when absent.
pub fn extract_token_count(body: &str) -> u32 {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return 0,
    };
    let usage = match value.get("usage") {
        Some(u) => u,
        None => return 0,
    };
    let input = usage
        .get("input_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let output = usage
        .get("output_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    (input + output) as u32
}

/// Extract a JSON payload from model output: either bare JSON or a
/// fenced ```json block.
pub fn extract_json_payload(text: &str) -> Option<String> {
    let stripped = text.trim();
    if stripped.starts_with('[') || stripped.starts_with('{') {
        return Some(stripped.to_string());
    }
    let fence_start = stripped.find("```")?;
    let after = &stripped[fence_start + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    let fence_end = after.find("```")?;
    let inner = after[..fence_end].trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner.to_string())
    }
}
