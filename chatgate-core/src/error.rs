use reqwest::StatusCode;
use thiserror::Error;

/// Failures reported by the HTTP collaborators (Telegram, the LLM endpoint,
/// a forwarding agent). The pipeline renders their `Display` text into the
/// reply it sends back to the chat.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("telegram bot token missing")]
    MissingBotToken,

    #[error("telegram status {status}: {body}")]
    TelegramStatus { status: u16, body: String },

    #[error("telegram returned ok=false")]
    TelegramNotOk,

    #[error("llm.api_key is not set")]
    MissingApiKey,

    #[error("llm status {status}: {body}")]
    LlmStatus { status: u16, body: String },

    #[error("llm refused: {0}")]
    LlmRefused(String),

    #[error("llm returned no usable output")]
    LlmNoOutput,

    #[error("llm json parse error: {0}")]
    LlmDecision(#[source] serde_json::Error),

    #[error("agent status {0}")]
    AgentStatus(u16),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TransportError {
    pub(crate) fn telegram_status(status: StatusCode, body: &[u8]) -> Self {
        Self::TelegramStatus {
            status: status.as_u16(),
            body: String::from_utf8_lossy(body).trim().to_string(),
        }
    }

    pub(crate) fn llm_status(status: StatusCode, body: &[u8]) -> Self {
        Self::LlmStatus {
            status: status.as_u16(),
            body: String::from_utf8_lossy(body).trim().to_string(),
        }
    }
}
