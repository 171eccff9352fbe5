use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chatgate_config::TelegramConfig;
use chatgate_config::constants::defaults;
use reqwest::{Client, StatusCode};
use serde_json::json;

use super::types::{Update, UpdatesResponse};
use crate::delivery::Delivery;
use crate::error::TransportError;
use crate::http::{ERROR_EXCERPT_BYTES, MAX_BODY_BYTES, excerpt, read_limited};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_CLIENT_TIMEOUT: Duration = Duration::from_secs(35);
/// Seconds the Bot API holds a `getUpdates` call open.
const LONG_POLL_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct TelegramClient {
    send_http: Client,
    poll_http: Client,
    api_base: String,
    token: String,
}

impl TelegramClient {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let send_http = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("Failed to build Telegram HTTP client")?;
        let poll_http = Client::builder()
            .timeout(POLL_CLIENT_TIMEOUT)
            .build()
            .context("Failed to build Telegram polling client")?;
        let api_base = api_base.into();
        let api_base = match api_base.trim().trim_end_matches('/') {
            "" => defaults::TELEGRAM_API_BASE.to_string(),
            base => base.to_string(),
        };
        Ok(Self {
            send_http,
            poll_http,
            api_base,
            token: token.into().trim().to_string(),
        })
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        Self::new(&config.api_base, &config.bot_token)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        if self.token.is_empty() {
            return Err(TransportError::MissingBotToken);
        }
        let response = self
            .send_http
            .post(self.method_url("sendMessage"))
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = excerpt(response, ERROR_EXCERPT_BYTES).await;
            return Err(TransportError::telegram_status(status, &body));
        }
        Ok(())
    }

    /// One long-poll call for updates at or after `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        if self.token.is_empty() {
            return Err(TransportError::MissingBotToken);
        }
        let response = self
            .poll_http
            .post(self.method_url("getUpdates"))
            .json(&json!({
                "offset": offset,
                "timeout": LONG_POLL_SECS,
                "allowed_updates": ["message"],
            }))
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = excerpt(response, ERROR_EXCERPT_BYTES).await;
            return Err(TransportError::telegram_status(status, &body));
        }
        let body = read_limited(response, MAX_BODY_BYTES).await?;
        let updates: UpdatesResponse = serde_json::from_slice(&body)?;
        if !updates.ok {
            return Err(TransportError::TelegramNotOk);
        }
        Ok(updates.result)
    }
}

#[async_trait]
impl Delivery for TelegramClient {
    async fn deliver(&self, chat_id: i64, text: &str) -> Result<()> {
        Ok(self.send_message(chat_id, text).await?)
    }
}
