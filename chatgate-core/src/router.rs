use anyhow::{Context, Result};
use async_trait::async_trait;
use chatgate_commons::IntentDecision;
use chatgate_config::LlmConfig;
use chatgate_config::constants::defaults;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::TransportError;
use crate::http::{LLM_ERROR_EXCERPT_BYTES, MAX_BODY_BYTES, excerpt, read_limited};

/// Maps free-form text to either a chat reply or one of the allowed
/// commands.
#[async_trait]
pub trait IntentRouter: Send + Sync {
    async fn classify(&self, text: &str, allowlist: &[String]) -> Result<IntentDecision>;
}

const SCHEMA_NAME: &str = "telegram_intent";

/// Intent router backed by the OpenAI Responses API with a strict JSON
/// schema for the decision.
#[derive(Debug, Clone)]
pub struct OpenAiRouter {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiRouter {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build LLM HTTP client")?;
        let model = match config.model.trim() {
            "" => defaults::LLM_MODEL.to_string(),
            model => model.to_string(),
        };
        let base_url = match config.base_url.trim() {
            "" => defaults::LLM_BASE_URL.to_string(),
            url => url.to_string(),
        };
        Ok(Self {
            http,
            api_key: config.api_key.trim().to_string(),
            model,
            base_url,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, text: &str, allowlist: &[String]) -> Value {
        json!({
            "model": self.model,
            "input": [
                {
                    "role": "system",
                    "content": [{ "type": "input_text", "text": system_prompt(allowlist) }],
                },
                {
                    "role": "user",
                    "content": [{ "type": "input_text", "text": text }],
                },
            ],
            "text": {
                "format": {
                    "type": "json_schema",
                    "name": SCHEMA_NAME,
                    "schema": decision_schema(),
                },
            },
        })
    }
}

fn system_prompt(allowlist: &[String]) -> String {
    format!(
        "You are a command router. Decide whether the user wants to run an allowed command or just chat. \
         If it is a command, map it to one of these intents: {}. \
         Commands may include dynamic filesystem actions (pwd, ls/ll, cd, cat, touch, mkdir, count, find) and ping, \
         but always stay within the configured base directory when using paths. \
         Return JSON only that matches the provided schema. If it is chat, respond in the 'response' field.",
        allowlist.join(", ")
    )
}

fn decision_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "type": { "type": "string", "enum": ["command", "chat"] },
            "intent": { "type": "string" },
            "args": { "type": "array", "items": { "type": "string" } },
            "response": { "type": "string" },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
        },
        "required": ["type", "intent", "args", "response", "confidence"],
        "additionalProperties": false,
    })
}

#[derive(Debug, Default, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputItem {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Default, Deserialize)]
struct ContentPart {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    refusal: String,
}

/// First usable part of the first `message` output wins: either a decision
/// encoded as `output_text`, or a refusal.
fn extract_decision(reply: &ResponsesReply) -> Result<IntentDecision, TransportError> {
    let parts = reply
        .output
        .iter()
        .filter(|item| item.kind == "message")
        .flat_map(|item| item.content.iter());
    for part in parts {
        if part.kind == "output_text" && !part.text.trim().is_empty() {
            return serde_json::from_str(&part.text).map_err(TransportError::LlmDecision);
        }
        if part.kind == "refusal" && !part.refusal.trim().is_empty() {
            return Err(TransportError::LlmRefused(part.refusal.clone()));
        }
    }
    Err(TransportError::LlmNoOutput)
}

#[async_trait]
impl IntentRouter for OpenAiRouter {
    async fn classify(&self, text: &str, allowlist: &[String]) -> Result<IntentDecision> {
        if self.api_key.is_empty() {
            return Err(TransportError::MissingApiKey.into());
        }

        let response = self
            .http
            .post(&self.base_url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&self.request_body(text, allowlist))
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = excerpt(response, LLM_ERROR_EXCERPT_BYTES).await;
            return Err(TransportError::llm_status(status, &body).into());
        }

        let body = read_limited(response, MAX_BODY_BYTES)
            .await
            .map_err(TransportError::from)?;
        let reply: ResponsesReply = serde_json::from_slice(&body).map_err(TransportError::from)?;
        let decision = extract_decision(&reply)?;
        debug!(
            kind = %decision.kind,
            intent = %decision.intent,
            confidence = decision.confidence,
            "intent classified"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reply(value: Value) -> ResponsesReply {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn decision_comes_from_first_message_text() {
        let reply = reply(json!({
            "output": [
                { "type": "reasoning", "content": [] },
                {
                    "type": "message",
                    "content": [{
                        "type": "output_text",
                        "text": "{\"type\":\"command\",\"intent\":\"status\",\"args\":[],\"response\":\"\",\"confidence\":0.9}"
                    }]
                }
            ]
        }));
        let decision = extract_decision(&reply).unwrap();
        assert_eq!(decision, IntentDecision::command("status", Vec::<String>::new(), 0.9));
    }

    #[test]
    fn refusal_is_reported() {
        let reply = reply(json!({
            "output": [{
                "type": "message",
                "content": [{ "type": "refusal", "refusal": "no" }]
            }]
        }));
        assert_eq!(extract_decision(&reply).unwrap_err().to_string(), "llm refused: no");
    }

    #[test]
    fn empty_output_is_unusable() {
        let error = extract_decision(&ResponsesReply::default()).unwrap_err();
        assert_eq!(error.to_string(), "llm returned no usable output");
    }

    #[test]
    fn malformed_decision_is_a_parse_error() {
        let reply = reply(json!({
            "output": [{
                "type": "message",
                "content": [{ "type": "output_text", "text": "not json" }]
            }]
        }));
        let error = extract_decision(&reply).unwrap_err();
        assert!(error.to_string().starts_with("llm json parse error"));
    }

    #[test]
    fn request_embeds_allowlist_and_schema() {
        let router = OpenAiRouter::from_config(&LlmConfig::default()).unwrap();
        assert_eq!(router.model(), "gpt-5.2");

        let body = router.request_body("hi", &["status".into(), "disk".into()]);
        assert_eq!(body["text"]["format"]["name"], "telegram_intent");
        assert_eq!(body["input"][1]["content"][0]["text"], "hi");
        let prompt = body["input"][0]["content"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("status, disk"));
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let router = OpenAiRouter::from_config(&LlmConfig::default()).unwrap();
        let error = router.classify("hi", &[]).await.unwrap_err();
        assert_eq!(error.to_string(), "llm.api_key is not set");
    }
}
