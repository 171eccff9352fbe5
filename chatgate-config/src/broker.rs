use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::defaults;
use crate::error::ConfigError;
use crate::execution::LocalExecutionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Local,
    Forward,
}

impl ExecutionMode {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "forward" => Ok(Self::Forward),
            other => Err(ConfigError::UnsupportedExecutionMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelegramMode {
    Polling,
    Webhook,
}

impl TelegramMode {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "polling" => Ok(Self::Polling),
            "webhook" => Ok(Self::Webhook),
            other => Err(ConfigError::UnsupportedTelegramMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub webhook_path: String,
    #[serde(default)]
    pub allowed_user_ids: Vec<i64>,
    #[serde(default)]
    pub poll_interval_sec: i64,
    /// Bot API root, overridable for self-hosted API servers.
    #[serde(default)]
    pub api_base: String,
}

impl TelegramConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_sec.max(1).unsigned_abs())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub forward_url: String,
    #[serde(default)]
    pub forward_auth_token: String,
    #[serde(default)]
    pub local: LocalExecutionConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub timeout_sec: i64,
    #[serde(default)]
    pub confidence_threshold: f64,
    #[serde(default)]
    pub base_url: String,
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec.max(1).unsigned_abs())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub rate_limit_per_minute: i64,
    #[serde(default)]
    pub command_allowlist: Vec<String>,
    #[serde(default)]
    pub command_blocklist: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Append-only audit log. No file means audit events are dropped.
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub listen_addr: String,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl BrokerConfig {
    /// Fill every missing or non-positive setting with its default and derive
    /// the policy allowlist from the local command tables when it is empty.
    pub fn apply_defaults(&mut self) {
        if self.listen_addr.trim().is_empty() {
            self.listen_addr = defaults::BROKER_LISTEN_ADDR.to_string();
        }

        let telegram = &mut self.telegram;
        if telegram.mode.trim().is_empty() {
            telegram.mode = defaults::TELEGRAM_MODE.to_string();
        }
        if telegram.webhook_path.trim().is_empty() {
            telegram.webhook_path = defaults::TELEGRAM_WEBHOOK_PATH.to_string();
        }
        if telegram.poll_interval_sec <= 0 {
            telegram.poll_interval_sec = defaults::TELEGRAM_POLL_INTERVAL_SEC;
        }
        if telegram.api_base.trim().is_empty() {
            telegram.api_base = defaults::TELEGRAM_API_BASE.to_string();
        }

        if self.execution.mode.trim().is_empty() {
            self.execution.mode = if self.execution.forward_url.trim().is_empty() {
                "local".to_string()
            } else {
                "forward".to_string()
            };
        }
        self.execution.local.apply_defaults();

        let llm = &mut self.llm;
        if llm.model.trim().is_empty() {
            llm.model = defaults::LLM_MODEL.to_string();
        }
        if llm.base_url.trim().is_empty() {
            llm.base_url = defaults::LLM_BASE_URL.to_string();
        }
        if llm.timeout_sec <= 0 {
            llm.timeout_sec = defaults::LLM_TIMEOUT_SEC;
        }
        if llm.confidence_threshold <= 0.0 {
            llm.confidence_threshold = defaults::LLM_CONFIDENCE_THRESHOLD;
        }

        if self.policy.rate_limit_per_minute <= 0 {
            self.policy.rate_limit_per_minute = defaults::RATE_LIMIT_PER_MINUTE;
        }
        if self.policy.command_allowlist.is_empty() && self.execution.local.has_allowlist() {
            self.policy.command_allowlist = self.execution.local.derived_allowlist();
        }
    }

    pub fn execution_mode(&self) -> Result<ExecutionMode, ConfigError> {
        ExecutionMode::parse(&self.execution.mode)
    }

    pub fn telegram_mode(&self) -> Result<TelegramMode, ConfigError> {
        TelegramMode::parse(&self.telegram.mode)
    }

    /// Reject configurations the broker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.execution_mode()? {
            ExecutionMode::Local => {
                if !self.execution.local.has_allowlist() {
                    return Err(ConfigError::MissingLocalAllowlist);
                }
            }
            ExecutionMode::Forward => {
                if self.execution.forward_url.trim().is_empty() {
                    return Err(ConfigError::MissingForwardUrl);
                }
            }
        }

        if self.telegram_mode()? == TelegramMode::Webhook
            && !self.telegram.webhook_path.starts_with('/')
        {
            return Err(ConfigError::InvalidWebhookPath(
                self.telegram.webhook_path.clone(),
            ));
        }
        Ok(())
    }
}
