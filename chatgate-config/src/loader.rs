use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::agent::AgentConfig;
use crate::broker::BrokerConfig;
use crate::constants::env;

/// Environment lookup used for secret overrides. Injected so loading stays
/// deterministic in tests.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are parsed as TOML; anything else as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn read_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let format = ConfigFormat::from_path(path);
    debug!(path = %path.display(), ?format, "parsing config file");
    match format {
        ConfigFormat::Json => serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse JSON config {}", path.display())),
        ConfigFormat::Toml => toml::from_str(&raw)
            .with_context(|| format!("Failed to parse TOML config {}", path.display())),
    }
}

fn override_from(lookup: EnvLookup<'_>, key: &str, target: &mut String) {
    if let Some(value) = lookup(key)
        && !value.trim().is_empty()
    {
        debug!(key, "applying environment override");
        *target = value.trim().to_string();
    }
}

/// Load broker settings from `path`, apply env overrides and defaults.
/// Validation is left to the caller.
pub fn load_broker_config(path: impl AsRef<Path>) -> Result<BrokerConfig> {
    load_broker_config_with_env(path, &process_env)
}

pub fn load_broker_config_with_env(
    path: impl AsRef<Path>,
    lookup: EnvLookup<'_>,
) -> Result<BrokerConfig> {
    let mut config: BrokerConfig = read_config(path.as_ref())?;
    override_from(lookup, env::TELEGRAM_BOT_TOKEN, &mut config.telegram.bot_token);
    override_from(lookup, env::LLM_API_KEY, &mut config.llm.api_key);
    override_from(
        lookup,
        env::FORWARD_AUTH_TOKEN,
        &mut config.execution.forward_auth_token,
    );
    config.apply_defaults();
    Ok(config)
}

pub fn load_agent_config(path: impl AsRef<Path>) -> Result<AgentConfig> {
    load_agent_config_with_env(path, &process_env)
}

pub fn load_agent_config_with_env(
    path: impl AsRef<Path>,
    lookup: EnvLookup<'_>,
) -> Result<AgentConfig> {
    let mut config: AgentConfig = read_config(path.as_ref())?;
    override_from(lookup, env::AGENT_AUTH_TOKEN, &mut config.auth_token);
    config.apply_defaults();
    Ok(config)
}
