use thiserror::Error;

/// Startup validation failures. Any of these is fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(
        "local mode requires execution.local.command_allowlist or execution.local.dynamic_allowlist"
    )]
    MissingLocalAllowlist,
    #[error("execution.forward_url required when execution.mode is forward")]
    MissingForwardUrl,
    #[error("unsupported execution.mode: {0}")]
    UnsupportedExecutionMode(String),
    #[error("unsupported telegram.mode: {0}")]
    UnsupportedTelegramMode(String),
    #[error("telegram.webhook_path must start with '/': {0}")]
    InvalidWebhookPath(String),
}
