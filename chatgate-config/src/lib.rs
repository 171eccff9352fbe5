//! Configuration for the chatgate broker and agent processes.
//!
//! Files are read as JSON or TOML depending on their extension, secrets can
//! be overridden from the environment, and every numeric knob that is missing
//! or non-positive falls back to the defaults in [`constants`].

pub mod agent;
pub mod broker;
pub mod constants;
pub mod error;
pub mod execution;
pub mod loader;

pub use agent::AgentConfig;
pub use broker::{
    AuditConfig, BrokerConfig, ExecutionConfig, ExecutionMode, LlmConfig, PolicyConfig,
    TelegramConfig, TelegramMode,
};
pub use error::ConfigError;
pub use execution::LocalExecutionConfig;
pub use loader::{
    ConfigFormat, EnvLookup, load_agent_config, load_agent_config_with_env, load_broker_config,
    load_broker_config_with_env,
};
