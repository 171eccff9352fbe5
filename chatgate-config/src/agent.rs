use serde::{Deserialize, Serialize};

use crate::constants::defaults;
use crate::execution::LocalExecutionConfig;

/// Configuration for the forwarding agent's HTTP endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub listen_addr: String,
    /// Shared secret expected in `X-Auth-Token`. Empty disables the check.
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub execution: LocalExecutionConfig,
}

impl AgentConfig {
    pub fn apply_defaults(&mut self) {
        if self.listen_addr.trim().is_empty() {
            self.listen_addr = defaults::AGENT_LISTEN_ADDR.to_string();
        }
        self.execution.apply_defaults();
    }
}
