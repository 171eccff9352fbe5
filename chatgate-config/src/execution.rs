use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chatgate_commons::AllowedCommand;
use serde::{Deserialize, Serialize};

use crate::constants::defaults;

/// Settings for executing commands on this host.
///
/// Shared by the broker (`execution.local`) and the agent (`execution`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalExecutionConfig {
    #[serde(default)]
    pub default_timeout_sec: i64,
    #[serde(default)]
    pub max_output_kb: i64,
    /// Root every dynamic path-based command is confined to.
    #[serde(default)]
    pub base_dir: String,
    /// Names of dynamic commands enabled on this host.
    #[serde(default)]
    pub dynamic_allowlist: Vec<String>,
    /// Static commands: name to fixed executable plus arguments.
    #[serde(default)]
    pub command_allowlist: BTreeMap<String, AllowedCommand>,
    #[serde(default)]
    pub command_blocklist: Vec<String>,
}

impl LocalExecutionConfig {
    pub fn apply_defaults(&mut self) {
        if self.default_timeout_sec <= 0 {
            self.default_timeout_sec = defaults::EXEC_TIMEOUT_SEC;
        }
        if self.max_output_kb <= 0 {
            self.max_output_kb = defaults::EXEC_MAX_OUTPUT_KB;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_sec.max(1).unsigned_abs())
    }

    pub fn max_output_bytes(&self) -> usize {
        usize::try_from(self.max_output_kb.max(1))
            .unwrap_or(usize::MAX / 1024)
            .saturating_mul(1024)
    }

    pub fn has_allowlist(&self) -> bool {
        !self.command_allowlist.is_empty() || !self.dynamic_allowlist.is_empty()
    }

    /// Lower-cased, de-duplicated, sorted union of static and dynamic names.
    pub fn derived_allowlist(&self) -> Vec<String> {
        self.command_allowlist
            .keys()
            .chain(self.dynamic_allowlist.iter())
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
