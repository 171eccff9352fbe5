use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chatgate_commons::{AllowedCommand, CommandRequest, CommandResponse};
use chatgate_config::LocalExecutionConfig;
use tracing::{debug, info};

use crate::dynamic::{DispatchSettings, DynamicCommandDispatcher};
use crate::sandbox::PathSandbox;
use crate::static_exec::StaticCommandExecutor;

/// Anything that can turn a routed request into a response: local dispatch,
/// or forwarding to another host. `Err` is reserved for collaborator failures
/// (transport, protocol); command failures are `Ok` responses with `ok == false`.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandResponse>;
}

pub const EMPTY_COMMAND: &str = "empty command";
pub const COMMAND_BLOCKED: &str = "command blocked";
pub const COMMAND_NOT_ALLOWED: &str = "command not allowed";

/// Executes on this host: blocklist first, then the dynamic catalog, then
/// the static command table.
pub struct LocalExecutor {
    dispatcher: Option<DynamicCommandDispatcher>,
    dynamic_allowlist: Vec<String>,
    static_commands: BTreeMap<String, AllowedCommand>,
    blocklist: Vec<String>,
    static_executor: StaticCommandExecutor,
    timeout: Duration,
    max_output_kb: usize,
    base_dir_key: &'static str,
}

impl LocalExecutor {
    pub fn from_config(config: &LocalExecutionConfig) -> Result<Self> {
        let timeout = config.timeout();
        let max_output_bytes = config.max_output_bytes();
        let base_dir = config.base_dir.trim();
        let dispatcher = if base_dir.is_empty() {
            None
        } else {
            let sandbox = PathSandbox::new(base_dir)
                .with_context(|| format!("Failed to prepare base_dir {base_dir}"))?;
            info!(root = %sandbox.root().display(), "dynamic commands confined to base_dir");
            Some(DynamicCommandDispatcher::new(
                sandbox,
                DispatchSettings {
                    timeout,
                    max_output_bytes,
                },
            ))
        };

        Ok(Self {
            dispatcher,
            dynamic_allowlist: config.dynamic_allowlist.clone(),
            static_commands: config.command_allowlist.clone(),
            blocklist: config.command_blocklist.clone(),
            static_executor: StaticCommandExecutor,
            timeout,
            max_output_kb: max_output_bytes / 1024,
            base_dir_key: "execution.local.base_dir",
        })
    }

    /// Config key named in the error when a dynamic command runs without a root.
    pub fn with_base_dir_key(mut self, key: &'static str) -> Self {
        self.base_dir_key = key;
        self
    }

    pub fn dispatcher(&self) -> Option<&DynamicCommandDispatcher> {
        self.dispatcher.as_ref()
    }

    fn is_blocked(&self, name: &str) -> bool {
        self.blocklist
            .iter()
            .any(|blocked| blocked.trim().eq_ignore_ascii_case(name))
    }

    fn is_dynamic(&self, name: &str) -> bool {
        self.dynamic_allowlist
            .iter()
            .any(|allowed| allowed.trim().eq_ignore_ascii_case(name))
    }

    fn static_command(&self, name: &str) -> Option<&AllowedCommand> {
        self.static_commands.get(name).or_else(|| {
            self.static_commands
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, command)| command)
        })
    }

    pub async fn run(&self, request: &CommandRequest) -> CommandResponse {
        let name = request.command.trim();
        if name.is_empty() {
            return CommandResponse::rejected(EMPTY_COMMAND);
        }
        if self.is_blocked(name) {
            info!(command = name, chat_id = request.chat_id, "command blocked");
            return CommandResponse::rejected(COMMAND_BLOCKED);
        }

        if self.is_dynamic(name) {
            let Some(dispatcher) = &self.dispatcher else {
                return CommandResponse::rejected(format!("{} not configured", self.base_dir_key));
            };
            debug!(command = name, chat_id = request.chat_id, "dispatching dynamic command");
            return dispatcher
                .dispatch_named(request.chat_id, name, &request.args)
                .await;
        }

        match self.static_command(name) {
            Some(command) => {
                if !request.args.is_empty() {
                    debug!(command = name, "ignoring request arguments for static command");
                }
                self.static_executor
                    .execute(command, self.timeout, self.max_output_kb)
                    .await
            }
            None => CommandResponse::rejected(COMMAND_NOT_ALLOWED),
        }
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandResponse> {
        Ok(self.run(request).await)
    }
}
