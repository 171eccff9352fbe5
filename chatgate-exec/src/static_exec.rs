use std::time::Duration;

use chatgate_commons::{AllowedCommand, CommandResponse};
use tracing::info;

use crate::runner::{ProcessOptions, run_process};

/// Runs pre-registered commands with exactly their configured arguments.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticCommandExecutor;

impl StaticCommandExecutor {
    pub async fn execute(
        &self,
        command: &AllowedCommand,
        timeout: Duration,
        max_output_kb: usize,
    ) -> CommandResponse {
        if command.exec.trim().is_empty() {
            return CommandResponse::rejected("static command has no executable");
        }

        info!(exec = %command.exec, args = ?command.args, "running static command");
        let options = ProcessOptions::new(&command.exec)
            .args(command.args.iter().cloned())
            .timeout(timeout)
            .max_output_bytes(max_output_kb.saturating_mul(1024));
        run_process(&options).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_fixed_arguments() {
        let command = AllowedCommand::new("/bin/echo", ["status", "ok"]);
        let response = StaticCommandExecutor
            .execute(&command, Duration::from_secs(5), 8)
            .await;

        assert!(response.is_success());
        assert_eq!(response.stdout, "status ok\n");
    }

    #[tokio::test]
    async fn each_stream_is_capped_independently() {
        let command = AllowedCommand::new(
            "/bin/sh",
            ["-c", "yes o | head -c 3000; yes e | head -c 3000 >&2"],
        );
        let response = StaticCommandExecutor
            .execute(&command, Duration::from_secs(5), 1)
            .await;

        assert!(response.stdout.ends_with("\n[truncated]\n"));
        assert!(response.stderr.ends_with("\n[truncated]\n"));
    }

    #[tokio::test]
    async fn empty_executable_is_rejected() {
        let response = StaticCommandExecutor
            .execute(&AllowedCommand::default(), Duration::from_secs(1), 8)
            .await;

        assert_eq!(response.exit_code, 1);
        assert_eq!(response.error, "static command has no executable");
    }
}
