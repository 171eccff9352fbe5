use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chatgate_config::{
    AgentConfig, BrokerConfig, ExecutionMode, TelegramMode, load_agent_config, load_broker_config,
};
use chatgate_core::{
    AgentState, Broker, BrokerSettings, Executor, OpenAiRouter, Poller, RateLimiter,
    RemoteExecutor, TelegramClient, agent_router, audit_sink_from_config, webhook_router,
};
use chatgate_exec::LocalExecutor;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub(crate) fn build_executor(config: &BrokerConfig) -> Result<Arc<dyn Executor>> {
    match config.execution_mode()? {
        ExecutionMode::Local => {
            let executor = LocalExecutor::from_config(&config.execution.local)?;
            Ok(Arc::new(executor))
        }
        ExecutionMode::Forward => {
            info!(url = %config.execution.forward_url, "forwarding commands to agent");
            let executor = RemoteExecutor::new(
                config.execution.forward_url.trim(),
                config.execution.forward_auth_token.as_str(),
            )?;
            Ok(Arc::new(executor))
        }
    }
}

pub(crate) fn build_broker(config: &BrokerConfig, telegram: TelegramClient) -> Result<Broker> {
    let executor = build_executor(config)?;
    let mut broker = Broker::new(
        BrokerSettings::from_config(config),
        RateLimiter::per_minute(config.policy.rate_limit_per_minute),
        executor,
        Arc::new(telegram),
    )
    .with_audit(audit_sink_from_config(&config.audit));
    if config.llm.enabled {
        broker = broker.with_router(Arc::new(OpenAiRouter::from_config(&config.llm)?));
    }
    Ok(broker)
}

pub(crate) async fn run_broker(path: &Path) -> Result<()> {
    let config = load_broker_config(path)?;
    config.validate().context("Invalid broker configuration")?;
    if config.telegram.allowed_user_ids.is_empty() {
        warn!("telegram.allowed_user_ids is empty; every message will be rejected");
    }

    let telegram = TelegramClient::from_config(&config.telegram)?;
    let broker = Arc::new(build_broker(&config, telegram.clone())?);

    match config.telegram_mode()? {
        TelegramMode::Polling => {
            info!("broker starting in polling mode");
            let poller = Poller::new(telegram, broker, config.telegram.poll_interval());
            tokio::select! {
                () = poller.run() => {}
                _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
            }
            Ok(())
        }
        TelegramMode::Webhook => {
            let app = webhook_router(&config.telegram.webhook_path, broker);
            let addr = parse_addr(&config.listen_addr)?;
            info!(%addr, path = %config.telegram.webhook_path, "broker listening (webhook mode)");
            serve(addr, app).await
        }
    }
}

pub(crate) async fn run_agent(path: &Path) -> Result<()> {
    let config: AgentConfig = load_agent_config(path)?;
    if !config.execution.has_allowlist() {
        warn!("agent has no static or dynamic commands configured");
    }
    if config.auth_token.trim().is_empty() {
        warn!("agent auth_token is empty; /command accepts unauthenticated requests");
    }

    let executor = LocalExecutor::from_config(&config.execution)?.with_base_dir_key("base_dir");
    let app = agent_router(AgentState::new(executor, &config.auth_token));
    let addr = parse_addr(&config.listen_addr)?;
    info!(%addr, "agent listening");
    serve(addr, app).await
}

fn parse_addr(listen_addr: &str) -> Result<SocketAddr> {
    listen_addr
        .parse()
        .with_context(|| format!("Invalid listen_addr {listen_addr}"))
}

async fn serve(addr: SocketAddr, app: axum::Router) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgate_config::load_broker_config_with_env;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("broker.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn forward_mode_builds_remote_executor() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{"execution": {"forward_url": "http://127.0.0.1:8080/command"}}"#,
        );
        let config = load_broker_config_with_env(&path, &no_env).unwrap();
        config.validate().unwrap();
        assert!(build_executor(&config).is_ok());
    }

    #[test]
    fn local_mode_without_commands_fails_validation() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(&dir, "{}");
        let config = load_broker_config_with_env(&path, &no_env).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn llm_router_is_attached_when_enabled() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{"llm": {"enabled": true},
                "execution": {"local": {"command_allowlist": {"uptime": {"exec": "/usr/bin/uptime"}}}}}"#,
        );
        let config = load_broker_config_with_env(&path, &no_env).unwrap();
        let telegram = TelegramClient::from_config(&config.telegram).unwrap();
        let broker = build_broker(&config, telegram).unwrap();
        assert!(broker.settings().llm_enabled);
        assert_eq!(broker.settings().policy.allowlist(), ["uptime".to_string()]);
    }

    #[test]
    fn listen_addr_must_be_a_socket_address() {
        assert!(parse_addr("127.0.0.1:8081").is_ok());
        assert!(parse_addr("localhost").is_err());
    }
}
