use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chatgate_commons::{CommandRequest, CommandResponse};
use chatgate_exec::Executor;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::TransportError;
use crate::http::{MAX_BODY_BYTES, read_limited};

pub const AUTH_HEADER: &str = "X-Auth-Token";
const FORWARD_TIMEOUT: Duration = Duration::from_secs(15);

/// Forwards requests to a chatgate agent over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteExecutor {
    http: Client,
    forward_url: String,
    auth_token: Option<String>,
}

impl RemoteExecutor {
    pub fn new(forward_url: impl Into<String>, auth_token: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(FORWARD_TIMEOUT)
            .build()
            .context("Failed to build forwarding HTTP client")?;
        let auth_token = auth_token.into();
        let auth_token = (!auth_token.is_empty()).then_some(auth_token);
        Ok(Self {
            http,
            forward_url: forward_url.into(),
            auth_token,
        })
    }

    pub fn forward_url(&self) -> &str {
        &self.forward_url
    }
}

#[async_trait]
impl Executor for RemoteExecutor {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandResponse> {
        let mut builder = self.http.post(&self.forward_url).json(request);
        if let Some(token) = &self.auth_token {
            builder = builder.header(AUTH_HEADER, token);
        }
        let response = builder.send().await.map_err(TransportError::from)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransportError::AgentStatus(status.as_u16()).into());
        }
        let body = read_limited(response, MAX_BODY_BYTES)
            .await
            .map_err(TransportError::from)?;
        let response: CommandResponse =
            serde_json::from_slice(&body).map_err(TransportError::from)?;
        debug!(
            command = %request.command,
            ok = response.ok,
            exit_code = response.exit_code,
            "agent replied"
        );
        Ok(response)
    }
}
