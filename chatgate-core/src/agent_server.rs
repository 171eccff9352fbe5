use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use chatgate_commons::{CommandRequest, CommandResponse};
use chatgate_exec::LocalExecutor;
use chatgate_exec::executor::{COMMAND_BLOCKED, COMMAND_NOT_ALLOWED, EMPTY_COMMAND};
use tracing::{debug, info};

use crate::remote::AUTH_HEADER;

const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Shared state of the agent's `/command` endpoint.
#[derive(Clone)]
pub struct AgentState {
    executor: Arc<LocalExecutor>,
    auth_token: Option<Arc<str>>,
}

impl AgentState {
    pub fn new(executor: LocalExecutor, auth_token: &str) -> Self {
        let auth_token = auth_token.trim();
        Self {
            executor: Arc::new(executor),
            auth_token: (!auth_token.is_empty()).then(|| Arc::from(auth_token)),
        }
    }

    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.auth_token else {
            return true;
        };
        headers
            .get(AUTH_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == &**expected)
    }
}

pub fn agent_router(state: AgentState) -> Router {
    Router::new()
        .route("/command", post(handle_command))
        .with_state(state)
}

/// HTTP status reported alongside a local execution result.
pub fn status_for(response: &CommandResponse) -> StatusCode {
    if response.ok {
        return StatusCode::OK;
    }
    match response.error.as_str() {
        EMPTY_COMMAND => StatusCode::BAD_REQUEST,
        COMMAND_BLOCKED | COMMAND_NOT_ALLOWED => StatusCode::FORBIDDEN,
        _ => StatusCode::OK,
    }
}

async fn handle_command(
    State(state): State<AgentState>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    if !state.is_authorized(&headers) {
        info!("rejecting command with bad auth token");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let Ok(bytes) = to_bytes(body, MAX_REQUEST_BYTES).await else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let request: CommandRequest = match serde_json::from_slice(&bytes) {
        Ok(request) => request,
        Err(error) => {
            debug!(error = %error, "rejecting malformed command request");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let response = state.executor.run(&request).await;
    info!(
        command = %request.command,
        chat_id = request.chat_id,
        ok = response.ok,
        exit_code = response.exit_code,
        "agent executed command"
    );
    (status_for(&response), Json(response)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_rejection_reason() {
        assert_eq!(status_for(&CommandResponse::success("x")), StatusCode::OK);
        assert_eq!(
            status_for(&CommandResponse::rejected("empty command")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&CommandResponse::rejected("command blocked")),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&CommandResponse::rejected("command not allowed")),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&CommandResponse::rejected("exit status 2")),
            StatusCode::OK
        );
    }
}
