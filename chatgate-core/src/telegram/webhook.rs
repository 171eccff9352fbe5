use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use tracing::debug;

use super::types::Update;
use crate::pipeline::Broker;

pub const MAX_WEBHOOK_BODY_BYTES: usize = 1024 * 1024;

/// Router accepting Telegram webhook deliveries on `path`. Other methods on
/// the path get 405.
pub fn webhook_router(path: &str, broker: Arc<Broker>) -> Router {
    Router::new()
        .route(path, post(receive_update))
        .with_state(broker)
}

async fn receive_update(State(broker): State<Arc<Broker>>, body: Body) -> StatusCode {
    let Ok(bytes) = to_bytes(body, MAX_WEBHOOK_BODY_BYTES).await else {
        return StatusCode::BAD_REQUEST;
    };
    let update: Update = match serde_json::from_slice(&bytes) {
        Ok(update) => update,
        Err(error) => {
            debug!(error = %error, "rejecting malformed webhook update");
            return StatusCode::BAD_REQUEST;
        }
    };
    broker.process(update.into_inbound()).await;
    StatusCode::OK
}
