use anyhow::Result;
use async_trait::async_trait;

/// Outbound chat text.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, chat_id: i64, text: &str) -> Result<()>;
}
