use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::client::TelegramClient;
use crate::pipeline::Broker;

/// Sequential `getUpdates` consumer. Each update runs through the pipeline
/// before the next one is taken.
pub struct Poller {
    client: TelegramClient,
    broker: Arc<Broker>,
    interval: Duration,
    offset: i64,
}

impl Poller {
    pub fn new(client: TelegramClient, broker: Arc<Broker>, interval: Duration) -> Self {
        Self {
            client,
            broker,
            interval,
            offset: 0,
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Fetches and processes one batch, returning how many updates it held.
    pub async fn poll_once(&mut self) -> anyhow::Result<usize> {
        let updates = self.client.get_updates(self.offset).await?;
        let count = updates.len();
        for update in updates {
            let update_id = update.update_id;
            self.broker.process(update.into_inbound()).await;
            if update_id >= self.offset {
                self.offset = update_id + 1;
            }
        }
        Ok(count)
    }

    /// Polls until the surrounding task is dropped. Failed or empty polls
    /// wait one interval before retrying.
    pub async fn run(mut self) {
        info!(interval_sec = self.interval.as_secs(), "telegram polling started");
        loop {
            match self.poll_once().await {
                Ok(0) => tokio::time::sleep(self.interval).await,
                Ok(count) => debug!(count, offset = self.offset, "processed updates"),
                Err(error) => {
                    warn!(error = %error, "getUpdates failed");
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}
