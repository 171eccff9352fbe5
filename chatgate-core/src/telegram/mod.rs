//! Telegram Bot API transport: outbound `sendMessage`, the `getUpdates`
//! long-poll loop, and the webhook receiver.

mod client;
mod poller;
mod types;
mod webhook;

pub use client::TelegramClient;
pub use poller::Poller;
pub use types::{Chat, Message, Update, UpdatesResponse, User};
pub use webhook::{MAX_WEBHOOK_BODY_BYTES, webhook_router};
