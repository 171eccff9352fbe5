use serde::{Deserialize, Serialize};

use crate::pipeline::InboundMessage;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub message_id: i64,
    #[serde(default)]
    pub from: User,
    #[serde(default)]
    pub chat: Chat,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

impl Update {
    /// The pipeline input carried by this update, if it has a message.
    pub fn into_inbound(self) -> Option<InboundMessage> {
        self.message.map(|message| InboundMessage {
            user_id: message.from.id,
            chat_id: message.chat.id,
            text: message.text,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatesResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub result: Vec<Update>,
}
