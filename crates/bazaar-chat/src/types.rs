use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub const MESSAGES_TABLE: &str = "messages";
pub const CHATS_TABLE: &str = "chats";

/// Window around a pending entry's local timestamp in which a confirmed row
/// with the same sender/chat/content is treated as its confirmation.
pub const DEFAULT_MATCH_WINDOW_MS: u64 = 30_000;
pub const DEFAULT_REFRESH_DEBOUNCE_MS: u64 = 250;
pub const DEFAULT_NOTICE_TTL_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    /// Only exists on the sending client; not yet acknowledged by the store.
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Store insertion order; only meaningful for confirmed rows.
    #[serde(default)]
    pub seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub state: DeliveryState,
}

impl Message {
    /// Builds the local optimistic entry for an outgoing message.
    pub fn pending(chat_id: &str, sender_id: &str, content: &str, created_at: u64) -> Self {
        Self {
            id: format!("local-{}", uuid::Uuid::new_v4()),
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            created_at,
            seq: 0,
            correlation_id: Some(uuid::Uuid::new_v4().to_string()),
            state: DeliveryState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == DeliveryState::Pending
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == DeliveryState::Confirmed
    }

    pub(crate) fn order_key(&self) -> (u64, u64) {
        (self.created_at, self.seq)
    }

    pub fn preview(&self) -> MessagePreview {
        MessagePreview {
            content: self.content.clone(),
            created_at: self.created_at,
        }
    }
}

/// Row submitted to the store; the store assigns id, timestamp and sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl From<&Message> for NewMessage {
    fn from(message: &Message) -> Self {
        Self {
            chat_id: message.chat_id.clone(),
            sender_id: message.sender_id.clone(),
            content: message.content.clone(),
            correlation_id: message.correlation_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreview {
    pub content: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_title: Option<String>,
    pub buyer_id: String,
    pub seller_id: String,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<MessagePreview>,
}

impl Chat {
    pub fn involves(&self, user_id: &str) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }

    /// The other participant from `user_id`'s point of view.
    pub fn counterpart(&self, user_id: &str) -> &str {
        if self.buyer_id == user_id {
            &self.seller_id
        } else {
            &self.buyer_id
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChat {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_title: Option<String>,
    pub buyer_id: String,
    pub seller_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRef {
    pub id: String,
    pub chat_id: String,
}

/// Push payload for an inserted row. Carries a reference only; consumers
/// fetch the full row from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertNotification {
    pub table: String,
    pub row: RowRef,
}

impl InsertNotification {
    pub fn message(message_id: &str, chat_id: &str) -> Self {
        Self {
            table: MESSAGES_TABLE.to_string(),
            row: RowRef {
                id: message_id.to_string(),
                chat_id: chat_id.to_string(),
            },
        }
    }
}

pub type Unsubscribe = Box<dyn FnOnce() + Send>;

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
