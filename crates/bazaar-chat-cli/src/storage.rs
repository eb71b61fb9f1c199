use async_trait::async_trait;
use bazaar_chat::{
    now_millis, Chat, DeliveryState, Error, Message, MessageStore, NewChat, NewMessage, Result,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

fn io_error(context: &str, e: std::io::Error) -> Error {
    Error::Store(format!("{}: {}", context, e))
}

/// File-based message store (agent-friendly - every row is a JSON file).
///
/// `chats/<id>.json` holds one chat, `messages/<id>.json` one confirmed
/// message. Writes go through a temp file and a rename, so a watcher never
/// sees a half-written row.
#[derive(Debug, Clone)]
pub struct FileStore {
    chats_dir: PathBuf,
    messages_dir: PathBuf,
}

impl FileStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let chats_dir = data_dir.join("chats");
        let messages_dir = data_dir.join("messages");
        fs::create_dir_all(&chats_dir).map_err(|e| io_error("create chats dir", e))?;
        fs::create_dir_all(&messages_dir).map_err(|e| io_error("create messages dir", e))?;
        Ok(Self {
            chats_dir,
            messages_dir,
        })
    }

    pub fn messages_dir(&self) -> &Path {
        &self.messages_dir
    }

    pub fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>> {
        read_json(&self.chats_dir.join(format!("{}.json", chat_id)))
    }

    fn all_chats(&self) -> Result<Vec<Chat>> {
        read_dir_json(&self.chats_dir)
    }

    fn all_messages(&self) -> Result<Vec<Message>> {
        read_dir_json(&self.messages_dir)
    }

    fn last_message_for<'a>(messages: &'a [Message], chat_id: &str) -> Option<&'a Message> {
        messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .max_by_key(|m| (m.created_at, m.seq))
    }
}

fn write_json<T: Serialize>(dir: &Path, id: &str, value: &T) -> Result<()> {
    let path = dir.join(format!("{}.json", id));
    let temp_path = dir.join(format!("{}.json.tmp", id));
    let content = serde_json::to_string_pretty(value)?;
    fs::write(&temp_path, content).map_err(|e| io_error("write temp file", e))?;
    fs::rename(&temp_path, &path).map_err(|e| io_error("rename temp file", e))?;
    Ok(())
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|e| io_error("read file", e))?;
    Ok(Some(serde_json::from_str(&content)?))
}

fn read_dir_json<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| io_error("read dir", e))? {
        let path = entry.map_err(|e| io_error("read dir entry", e))?.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            if let Some(value) = read_json(&path)? {
                out.push(value);
            }
        }
    }
    Ok(out)
}

#[async_trait]
impl MessageStore for FileStore {
    async fn append(&self, message: NewMessage) -> Result<Message> {
        if self.get_chat(&message.chat_id)?.is_none() {
            return Err(Error::NotFound(format!("chat {}", message.chat_id)));
        }
        let existing = self.all_messages()?;
        let seq = existing.iter().map(|m| m.seq).max().unwrap_or(0) + 1;
        let floor = Self::last_message_for(&existing, &message.chat_id)
            .map(|m| m.created_at)
            .unwrap_or(0);

        let stored = Message {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: message.chat_id,
            sender_id: message.sender_id,
            content: message.content,
            created_at: now_millis().max(floor),
            seq,
            correlation_id: message.correlation_id,
            state: DeliveryState::Confirmed,
        };
        write_json(&self.messages_dir, &stored.id, &stored)?;
        debug!(message = %stored.id, chat = %stored.chat_id, "message written");
        Ok(stored)
    }

    async fn fetch_history(&self, chat_id: &str) -> Result<Vec<Message>> {
        let mut history: Vec<Message> = self
            .all_messages()?
            .into_iter()
            .filter(|m| m.chat_id == chat_id)
            .collect();
        history.sort_by_key(|m| (m.created_at, m.seq));
        Ok(history)
    }

    async fn fetch_by_id(&self, message_id: &str) -> Result<Message> {
        read_json(&self.messages_dir.join(format!("{}.json", message_id)))?
            .ok_or_else(|| Error::NotFound(format!("message {}", message_id)))
    }

    async fn list_chats_for_user(&self, user_id: &str) -> Result<Vec<Chat>> {
        let messages = self.all_messages()?;
        let mut chats: Vec<Chat> = self
            .all_chats()?
            .into_iter()
            .filter(|c| c.involves(user_id))
            .map(|mut chat| {
                chat.last_message = Self::last_message_for(&messages, &chat.id).map(Message::preview);
                chat
            })
            .collect();
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chats)
    }

    async fn find_chat(&self, product_id: &str, buyer_id: &str) -> Result<Option<Chat>> {
        Ok(self
            .all_chats()?
            .into_iter()
            .find(|c| c.product_id == product_id && c.buyer_id == buyer_id))
    }

    async fn create_chat(&self, chat: NewChat) -> Result<Chat> {
        if self.find_chat(&chat.product_id, &chat.buyer_id).await?.is_some() {
            return Err(Error::Conflict(format!(
                "chat for product {} and buyer {} already exists",
                chat.product_id, chat.buyer_id
            )));
        }
        let created = Chat {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: chat.product_id,
            product_title: chat.product_title,
            buyer_id: chat.buyer_id,
            seller_id: chat.seller_id,
            created_at: now_millis(),
            last_message: None,
        };
        write_json(&self.chats_dir, &created.id, &created)?;
        Ok(created)
    }
}
