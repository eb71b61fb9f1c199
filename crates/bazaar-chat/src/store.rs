use crate::{
    now_millis, Chat, DeliveryState, Error, InsertNotification, Message, NewChat, NewMessage,
    PushHub, Result,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Remote message store. Implementations return confirmed rows only, and
/// `fetch_history` is ascending by `(created_at, seq)`.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: NewMessage) -> Result<Message>;
    async fn fetch_history(&self, chat_id: &str) -> Result<Vec<Message>>;
    async fn fetch_by_id(&self, message_id: &str) -> Result<Message>;
    async fn list_chats_for_user(&self, user_id: &str) -> Result<Vec<Chat>>;
    async fn find_chat(&self, product_id: &str, buyer_id: &str) -> Result<Option<Chat>>;
    /// Fails with `Error::Conflict` when a chat for the (product, buyer) pair exists.
    async fn create_chat(&self, chat: NewChat) -> Result<Chat>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Append,
    FetchHistory,
    FetchById,
    ListChats,
    FindChat,
    CreateChat,
}

#[derive(Default)]
struct Inner {
    chats: Vec<Chat>,
    messages: Vec<Message>,
    next_seq: u64,
    last_created_at: u64,
    faults: HashMap<StoreOp, usize>,
}

impl Inner {
    fn take_fault(&mut self, op: StoreOp) -> Result<()> {
        match self.faults.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(Error::Store(format!("injected {:?} failure", op)))
            }
            _ => Ok(()),
        }
    }

    fn next_timestamp(&mut self, requested: u64) -> u64 {
        let created_at = requested.max(self.last_created_at);
        self.last_created_at = created_at;
        created_at
    }

    fn last_message_for(&self, chat_id: &str) -> Option<&Message> {
        self.messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .max_by_key(|m| m.order_key())
    }
}

/// Process-local store with a monotonic clock, optional push fan-out and
/// per-operation fault injection.
#[derive(Clone, Default)]
pub struct InMemoryMessageStore {
    inner: Arc<Mutex<Inner>>,
    push: Option<PushHub>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes an insert notification on `hub` for every appended message.
    pub fn with_push(hub: PushHub) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            push: Some(hub),
        }
    }

    /// Makes the next `times` calls of `op` fail with `Error::Store`.
    pub fn fail_next(&self, op: StoreOp, times: usize) {
        self.inner.lock().unwrap().faults.insert(op, times);
    }

    /// Inserts a chat as-is, keeping its id and creation time.
    pub fn seed_chat(&self, chat: Chat) {
        self.inner.lock().unwrap().chats.push(chat);
    }

    /// Appends with an explicit timestamp; still clamped to the store clock.
    pub fn append_at(&self, message: NewMessage, created_at: u64) -> Result<Message> {
        let stored = {
            let mut inner = self.inner.lock().unwrap();
            inner.take_fault(StoreOp::Append)?;
            if !inner.chats.iter().any(|c| c.id == message.chat_id) {
                return Err(Error::NotFound(format!("chat {}", message.chat_id)));
            }
            inner.next_seq += 1;
            let stored = Message {
                id: uuid::Uuid::new_v4().to_string(),
                chat_id: message.chat_id,
                sender_id: message.sender_id,
                content: message.content,
                created_at: inner.next_timestamp(created_at),
                seq: inner.next_seq,
                correlation_id: message.correlation_id,
                state: DeliveryState::Confirmed,
            };
            inner.messages.push(stored.clone());
            stored
        };

        if let Some(hub) = &self.push {
            hub.publish(InsertNotification::message(&stored.id, &stored.chat_id));
        }
        Ok(stored)
    }

    pub fn message_count(&self) -> usize {
        self.inner.lock().unwrap().messages.len()
    }

    pub fn chat_count(&self) -> usize {
        self.inner.lock().unwrap().chats.len()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, message: NewMessage) -> Result<Message> {
        self.append_at(message, now_millis())
    }

    async fn fetch_history(&self, chat_id: &str) -> Result<Vec<Message>> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault(StoreOp::FetchHistory)?;
        let mut out: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        out.sort_by_key(|m| m.order_key());
        Ok(out)
    }

    async fn fetch_by_id(&self, message_id: &str) -> Result<Message> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault(StoreOp::FetchById)?;
        inner
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("message {}", message_id)))
    }

    async fn list_chats_for_user(&self, user_id: &str) -> Result<Vec<Chat>> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault(StoreOp::ListChats)?;
        let mut out: Vec<Chat> = inner
            .chats
            .iter()
            .filter(|c| c.involves(user_id))
            .map(|c| {
                let mut chat = c.clone();
                chat.last_message = inner.last_message_for(&c.id).map(Message::preview);
                chat
            })
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn find_chat(&self, product_id: &str, buyer_id: &str) -> Result<Option<Chat>> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault(StoreOp::FindChat)?;
        Ok(inner
            .chats
            .iter()
            .find(|c| c.product_id == product_id && c.buyer_id == buyer_id)
            .cloned())
    }

    async fn create_chat(&self, chat: NewChat) -> Result<Chat> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault(StoreOp::CreateChat)?;
        if inner
            .chats
            .iter()
            .any(|c| c.product_id == chat.product_id && c.buyer_id == chat.buyer_id)
        {
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
            created_at: inner.next_timestamp(now_millis()),
            last_message: None,
        };
        inner.chats.push(created.clone());
        Ok(created)
    }
}
