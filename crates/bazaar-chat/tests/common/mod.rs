//! Test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use bazaar_chat::{
    Chat, InMemoryMessageStore, Message, MessageStore, MessagesView, NewChat, NewMessage,
    PushHub, Result, SyncConfig, ViewEvent,
};
use crossbeam_channel::Receiver;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

pub const BUYER: &str = "buyer-alice";
pub const SELLER: &str = "seller-bob";

/// Store wrapper that can hold append responses (after the row is written
/// and pushed) and history fetches for chosen chats until released.
pub struct GatedStore {
    pub inner: InMemoryMessageStore,
    hold_appends: AtomicBool,
    append_gate: Semaphore,
    held_history: Mutex<HashSet<String>>,
    history_gate: Semaphore,
}

impl GatedStore {
    pub fn new(inner: InMemoryMessageStore) -> Self {
        Self {
            inner,
            hold_appends: AtomicBool::new(false),
            append_gate: Semaphore::new(0),
            held_history: Mutex::new(HashSet::new()),
            history_gate: Semaphore::new(0),
        }
    }

    pub fn hold_appends(&self) {
        self.hold_appends.store(true, Ordering::SeqCst);
    }

    /// Lets one held append response through.
    pub fn release_append(&self) {
        self.append_gate.add_permits(1);
    }

    pub fn hold_history(&self, chat_id: &str) {
        self.held_history.lock().unwrap().insert(chat_id.to_string());
    }

    pub fn release_history(&self) {
        self.history_gate.add_permits(1);
    }
}

#[async_trait]
impl MessageStore for GatedStore {
    async fn append(&self, message: NewMessage) -> Result<Message> {
        let stored = self.inner.append(message).await?;
        if self.hold_appends.load(Ordering::SeqCst) {
            self.append_gate.acquire().await.unwrap().forget();
        }
        Ok(stored)
    }

    async fn fetch_history(&self, chat_id: &str) -> Result<Vec<Message>> {
        let held = self.held_history.lock().unwrap().contains(chat_id);
        if held {
            self.history_gate.acquire().await.unwrap().forget();
        }
        self.inner.fetch_history(chat_id).await
    }

    async fn fetch_by_id(&self, message_id: &str) -> Result<Message> {
        self.inner.fetch_by_id(message_id).await
    }

    async fn list_chats_for_user(&self, user_id: &str) -> Result<Vec<Chat>> {
        self.inner.list_chats_for_user(user_id).await
    }

    async fn find_chat(&self, product_id: &str, buyer_id: &str) -> Result<Option<Chat>> {
        self.inner.find_chat(product_id, buyer_id).await
    }

    async fn create_chat(&self, chat: NewChat) -> Result<Chat> {
        self.inner.create_chat(chat).await
    }
}

pub struct Harness {
    pub hub: PushHub,
    pub store: Arc<GatedStore>,
    pub view: Arc<MessagesView>,
    pub events: Receiver<ViewEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        let hub = PushHub::new();
        let store = Arc::new(GatedStore::new(InMemoryMessageStore::with_push(hub.clone())));
        let (tx, rx) = crossbeam_channel::unbounded();
        let view = Arc::new(MessagesView::new(
            store.clone(),
            Arc::new(hub.clone()),
            config,
            tx,
        ));
        Self {
            hub,
            store,
            view,
            events: rx,
        }
    }

    /// Seeds a chat between the test buyer and seller.
    pub fn seed_chat(&self, id: &str, created_at: u64) -> Chat {
        let chat = Chat {
            id: id.to_string(),
            product_id: format!("product-{}", id),
            product_title: Some(format!("Listing {}", id)),
            buyer_id: BUYER.to_string(),
            seller_id: SELLER.to_string(),
            created_at,
            last_message: None,
        };
        self.store.inner.seed_chat(chat.clone());
        chat
    }

    /// A message written by another client straight into the store.
    pub fn remote_append(&self, chat_id: &str, sender_id: &str, content: &str) -> Message {
        self.store
            .inner
            .append_at(
                NewMessage {
                    chat_id: chat_id.to_string(),
                    sender_id: sender_id.to_string(),
                    content: content.to_string(),
                    correlation_id: None,
                },
                bazaar_chat::now_millis(),
            )
            .unwrap()
    }

    pub fn drain_events(&self) -> Vec<ViewEvent> {
        self.events.try_iter().collect()
    }
}

pub fn test_config() -> SyncConfig {
    SyncConfig {
        refresh_debounce_ms: 20,
        ..SyncConfig::default()
    }
}

/// Polls `condition` until it holds or two seconds pass.
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

pub fn contents(messages: &[Message]) -> Vec<String> {
    messages.iter().map(|m| m.content.clone()).collect()
}
