use crate::{
    now_millis, Chat, Error, MessageStore, NewChat, NoticeKind, Result, SharedState, ViewEvent,
};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The signed-in user's chats, newest chat first.
#[derive(Debug, Clone, Default)]
pub struct ChatDirectory {
    chats: Vec<Chat>,
    loaded: bool,
}

impl ChatDirectory {
    pub fn replace(&mut self, mut chats: Vec<Chat>) {
        order_by_creation(&mut chats);
        self.chats = chats;
        self.loaded = true;
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn get(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == chat_id)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn clear(&mut self) {
        self.chats.clear();
        self.loaded = false;
    }
}

/// Orders by chat creation time, descending. Recent activity does not
/// promote a chat.
pub fn order_by_creation(chats: &mut [Chat]) {
    chats.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Finds the chat for (product, buyer) or creates it. Never yields two ids
/// for one pair, even when another client creates it concurrently.
pub async fn initiate_contact(store: &dyn MessageStore, contact: NewChat) -> Result<Chat> {
    for (field, value) in [
        ("product", &contact.product_id),
        ("buyer", &contact.buyer_id),
        ("seller", &contact.seller_id),
    ] {
        if value.trim().is_empty() {
            return Err(Error::Validation(format!("{} reference is empty", field)));
        }
    }
    if contact.buyer_id == contact.seller_id {
        return Err(Error::Validation(
            "cannot start a chat about your own listing".to_string(),
        ));
    }

    if let Some(existing) = store
        .find_chat(&contact.product_id, &contact.buyer_id)
        .await?
    {
        debug!(chat = %existing.id, "reusing existing chat");
        return Ok(existing);
    }

    let product_id = contact.product_id.clone();
    let buyer_id = contact.buyer_id.clone();
    match store.create_chat(contact).await {
        Ok(chat) => {
            info!(chat = %chat.id, product = %chat.product_id, "chat created");
            Ok(chat)
        }
        Err(Error::Conflict(_)) => store
            .find_chat(&product_id, &buyer_id)
            .await?
            .ok_or_else(|| Error::Store("chat vanished after conflict".to_string())),
        Err(e) => Err(e),
    }
}

pub struct DirectoryService {
    store: Arc<dyn MessageStore>,
    state: SharedState,
    events: Sender<ViewEvent>,
}

impl DirectoryService {
    pub fn new(store: Arc<dyn MessageStore>, state: SharedState, events: Sender<ViewEvent>) -> Self {
        Self {
            store,
            state,
            events,
        }
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<Chat>> {
        let mut chats = self.store.list_chats_for_user(user_id).await?;
        order_by_creation(&mut chats);
        Ok(chats)
    }

    /// Re-lists for the signed-in user and swaps the directory wholesale.
    /// On failure the previous directory stays in place.
    pub async fn refresh(&self) -> Result<usize> {
        let user_id = self.state.lock().unwrap().user_id.clone();
        let Some(user_id) = user_id else {
            return Err(Error::NotSignedIn);
        };

        let chats = match self.list(&user_id).await {
            Ok(chats) => chats,
            Err(e) => {
                warn!(error = %e, "directory refresh failed, keeping previous list");
                return Err(e);
            }
        };

        let count = chats.len();
        {
            let mut state = self.state.lock().unwrap();
            if state.user_id.as_deref() != Some(user_id.as_str()) {
                debug!("directory result for signed-out user discarded");
                return Ok(0);
            }
            state.directory.replace(chats);
        }
        let _ = self.events.send(ViewEvent::DirectoryRefreshed { chats: count });
        Ok(count)
    }

    /// First load when the view opens; unlike background refreshes, a
    /// failure here is shown to the user.
    pub async fn load_initial(&self) -> Result<usize> {
        match self.refresh().await {
            Ok(count) => Ok(count),
            Err(Error::NotSignedIn) => Err(Error::NotSignedIn),
            Err(e) => {
                let id = self.state.lock().unwrap().notices.raise(
                    NoticeKind::DirectoryUnavailable,
                    "Error loading chats",
                    now_millis(),
                );
                let _ = self.events.send(ViewEvent::NoticeRaised {
                    id,
                    text: "Error loading chats".to_string(),
                });
                Err(e)
            }
        }
    }
}

/// Trailing-edge debounce for directory refreshes: requests within `window`
/// of each other collapse into a single refresh.
#[derive(Clone)]
pub struct RefreshDebouncer {
    service: Arc<DirectoryService>,
    window: Duration,
    generation: Arc<AtomicU64>,
    completed: Arc<AtomicU64>,
}

impl RefreshDebouncer {
    pub fn new(service: Arc<DirectoryService>, window: Duration) -> Self {
        Self {
            service,
            window,
            generation: Arc::new(AtomicU64::new(0)),
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedules a refresh. Must be called from within a tokio runtime.
    pub fn request(&self) {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = self.generation.clone();
        let completed = self.completed.clone();
        let service = self.service.clone();
        let window = self.window;

        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if generation.load(Ordering::SeqCst) != ticket {
                return;
            }
            // Failures are already logged by refresh.
            let _ = service.refresh().await;
            completed.fetch_add(1, Ordering::SeqCst);
        });
    }

    /// Invalidates any scheduled refresh.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of refreshes actually executed.
    pub fn refresh_count(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
}
