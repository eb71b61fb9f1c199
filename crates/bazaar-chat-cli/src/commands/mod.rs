pub mod chat;
pub mod identity;
pub mod message;

use anyhow::{Context, Result};
use bazaar_chat::{MessagesView, ViewEvent};
use crossbeam_channel::Receiver;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::storage::FileStore;
use crate::watch::FileWatchPushSource;

/// A signed-in Messages view over the data directory.
pub struct Session {
    pub view: Arc<MessagesView>,
    pub events: Receiver<ViewEvent>,
}

impl Session {
    /// Opens the view for the configured user. A failed directory load is
    /// reported as a notice and does not abort the session.
    pub async fn open(data_dir: &Path, config: &Config) -> Result<Self> {
        let user_id = config.require_user()?;
        let store = Arc::new(FileStore::open(data_dir).context("Failed to open message store")?);
        let push = Arc::new(FileWatchPushSource::new(store.messages_dir()));
        let (tx, rx) = crossbeam_channel::unbounded();
        let view = Arc::new(MessagesView::new(store, push, config.sync.clone(), tx));

        if let Err(e) = view.activate(user_id).await {
            if !view.is_subscribed() {
                return Err(e).context("Failed to open messages view");
            }
            tracing::warn!(error = %e, "chat directory unavailable");
        }
        Ok(Self { view, events: rx })
    }

    /// Selects `chat_id`, failing if it is not one of the user's chats.
    pub async fn open_chat(&self, chat_id: &str) -> Result<usize> {
        if !self.view.chats().iter().any(|c| c.id == chat_id) {
            anyhow::bail!("Chat not found: {}", chat_id);
        }
        self.view
            .select_chat(chat_id)
            .await
            .with_context(|| format!("Failed to load messages for {}", chat_id))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.view.deactivate();
    }
}
