use bazaar_chat::{
    InsertFilter, InsertNotification, Message, PushSource, Result, Subscription,
    SubscriptionHandle, Unsubscribe,
};
use notify::{Event as NotifyEvent, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::storage::read_json;

/// Push source backed by a filesystem watch on the message directory, so
/// every `bzc` process sharing a data directory hears about new rows.
///
/// A row touched twice is announced twice; the ledger drops the repeat by id.
pub struct FileWatchPushSource {
    messages_dir: PathBuf,
}

impl FileWatchPushSource {
    pub fn new(messages_dir: &Path) -> Self {
        Self {
            messages_dir: messages_dir.to_path_buf(),
        }
    }
}

/// Maps a watcher event to the rows it made visible. Temp files and
/// removals are ignored.
fn inserted_rows(event: &NotifyEvent) -> Vec<&Path> {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
        .map(PathBuf::as_path)
        .collect()
}

impl PushSource for FileWatchPushSource {
    fn subscribe(&self, filter: InsertFilter) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher =
            notify::recommended_watcher(move |res: std::result::Result<NotifyEvent, notify::Error>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "file watch error");
                        return;
                    }
                };
                for path in inserted_rows(&event) {
                    let message: Message = match read_json(path) {
                        Ok(Some(message)) => message,
                        Ok(None) => continue,
                        Err(e) => {
                            debug!(path = %path.display(), error = %e, "unreadable row skipped");
                            continue;
                        }
                    };
                    let notification = InsertNotification::message(&message.id, &message.chat_id);
                    if filter.matches(&notification) {
                        let _ = tx.send(notification);
                    }
                }
            })
            .map_err(|e| bazaar_chat::Error::Transport(e.to_string()))?;

        watcher
            .watch(&self.messages_dir, RecursiveMode::NonRecursive)
            .map_err(|e| bazaar_chat::Error::Transport(e.to_string()))?;

        let sub_id = format!("watch-{}", uuid::Uuid::new_v4());
        debug!(subscription = %sub_id, dir = %self.messages_dir.display(), "watching messages");
        let release: Unsubscribe = Box::new(move || drop(watcher));
        Ok(Subscription::new(SubscriptionHandle::new(sub_id, release), rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileStore;
    use bazaar_chat::{MessageStore, NewChat, NewMessage};
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_written_message_is_announced() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path()).unwrap();
        let chat = store
            .create_chat(NewChat {
                product_id: "bike".to_string(),
                product_title: None,
                buyer_id: "alice".to_string(),
                seller_id: "bob".to_string(),
            })
            .await
            .unwrap();

        let source = FileWatchPushSource::new(store.messages_dir());
        let mut subscription = source.subscribe(InsertFilter::messages()).unwrap();

        let written = store
            .append(NewMessage {
                chat_id: chat.id.clone(),
                sender_id: "bob".to_string(),
                content: "still for sale".to_string(),
                correlation_id: None,
            })
            .await
            .unwrap();

        let notification = tokio::time::timeout(Duration::from_secs(5), subscription.recv())
            .await
            .expect("no notification")
            .expect("subscription closed");
        assert_eq!(notification, InsertNotification::message(&written.id, &chat.id));

        // Rewriting the row announces it again.
        let path = store.messages_dir().join(format!("{}.json", written.id));
        std::fs::write(&path, serde_json::to_string_pretty(&written).unwrap()).unwrap();
        let again = tokio::time::timeout(Duration::from_secs(5), subscription.recv())
            .await
            .expect("no notification for rewritten row")
            .expect("subscription closed");
        assert_eq!(again, notification);

        subscription.unsubscribe();
        assert!(subscription.recv().await.is_none());
    }
}
