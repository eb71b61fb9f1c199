use crate::{InsertNotification, Result, Unsubscribe, MESSAGES_TABLE};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

/// Source of asynchronous insert notifications (the realtime channel of the
/// backing store). Delivery is at-least-once and may pause during transport
/// gaps.
pub trait PushSource: Send + Sync {
    fn subscribe(&self, filter: InsertFilter) -> Result<Subscription>;
}

/// Which inserts a subscription wants to hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertFilter {
    pub table: String,
    /// `None` means every chat reachable by the subscriber.
    pub chat_ids: Option<HashSet<String>>,
}

impl InsertFilter {
    pub fn messages() -> Self {
        Self {
            table: MESSAGES_TABLE.to_string(),
            chat_ids: None,
        }
    }

    pub fn for_chats<I, S>(mut self, chat_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chat_ids = Some(chat_ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn matches(&self, notification: &InsertNotification) -> bool {
        if notification.table != self.table {
            return false;
        }
        match &self.chat_ids {
            Some(ids) => ids.contains(&notification.row.chat_id),
            None => true,
        }
    }
}

/// Cloneable release handle for a subscription. Unsubscribing is idempotent.
#[derive(Clone)]
pub struct SubscriptionHandle {
    id: String,
    released: Arc<AtomicBool>,
    release: Arc<Mutex<Option<Unsubscribe>>>,
}

impl SubscriptionHandle {
    pub fn new(id: impl Into<String>, release: Unsubscribe) -> Self {
        Self {
            id: id.into(),
            released: Arc::new(AtomicBool::new(false)),
            release: Arc::new(Mutex::new(Some(release))),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn unsubscribe(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        let release = self.release.lock().unwrap().take();
        if let Some(release) = release {
            release();
        }
        debug!(subscription = %self.id, "unsubscribed");
    }
}

/// A lazy, unbounded, non-restartable stream of insert notifications.
pub struct Subscription {
    handle: SubscriptionHandle,
    events: mpsc::UnboundedReceiver<InsertNotification>,
}

impl Subscription {
    pub fn new(handle: SubscriptionHandle, events: mpsc::UnboundedReceiver<InsertNotification>) -> Self {
        Self { handle, events }
    }

    pub fn id(&self) -> &str {
        self.handle.id()
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Next notification, or `None` once the subscription is released or the
    /// source goes away.
    pub async fn recv(&mut self) -> Option<InsertNotification> {
        if self.handle.is_released() {
            return None;
        }
        self.events.recv().await
    }

    pub fn unsubscribe(&self) {
        self.handle.unsubscribe();
    }
}

struct Subscriber {
    filter: InsertFilter,
    tx: mpsc::UnboundedSender<InsertNotification>,
}

#[derive(Default)]
struct HubInner {
    subscribers: HashMap<String, Subscriber>,
    disconnected: bool,
}

/// In-process push source: fans published notifications out to every
/// matching subscriber over tokio channels.
#[derive(Clone, Default)]
pub struct PushHub {
    inner: Arc<Mutex<HubInner>>,
}

impl PushHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers to matching subscribers and returns how many received it.
    /// While the hub is disconnected nothing is delivered.
    pub fn publish(&self, notification: InsertNotification) -> usize {
        let mut inner = self.inner.lock().unwrap();
        if inner.disconnected {
            debug!(row = %notification.row.id, "push transport down, notification dropped");
            return 0;
        }
        let mut delivered = 0;
        inner.subscribers.retain(|_, sub| {
            if !sub.filter.matches(&notification) {
                return true;
            }
            match sub.tx.send(notification.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    /// Simulates the transport dropping (`false`) or coming back (`true`).
    /// Subscriptions survive the gap; deliveries in between are lost.
    pub fn set_connected(&self, connected: bool) {
        self.inner.lock().unwrap().disconnected = !connected;
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().subscribers.len()
    }
}

impl PushSource for PushHub {
    fn subscribe(&self, filter: InsertFilter) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub_id = format!("sub-{}", uuid::Uuid::new_v4());
        self.inner
            .lock()
            .unwrap()
            .subscribers
            .insert(sub_id.clone(), Subscriber { filter, tx });

        let inner = self.inner.clone();
        let release_id = sub_id.clone();
        let release: Unsubscribe = Box::new(move || {
            inner.lock().unwrap().subscribers.remove(&release_id);
        });

        debug!(subscription = %sub_id, "subscribed");
        Ok(Subscription::new(SubscriptionHandle::new(sub_id, release), rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_matching_subscribers_only() {
        let hub = PushHub::new();
        let mut all = hub.subscribe(InsertFilter::messages()).unwrap();
        let mut only_b = hub
            .subscribe(InsertFilter::messages().for_chats(["chat-b"]))
            .unwrap();

        assert_eq!(hub.publish(InsertNotification::message("m1", "chat-a")), 1);
        assert_eq!(hub.publish(InsertNotification::message("m2", "chat-b")), 2);

        assert_eq!(all.recv().await.unwrap().row.id, "m1");
        assert_eq!(all.recv().await.unwrap().row.id, "m2");
        assert_eq!(only_b.recv().await.unwrap().row.id, "m2");
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_releases() {
        let hub = PushHub::new();
        let mut sub = hub.subscribe(InsertFilter::messages()).unwrap();
        assert_eq!(hub.subscriber_count(), 1);

        let handle = sub.handle();
        handle.unsubscribe();
        handle.unsubscribe();
        sub.unsubscribe();

        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.publish(InsertNotification::message("m1", "chat-a")), 0);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn disconnected_hub_drops_deliveries_until_reconnected() {
        let hub = PushHub::new();
        let mut sub = hub.subscribe(InsertFilter::messages()).unwrap();

        hub.set_connected(false);
        assert_eq!(hub.publish(InsertNotification::message("lost", "c")), 0);
        hub.set_connected(true);
        assert_eq!(hub.publish(InsertNotification::message("kept", "c")), 1);

        assert_eq!(sub.recv().await.unwrap().row.id, "kept");
    }

    #[test]
    fn filter_rejects_other_tables() {
        let filter = InsertFilter::messages();
        let mut notification = InsertNotification::message("m", "c");
        notification.table = crate::CHATS_TABLE.to_string();
        assert!(!filter.matches(&notification));
    }
}
