use crate::{
    InsertNotification, MergeOutcome, MessageStore, RefreshDebouncer, SharedState, Subscription,
    ViewEvent, MESSAGES_TABLE,
};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
}

/// Per-subscription flag, revoked at the very start of teardown so that a
/// notification still in flight is recognised and ignored.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn revoke(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Subscription already torn down.
    Ignored,
    OtherTable,
    /// Not the open chat; only the directory refresh was requested.
    OtherChat,
    FetchFailed,
    /// The open chat changed while the row was being fetched.
    Stale,
    Merged(MergeOutcome),
}

/// Applies push notifications to the ledger and keeps directory previews
/// fresh.
pub struct RealtimeReconciler {
    store: Arc<dyn MessageStore>,
    state: SharedState,
    events: Sender<ViewEvent>,
    refresher: RefreshDebouncer,
    connection: Mutex<ConnectionState>,
}

impl RealtimeReconciler {
    pub fn new(
        store: Arc<dyn MessageStore>,
        state: SharedState,
        events: Sender<ViewEvent>,
        refresher: RefreshDebouncer,
    ) -> Self {
        Self {
            store,
            state,
            events,
            refresher,
            connection: Mutex::new(ConnectionState::Disconnected),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.lock().unwrap()
    }

    pub fn set_connection_state(&self, next: ConnectionState) {
        let changed = {
            let mut current = self.connection.lock().unwrap();
            let changed = *current != next;
            *current = next;
            changed
        };
        if changed {
            debug!(state = ?next, "connection state changed");
            let _ = self.events.send(ViewEvent::ConnectionChanged(next));
        }
    }

    pub fn refresher(&self) -> &RefreshDebouncer {
        &self.refresher
    }

    pub async fn handle(
        &self,
        notification: InsertNotification,
        liveness: &Liveness,
    ) -> ReconcileOutcome {
        if !liveness.is_alive() {
            return ReconcileOutcome::Ignored;
        }
        if notification.table != MESSAGES_TABLE {
            return ReconcileOutcome::OtherTable;
        }

        self.refresher.request();

        let row = notification.row;
        let open = self.state.lock().unwrap().ledger.is_open(&row.chat_id);
        if !open {
            return ReconcileOutcome::OtherChat;
        }

        let message = match self.store.fetch_by_id(&row.id).await {
            Ok(message) => message,
            Err(e) => {
                warn!(message = %row.id, error = %e, "dropping notification, row fetch failed");
                return ReconcileOutcome::FetchFailed;
            }
        };

        if !liveness.is_alive() {
            return ReconcileOutcome::Ignored;
        }

        let outcome = {
            let mut state = self.state.lock().unwrap();
            if !state.ledger.is_open(&message.chat_id) {
                None
            } else {
                Some(state.ledger.merge(message.clone()))
            }
        };
        let Some(outcome) = outcome else {
            debug!(message = %message.id, "chat switched during fetch, row discarded");
            return ReconcileOutcome::Stale;
        };

        match outcome {
            MergeOutcome::ReplacedPending => {
                let _ = self.events.send(ViewEvent::MessageConfirmed(message));
            }
            MergeOutcome::Inserted => {
                let _ = self.events.send(ViewEvent::MessageReceived(message));
            }
            MergeOutcome::Duplicate | MergeOutcome::WrongChat => {}
        }
        ReconcileOutcome::Merged(outcome)
    }

    /// Consumes `subscription` until it ends or `liveness` is revoked.
    pub async fn run(self: Arc<Self>, mut subscription: Subscription, liveness: Liveness) {
        self.set_connection_state(ConnectionState::Subscribed);
        info!(subscription = %subscription.id(), "realtime subscription active");

        while let Some(notification) = subscription.recv().await {
            if !liveness.is_alive() {
                break;
            }
            let outcome = self.handle(notification, &liveness).await;
            debug!(?outcome, "notification handled");
        }

        if liveness.is_alive() {
            warn!(subscription = %subscription.id(), "push stream ended");
            self.set_connection_state(ConnectionState::Disconnected);
        }
    }
}
