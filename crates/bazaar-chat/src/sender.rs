use crate::{
    now_millis, Error, Message, MessageStore, NewMessage, NoticeKind, Result, SharedState,
    ViewEvent,
};
use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The store accepted the message and the ledger holds the confirmed row.
    Confirmed(Message),
    /// The append failed; the optimistic entry was rolled back.
    Failed { message: Message, error: String },
    /// The store accepted the message but the user had left the chat, so the
    /// ledger was not touched.
    Detached(Message),
}

impl SendOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, SendOutcome::Confirmed(_))
    }
}

/// A clone of one chat's gate. Dropping the last lease removes the gate.
struct GateLease<'a> {
    gates: &'a Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    chat_id: String,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for GateLease<'_> {
    fn drop(&mut self) {
        if let Ok(mut gates) = self.gates.lock() {
            // The map's copy plus this one; leases are only cloned under the map lock.
            if Arc::strong_count(&self.gate) == 2 {
                gates.remove(&self.chat_id);
            }
        }
    }
}

/// Turns a submit into an immediate local append plus a background
/// confirm/rollback cycle. Sends to the same chat are serialized.
pub struct OptimisticSender {
    store: Arc<dyn MessageStore>,
    state: SharedState,
    events: Sender<ViewEvent>,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl OptimisticSender {
    pub fn new(store: Arc<dyn MessageStore>, state: SharedState, events: Sender<ViewEvent>) -> Self {
        Self {
            store,
            state,
            events,
            gates: Mutex::new(HashMap::new()),
        }
    }

    fn gate(&self, chat_id: &str) -> GateLease<'_> {
        let gate = self
            .gates
            .lock()
            .unwrap()
            .entry(chat_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        GateLease {
            gates: &self.gates,
            chat_id: chat_id.to_string(),
            gate,
        }
    }

    /// Chats with a send in flight or queued.
    pub fn busy_chats(&self) -> usize {
        self.gates.lock().unwrap().len()
    }

    pub async fn send(&self, chat_id: &str, sender_id: &str, text: &str) -> Result<SendOutcome> {
        let content = text.trim();
        if content.is_empty() {
            return Err(Error::Validation("message text is empty".to_string()));
        }
        let content = content.to_string();

        self.state.lock().unwrap().draft.clear();

        let lease = self.gate(chat_id);
        let _turn = lease.gate.lock().await;

        let pending = Message::pending(chat_id, sender_id, &content, now_millis());
        let shown = {
            let mut state = self.state.lock().unwrap();
            match state.ledger.append_pending(pending.clone()) {
                Ok(()) => true,
                Err(e) => {
                    debug!(chat = chat_id, error = %e, "optimistic entry not shown");
                    false
                }
            }
        };
        if shown {
            let _ = self.events.send(ViewEvent::MessagePending(pending.clone()));
        }

        match self.store.append(NewMessage::from(&pending)).await {
            Ok(stored) => {
                let merged = {
                    let mut state = self.state.lock().unwrap();
                    if state.ledger.is_open(chat_id) {
                        state.ledger.merge(stored.clone());
                        true
                    } else {
                        false
                    }
                };
                if !merged {
                    info!(chat = chat_id, message = %stored.id, "sent after leaving chat");
                    return Ok(SendOutcome::Detached(stored));
                }
                debug!(chat = chat_id, message = %stored.id, "send confirmed");
                let _ = self.events.send(ViewEvent::MessageConfirmed(stored.clone()));
                Ok(SendOutcome::Confirmed(stored))
            }
            Err(e) => {
                warn!(chat = chat_id, error = %e, "send failed, rolling back");
                let (failed, notice_id) = {
                    let mut state = self.state.lock().unwrap();
                    let failed = state.ledger.fail(&pending.id).unwrap_or_else(|| {
                        let mut failed = pending.clone();
                        failed.state = crate::DeliveryState::Failed;
                        failed
                    });
                    let notice_id = state.notices.raise(
                        NoticeKind::SendFailed,
                        "Error sending message",
                        now_millis(),
                    );
                    (failed, notice_id)
                };
                let _ = self.events.send(ViewEvent::SendFailed {
                    message: failed.clone(),
                    notice_id,
                });
                Ok(SendOutcome::Failed {
                    message: failed,
                    error: e.to_string(),
                })
            }
        }
    }
}
