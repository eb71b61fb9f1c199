//! Ordered, deduplicated view of the open chat's messages.
//!
//! The ledger holds the confirmed history of one chat plus at most one local
//! pending entry, which always renders last. All writers go through
//! [`MessageLedger::append_pending`], [`MessageLedger::merge`] and
//! [`MessageLedger::fail`]; nothing else mutates the sequence.

use crate::{DeliveryState, Error, Message, Result, DEFAULT_MATCH_WINDOW_MS};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A matching pending entry was replaced by the confirmed row.
    ReplacedPending,
    Inserted,
    /// A confirmed entry with the same id is already present.
    Duplicate,
    /// The row belongs to a chat that is not open.
    WrongChat,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, MergeOutcome::ReplacedPending | MergeOutcome::Inserted)
    }
}

#[derive(Debug, Clone)]
pub struct MessageLedger {
    chat_id: Option<String>,
    entries: Vec<Message>,
    loading: bool,
    match_window_ms: u64,
}

impl Default for MessageLedger {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_MATCH_WINDOW_MS))
    }
}

impl MessageLedger {
    pub fn new(match_window: Duration) -> Self {
        Self {
            chat_id: None,
            entries: Vec::new(),
            loading: false,
            match_window_ms: match_window.as_millis() as u64,
        }
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn is_open(&self, chat_id: &str) -> bool {
        self.chat_id.as_deref() == Some(chat_id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending(&self) -> Option<&Message> {
        self.entries.iter().find(|m| m.is_pending())
    }

    /// Switches to `chat_id` and empties the sequence until its history
    /// arrives. Writes for the chat made in the meantime survive the load.
    pub fn begin_load(&mut self, chat_id: &str) {
        self.chat_id = Some(chat_id.to_string());
        self.entries.clear();
        self.loading = true;
    }

    /// Replaces the sequence with the confirmed history of `chat_id`.
    pub fn load(&mut self, chat_id: &str, history: Vec<Message>) {
        let carried = if self.loading && self.is_open(chat_id) {
            std::mem::take(&mut self.entries)
        } else {
            Vec::new()
        };

        self.chat_id = Some(chat_id.to_string());
        self.loading = false;
        self.entries.clear();

        let mut history: Vec<Message> = history
            .into_iter()
            .filter(|m| m.chat_id == chat_id && m.is_confirmed())
            .collect();
        history.sort_by_key(|m| m.order_key());
        history.dedup_by(|a, b| a.id == b.id);
        self.entries = history;

        for entry in carried {
            if entry.is_pending() {
                self.entries.push(entry);
            } else {
                self.merge(entry);
            }
        }
        debug!(chat = chat_id, entries = self.entries.len(), "ledger loaded");
    }

    /// Empty state after a failed history load; the chat stays selected so a
    /// retry can target it.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.loading = false;
    }

    /// Closes the chat entirely.
    pub fn reset(&mut self) {
        self.chat_id = None;
        self.entries.clear();
        self.loading = false;
    }

    pub fn append_pending(&mut self, message: Message) -> Result<()> {
        if !message.is_pending() {
            return Err(Error::Validation(format!(
                "message {} is not pending",
                message.id
            )));
        }
        if !self.is_open(&message.chat_id) {
            return Err(Error::Validation(format!(
                "chat {} is not open",
                message.chat_id
            )));
        }
        if let Some(existing) = self.pending() {
            return Err(Error::Validation(format!(
                "message {} is already pending",
                existing.id
            )));
        }
        self.entries.push(message);
        Ok(())
    }

    pub fn merge(&mut self, confirmed: Message) -> MergeOutcome {
        if !self.is_open(&confirmed.chat_id) {
            return MergeOutcome::WrongChat;
        }
        if self
            .entries
            .iter()
            .any(|m| m.is_confirmed() && m.id == confirmed.id)
        {
            return MergeOutcome::Duplicate;
        }

        let mut confirmed = confirmed;
        confirmed.state = DeliveryState::Confirmed;

        if let Some(index) = self.matching_pending(&confirmed) {
            debug!(
                pending = %self.entries[index].id,
                confirmed = %confirmed.id,
                "pending entry confirmed"
            );
            self.entries[index] = confirmed;
            self.restore_order(index);
            return MergeOutcome::ReplacedPending;
        }

        let index = self.insertion_index(&confirmed);
        self.entries.insert(index, confirmed);
        MergeOutcome::Inserted
    }

    /// Removes the pending entry `pending_id` and hands it back marked failed.
    pub fn fail(&mut self, pending_id: &str) -> Option<Message> {
        let index = self
            .entries
            .iter()
            .position(|m| m.is_pending() && m.id == pending_id)?;
        let mut failed = self.entries.remove(index);
        failed.state = DeliveryState::Failed;
        Some(failed)
    }

    fn matching_pending(&self, confirmed: &Message) -> Option<usize> {
        let by_correlation = confirmed.correlation_id.as_ref().and_then(|cid| {
            self.entries
                .iter()
                .position(|m| m.is_pending() && m.correlation_id.as_ref() == Some(cid))
        });
        if by_correlation.is_some() {
            return by_correlation;
        }

        // Two distinct correlation ids never name the same send.
        self.entries.iter().position(|m| {
            m.is_pending()
                && (m.correlation_id.is_none() || confirmed.correlation_id.is_none())
                && m.sender_id == confirmed.sender_id
                && m.chat_id == confirmed.chat_id
                && m.content == confirmed.content
                && m.created_at.abs_diff(confirmed.created_at) <= self.match_window_ms
        })
    }

    /// Position among confirmed entries; the pending entry stays at the tail.
    fn insertion_index(&self, message: &Message) -> usize {
        let key = message.order_key();
        self.entries
            .iter()
            .position(|m| m.is_pending() || m.order_key() > key)
            .unwrap_or(self.entries.len())
    }

    fn restore_order(&mut self, index: usize) {
        let entry = &self.entries[index];
        let key = entry.order_key();
        let before_ok = index == 0 || self.entries[index - 1].order_key() <= key;
        let after_ok = self
            .entries
            .get(index + 1)
            .map(|next| next.is_pending() || key <= next.order_key())
            .unwrap_or(true);
        if before_ok && after_ok {
            return;
        }
        let entry = self.entries.remove(index);
        let target = self.insertion_index(&entry);
        self.entries.insert(target, entry);
    }
}
