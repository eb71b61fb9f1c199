use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    SendFailed,
    HistoryUnavailable,
    DirectoryUnavailable,
}

/// Transient, dismissable user-facing error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub text: String,
    pub raised_at: u64,
}

#[derive(Debug, Default)]
pub struct NoticeBoard {
    next_id: u64,
    notices: Vec<Notice>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, kind: NoticeKind, text: impl Into<String>, now: u64) -> u64 {
        self.next_id += 1;
        self.notices.push(Notice {
            id: self.next_id,
            kind,
            text: text.into(),
            raised_at: now,
        });
        self.next_id
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    /// Notices still within their display time at `now`.
    pub fn active(&self, now: u64, ttl_ms: u64) -> Vec<Notice> {
        self.notices
            .iter()
            .filter(|n| now.saturating_sub(n.raised_at) < ttl_ms)
            .cloned()
            .collect()
    }

    pub fn prune(&mut self, now: u64, ttl_ms: u64) {
        self.notices
            .retain(|n| now.saturating_sub(n.raised_at) < ttl_ms);
    }

    pub fn clear(&mut self) {
        self.notices.clear();
    }
}
