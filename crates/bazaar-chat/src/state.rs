use crate::{ChatDirectory, ConnectionState, Message, MessageLedger, NoticeBoard, SyncConfig};
use std::sync::{Arc, Mutex};

/// Everything the Messages view renders. Owned by one view session; the
/// mutex is never held across an `.await`.
#[derive(Debug)]
pub struct ViewState {
    pub user_id: Option<String>,
    pub ledger: MessageLedger,
    pub directory: ChatDirectory,
    pub draft: String,
    pub notices: NoticeBoard,
}

impl ViewState {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            user_id: None,
            ledger: MessageLedger::new(config.match_window()),
            directory: ChatDirectory::default(),
            draft: String::new(),
            notices: NoticeBoard::new(),
        }
    }
}

pub type SharedState = Arc<Mutex<ViewState>>;

/// Events emitted to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    HistoryLoaded {
        chat_id: String,
        count: usize,
    },
    HistoryFailed {
        chat_id: String,
        error: String,
    },
    MessagePending(Message),
    MessageConfirmed(Message),
    /// A row from someone else (or another device) was merged.
    MessageReceived(Message),
    SendFailed {
        message: Message,
        notice_id: u64,
    },
    DirectoryRefreshed {
        chats: usize,
    },
    ConnectionChanged(ConnectionState),
    NoticeRaised {
        id: u64,
        text: String,
    },
}
