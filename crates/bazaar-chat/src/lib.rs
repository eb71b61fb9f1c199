//! Realtime message synchronization for Campus Bazaar buyer/seller chats.
//!
//! [`MessagesView`] is the entry point for a presentation layer. It keeps the
//! open conversation ([`MessageLedger`]) consistent with the shared message
//! log while an optimistic send is in flight and push notifications arrive
//! concurrently, and keeps the chat list ([`ChatDirectory`]) fresh.

pub mod config;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod notice;
pub mod pubsub;
pub mod reconciler;
pub mod sender;
pub mod state;
pub mod store;
pub mod subscription;
pub mod types;
pub mod view;

pub use config::SyncConfig;
pub use directory::{initiate_contact, order_by_creation, ChatDirectory, DirectoryService, RefreshDebouncer};
pub use error::{Error, Result};
pub use ledger::{MergeOutcome, MessageLedger};
pub use notice::{Notice, NoticeBoard, NoticeKind};
pub use pubsub::{InsertFilter, PushHub, PushSource, Subscription, SubscriptionHandle};
pub use reconciler::{ConnectionState, Liveness, RealtimeReconciler, ReconcileOutcome};
pub use sender::{OptimisticSender, SendOutcome};
pub use state::{SharedState, ViewEvent, ViewState};
pub use store::{InMemoryMessageStore, MessageStore, StoreOp};
pub use subscription::SubscriptionLifecycle;
pub use types::*;
pub use view::MessagesView;
