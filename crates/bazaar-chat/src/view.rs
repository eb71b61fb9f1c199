use crate::{
    initiate_contact, now_millis, Chat, ConnectionState, DirectoryService, Error, Message,
    MessageStore, NewChat, Notice, NoticeKind, OptimisticSender, PushSource, RealtimeReconciler,
    RefreshDebouncer, Result, SendOutcome, SharedState, SubscriptionLifecycle, SyncConfig,
    ViewEvent, ViewState,
};
use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// The Messages screen: directory on one side, the open conversation on the
/// other, kept live by one push subscription.
pub struct MessagesView {
    store: Arc<dyn MessageStore>,
    state: SharedState,
    events: Sender<ViewEvent>,
    config: SyncConfig,
    sender: OptimisticSender,
    directory: Arc<DirectoryService>,
    reconciler: Arc<RealtimeReconciler>,
    lifecycle: Mutex<SubscriptionLifecycle>,
}

impl MessagesView {
    pub fn new(
        store: Arc<dyn MessageStore>,
        push: Arc<dyn PushSource>,
        config: SyncConfig,
        event_tx: Sender<ViewEvent>,
    ) -> Self {
        let state: SharedState = Arc::new(Mutex::new(ViewState::new(&config)));
        let directory = Arc::new(DirectoryService::new(
            store.clone(),
            state.clone(),
            event_tx.clone(),
        ));
        let refresher = RefreshDebouncer::new(directory.clone(), config.refresh_debounce());
        let reconciler = Arc::new(RealtimeReconciler::new(
            store.clone(),
            state.clone(),
            event_tx.clone(),
            refresher,
        ));
        let lifecycle = SubscriptionLifecycle::new(push, reconciler.clone());
        let sender = OptimisticSender::new(store.clone(), state.clone(), event_tx.clone());

        Self {
            store,
            state,
            events: event_tx,
            config,
            sender,
            directory,
            reconciler,
            lifecycle: Mutex::new(lifecycle),
        }
    }

    /// Opens the view for `user_id`: subscribes to live inserts and loads the
    /// chat directory. A directory failure leaves the subscription in place.
    pub async fn activate(&self, user_id: &str) -> Result<usize> {
        if user_id.trim().is_empty() {
            return Err(Error::NotSignedIn);
        }
        let switching = {
            let mut state = self.state.lock().unwrap();
            let switching = state
                .user_id
                .as_deref()
                .map(|current| current != user_id)
                .unwrap_or(false);
            if switching {
                state.ledger.reset();
                state.directory.clear();
                state.draft.clear();
                state.notices.clear();
            }
            state.user_id = Some(user_id.to_string());
            switching
        };
        if switching {
            info!(user = user_id, "switching signed-in user");
        }

        self.lifecycle.lock().unwrap().activate(user_id)?;
        self.directory.load_initial().await
    }

    /// View teardown: the subscription is released, state is kept for a
    /// later `activate`.
    pub fn deactivate(&self) {
        self.lifecycle.lock().unwrap().teardown();
    }

    /// Sign-out: releases the subscription and forgets everything.
    pub fn sign_out(&self) {
        self.lifecycle.lock().unwrap().teardown();
        let mut state = self.state.lock().unwrap();
        state.user_id = None;
        state.ledger.reset();
        state.directory.clear();
        state.draft.clear();
        state.notices.clear();
        info!("signed out of messages view");
    }

    /// Opens `chat_id` and loads its history. Results for a chat that is no
    /// longer open when the fetch completes are discarded.
    pub async fn select_chat(&self, chat_id: &str) -> Result<usize> {
        self.require_user()?;
        self.state.lock().unwrap().ledger.begin_load(chat_id);

        match self.store.fetch_history(chat_id).await {
            Ok(history) => {
                let count = {
                    let mut state = self.state.lock().unwrap();
                    if !state.ledger.is_open(chat_id) {
                        debug!(chat = chat_id, "history for closed chat discarded");
                        return Ok(0);
                    }
                    state.ledger.load(chat_id, history);
                    state.ledger.len()
                };
                let _ = self.events.send(ViewEvent::HistoryLoaded {
                    chat_id: chat_id.to_string(),
                    count,
                });
                Ok(count)
            }
            Err(e) => {
                warn!(chat = chat_id, error = %e, "history load failed");
                let notice_id = {
                    let mut state = self.state.lock().unwrap();
                    if !state.ledger.is_open(chat_id) {
                        return Err(e);
                    }
                    state.ledger.clear();
                    state.notices.raise(
                        NoticeKind::HistoryUnavailable,
                        "Error loading messages",
                        now_millis(),
                    )
                };
                let _ = self.events.send(ViewEvent::HistoryFailed {
                    chat_id: chat_id.to_string(),
                    error: e.to_string(),
                });
                let _ = self.events.send(ViewEvent::NoticeRaised {
                    id: notice_id,
                    text: "Error loading messages".to_string(),
                });
                Err(e)
            }
        }
    }

    /// Retry affordance after a failed history load.
    pub async fn reload(&self) -> Result<usize> {
        let chat_id = self.open_chat().ok_or(Error::NoChatOpen)?;
        self.select_chat(&chat_id).await
    }

    pub fn close_chat(&self) {
        self.state.lock().unwrap().ledger.reset();
    }

    pub fn set_draft(&self, text: &str) {
        self.state.lock().unwrap().draft = text.to_string();
    }

    pub fn draft(&self) -> String {
        self.state.lock().unwrap().draft.clone()
    }

    /// Sends the current draft to the open chat.
    pub async fn submit(&self) -> Result<SendOutcome> {
        let text = self.draft();
        self.send(&text).await
    }

    pub async fn send(&self, text: &str) -> Result<SendOutcome> {
        let user_id = self.require_user()?;
        let chat_id = self.open_chat().ok_or(Error::NoChatOpen)?;
        self.sender.send(&chat_id, &user_id, text).await
    }

    /// Buyer-side "contact seller": reuses the chat for the pair if any.
    pub async fn contact_seller(
        &self,
        product_id: &str,
        product_title: Option<&str>,
        seller_id: &str,
    ) -> Result<Chat> {
        let buyer_id = self.require_user()?;
        let chat = initiate_contact(
            self.store.as_ref(),
            NewChat {
                product_id: product_id.to_string(),
                product_title: product_title.map(str::to_string),
                buyer_id,
                seller_id: seller_id.to_string(),
            },
        )
        .await?;
        if let Err(e) = self.directory.refresh().await {
            debug!(error = %e, "directory refresh after contact failed");
        }
        Ok(chat)
    }

    pub async fn refresh_directory(&self) -> Result<usize> {
        self.directory.refresh().await
    }

    pub fn user_id(&self) -> Option<String> {
        self.state.lock().unwrap().user_id.clone()
    }

    pub fn open_chat(&self) -> Option<String> {
        self.state.lock().unwrap().ledger.chat_id().map(str::to_string)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().unwrap().ledger.entries().to_vec()
    }

    pub fn chats(&self) -> Vec<Chat> {
        self.state.lock().unwrap().directory.chats().to_vec()
    }

    pub fn notices(&self) -> Vec<Notice> {
        let mut state = self.state.lock().unwrap();
        let now = now_millis();
        state.notices.prune(now, self.config.notice_ttl_ms);
        state.notices.active(now, self.config.notice_ttl_ms)
    }

    pub fn dismiss_notice(&self, id: u64) -> bool {
        self.state.lock().unwrap().notices.dismiss(id)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.reconciler.connection_state()
    }

    pub fn is_subscribed(&self) -> bool {
        self.lifecycle.lock().unwrap().is_active()
    }

    /// Directory refreshes that actually ran (after debouncing).
    pub fn directory_refresh_count(&self) -> u64 {
        self.reconciler.refresher().refresh_count()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn require_user(&self) -> Result<String> {
        self.user_id().ok_or(Error::NotSignedIn)
    }
}
