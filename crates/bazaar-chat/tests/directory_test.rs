mod common;

use async_trait::async_trait;
use bazaar_chat::{
    initiate_contact, Chat, Error, InMemoryMessageStore, Message, MessageStore, NewChat,
    NewMessage, NoticeKind, Result, StoreOp,
};
use common::{Harness, BUYER, SELLER};
use std::sync::atomic::{AtomicBool, Ordering};

fn contact(product_id: &str) -> NewChat {
    NewChat {
        product_id: product_id.to_string(),
        product_title: Some("Desk lamp".to_string()),
        buyer_id: BUYER.to_string(),
        seller_id: SELLER.to_string(),
    }
}

/// Misses the first lookup, as if another client created the chat between
/// our find and our create.
struct StaleFindStore {
    inner: InMemoryMessageStore,
    missed: AtomicBool,
}

#[async_trait]
impl MessageStore for StaleFindStore {
    async fn append(&self, message: NewMessage) -> Result<Message> {
        self.inner.append(message).await
    }

    async fn fetch_history(&self, chat_id: &str) -> Result<Vec<Message>> {
        self.inner.fetch_history(chat_id).await
    }

    async fn fetch_by_id(&self, message_id: &str) -> Result<Message> {
        self.inner.fetch_by_id(message_id).await
    }

    async fn list_chats_for_user(&self, user_id: &str) -> Result<Vec<Chat>> {
        self.inner.list_chats_for_user(user_id).await
    }

    async fn find_chat(&self, product_id: &str, buyer_id: &str) -> Result<Option<Chat>> {
        if !self.missed.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_chat(product_id, buyer_id).await
    }

    async fn create_chat(&self, chat: NewChat) -> Result<Chat> {
        self.inner.create_chat(chat).await
    }
}

#[tokio::test]
async fn directory_orders_by_creation_not_activity() {
    let harness = Harness::new();
    harness.seed_chat("t1", 1);
    harness.seed_chat("t2", 2);
    harness.seed_chat("t3", 3);
    harness.remote_append("t1", SELLER, "bump the oldest chat");

    assert_eq!(harness.view.activate(BUYER).await.unwrap(), 3);
    let ids: Vec<String> = harness.view.chats().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec!["t3", "t2", "t1"]);

    let oldest = &harness.view.chats()[2];
    assert_eq!(
        oldest.last_message.as_ref().map(|p| p.content.as_str()),
        Some("bump the oldest chat")
    );
}

#[tokio::test]
async fn directory_only_lists_chats_the_user_is_part_of() {
    let harness = Harness::new();
    harness.seed_chat("mine", 1);
    harness.store.inner.seed_chat(Chat {
        id: "theirs".to_string(),
        product_id: "product-x".to_string(),
        product_title: None,
        buyer_id: "someone-else".to_string(),
        seller_id: "another-seller".to_string(),
        created_at: 5,
        last_message: None,
    });

    harness.view.activate(SELLER).await.unwrap();
    let ids: Vec<String> = harness.view.chats().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec!["mine"]);
}

#[tokio::test]
async fn initiate_contact_reuses_the_existing_chat() {
    let store = InMemoryMessageStore::new();

    let first = initiate_contact(&store, contact("lamp")).await.unwrap();
    let second = initiate_contact(&store, contact("lamp")).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(store.chat_count(), 1);
    assert_eq!(first.product_title.as_deref(), Some("Desk lamp"));
}

#[tokio::test]
async fn initiate_contact_recovers_from_concurrent_create() {
    let inner = InMemoryMessageStore::new();
    let existing = inner.create_chat(contact("lamp")).await.unwrap();
    let store = StaleFindStore {
        inner: inner.clone(),
        missed: AtomicBool::new(false),
    };

    let chat = initiate_contact(&store, contact("lamp")).await.unwrap();

    assert_eq!(chat.id, existing.id);
    assert_eq!(inner.chat_count(), 1);
}

#[tokio::test]
async fn initiate_contact_rejects_bad_references() {
    let store = InMemoryMessageStore::new();

    let mut own_listing = contact("lamp");
    own_listing.seller_id = BUYER.to_string();
    let err = initiate_contact(&store, own_listing).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = initiate_contact(&store, contact("  ")).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert_eq!(store.chat_count(), 0);
}

#[tokio::test]
async fn contact_seller_refreshes_the_directory() {
    let harness = Harness::new();
    harness.view.activate(BUYER).await.unwrap();
    assert!(harness.view.chats().is_empty());

    let chat = harness
        .view
        .contact_seller("lamp", Some("Desk lamp"), SELLER)
        .await
        .unwrap();

    let chats = harness.view.chats();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].id, chat.id);
    assert_eq!(chats[0].counterpart(BUYER), SELLER);
}

#[tokio::test]
async fn refresh_failure_keeps_previous_list() {
    let harness = Harness::new();
    harness.seed_chat("t1", 1);
    harness.view.activate(BUYER).await.unwrap();
    assert_eq!(harness.view.chats().len(), 1);

    harness.seed_chat("t2", 2);
    harness.store.inner.fail_next(StoreOp::ListChats, 1);
    assert!(harness.view.refresh_directory().await.is_err());

    let ids: Vec<String> = harness.view.chats().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec!["t1"]);
    assert!(harness.view.notices().is_empty());

    assert_eq!(harness.view.refresh_directory().await.unwrap(), 2);
}

#[tokio::test]
async fn initial_directory_failure_raises_notice_and_keeps_subscription() {
    let harness = Harness::new();
    harness.seed_chat("t1", 1);
    harness.store.inner.fail_next(StoreOp::ListChats, 1);

    assert!(harness.view.activate(BUYER).await.is_err());
    assert!(harness.view.is_subscribed());
    assert!(harness.view.chats().is_empty());

    let notices = harness.view.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NoticeKind::DirectoryUnavailable);
    assert_eq!(notices[0].text, "Error loading chats");
}

#[tokio::test]
async fn refresh_requires_a_signed_in_user() {
    let harness = Harness::new();
    let err = harness.view.refresh_directory().await.unwrap_err();
    assert!(matches!(err, Error::NotSignedIn));
}
