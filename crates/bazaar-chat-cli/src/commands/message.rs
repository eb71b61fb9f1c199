use anyhow::Result;
use bazaar_chat::{DeliveryState, Message, SendOutcome, ViewEvent};
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use super::chat::ChatInfo;
use super::Session;
use crate::config::Config;
use crate::output::Output;

#[derive(Serialize)]
struct MessageList {
    chat_id: String,
    messages: Vec<MessageInfo>,
}

#[derive(Serialize)]
struct MessageInfo {
    id: String,
    chat_id: String,
    from: String,
    content: String,
    timestamp: u64,
    is_outgoing: bool,
    state: DeliveryState,
}

impl MessageInfo {
    fn from_message(message: &Message, user_id: &str) -> Self {
        Self {
            id: message.id.clone(),
            chat_id: message.chat_id.clone(),
            from: message.sender_id.clone(),
            content: message.content.clone(),
            timestamp: message.created_at,
            is_outgoing: message.sender_id == user_id,
            state: message.state,
        }
    }
}

/// Read the most recent messages of a chat
pub async fn read(
    chat_id: &str,
    limit: usize,
    data_dir: &Path,
    config: &Config,
    output: &Output,
) -> Result<()> {
    let session = Session::open(data_dir, config).await?;
    let user_id = config.require_user()?;
    session.open_chat(chat_id).await?;

    let messages = session.view.messages();
    let skip = messages.len().saturating_sub(limit);
    let messages = messages[skip..]
        .iter()
        .map(|m| MessageInfo::from_message(m, user_id))
        .collect();

    output.success(
        "read",
        MessageList {
            chat_id: chat_id.to_string(),
            messages,
        },
    );
    Ok(())
}

/// Send a message to a chat
pub async fn send(
    chat_id: &str,
    text: &str,
    data_dir: &Path,
    config: &Config,
    output: &Output,
) -> Result<()> {
    let session = Session::open(data_dir, config).await?;
    let user_id = config.require_user()?;
    session.open_chat(chat_id).await?;

    match session.view.send(text).await? {
        SendOutcome::Confirmed(message) | SendOutcome::Detached(message) => {
            output.success("send", MessageInfo::from_message(&message, user_id));
            Ok(())
        }
        SendOutcome::Failed { error, .. } => anyhow::bail!("Error sending message: {}", error),
    }
}

/// Listen for new messages until Ctrl+C
pub async fn listen(
    chat_id: Option<&str>,
    data_dir: &Path,
    config: &Config,
    output: &Output,
) -> Result<()> {
    let session = Session::open(data_dir, config).await?;
    if let Some(chat_id) = chat_id {
        session.open_chat(chat_id).await?;
    }

    let scope = chat_id.unwrap_or("all chats");
    output.done(
        "listen",
        &format!("Listening for messages on {}... (Ctrl+C to stop)", scope),
    );

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    run_listener(&session, config.require_user()?, output, shutdown).await?;
    Ok(())
}

/// Prints view events until `shutdown` resolves. Returns how many messages
/// were announced.
async fn run_listener<F>(
    session: &Session,
    user_id: &str,
    output: &Output,
    shutdown: F,
) -> Result<usize>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut tick = tokio::time::interval(Duration::from_millis(100));
    let mut announced = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tick.tick() => {
                for event in session.events.try_iter() {
                    announced += print_event(session, &event, user_id, output);
                }
            }
        }
    }
    Ok(announced)
}

fn print_event(session: &Session, event: &ViewEvent, user_id: &str, output: &Output) -> usize {
    match event {
        ViewEvent::MessageReceived(message) => {
            output.event("message", MessageInfo::from_message(message, user_id));
            1
        }
        ViewEvent::DirectoryRefreshed { .. } if session.view.open_chat().is_none() => {
            let chats: Vec<ChatInfo> = session
                .view
                .chats()
                .iter()
                .map(|c| ChatInfo::from_chat(c, user_id))
                .collect();
            output.event("chats", chats);
            0
        }
        ViewEvent::ConnectionChanged(state) => {
            output.event("connection", state);
            0
        }
        ViewEvent::NoticeRaised { text, .. } => {
            output.event("notice", text);
            0
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileStore;
    use bazaar_chat::{Chat, MessageStore, NewChat, NewMessage};
    use tempfile::TempDir;

    async fn chat_between(temp: &TempDir) -> Chat {
        let store = FileStore::open(temp.path()).unwrap();
        store
            .create_chat(NewChat {
                product_id: "bike".to_string(),
                product_title: Some("Road bike".to_string()),
                buyer_id: "alice".to_string(),
                seller_id: "bob".to_string(),
            })
            .await
            .unwrap()
    }

    fn config_for(temp: &TempDir, user_id: &str) -> Config {
        let mut config = Config::load(temp.path()).unwrap();
        config.user_id = Some(user_id.to_string());
        config.sync.refresh_debounce_ms = 10;
        config
    }

    #[tokio::test]
    async fn test_send_then_read() {
        let temp = TempDir::new().unwrap();
        let chat = chat_between(&temp).await;
        let config = config_for(&temp, "alice");
        let output = Output::new(true);

        send(&chat.id, "Is this available?", temp.path(), &config, &output)
            .await
            .unwrap();

        let store = FileStore::open(temp.path()).unwrap();
        let history = store.fetch_history(&chat.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "Is this available?");
        assert!(history[0].correlation_id.is_some());

        read(&chat.id, 10, temp.path(), &config, &output)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_rejects_unknown_chat_and_blank_text() {
        let temp = TempDir::new().unwrap();
        let chat = chat_between(&temp).await;
        let config = config_for(&temp, "alice");
        let output = Output::new(true);

        assert!(send("missing", "hi", temp.path(), &config, &output)
            .await
            .is_err());
        assert!(send(&chat.id, "   ", temp.path(), &config, &output)
            .await
            .is_err());

        let outsider = config_for(&temp, "carol");
        assert!(send(&chat.id, "hi", temp.path(), &outsider, &output)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_listener_announces_counterpart_messages() {
        let temp = TempDir::new().unwrap();
        let chat = chat_between(&temp).await;
        let config = config_for(&temp, "bob");
        let output = Output::new(true);

        let session = Session::open(temp.path(), &config).await.unwrap();
        session.open_chat(&chat.id).await.unwrap();

        let store = FileStore::open(temp.path()).unwrap();
        let chat_id = chat.id.clone();
        let writer = async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            store
                .append(NewMessage {
                    chat_id,
                    sender_id: "alice".to_string(),
                    content: "Is this available?".to_string(),
                    correlation_id: None,
                })
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(1500)).await;
        };

        let announced = run_listener(&session, "bob", &output, writer)
            .await
            .unwrap();
        assert_eq!(announced, 1);
        assert_eq!(session.view.messages().len(), 1);
    }
}
