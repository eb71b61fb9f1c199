use anyhow::{Context, Result};
use bazaar_chat::Chat;
use serde::Serialize;
use std::path::Path;

use super::Session;
use crate::config::Config;
use crate::output::Output;

#[derive(Serialize)]
struct ChatList {
    chats: Vec<ChatInfo>,
}

#[derive(Serialize)]
pub(crate) struct ChatInfo {
    id: String,
    product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    product_title: Option<String>,
    counterpart: String,
    role: &'static str,
    created_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_message_at: Option<u64>,
}

impl ChatInfo {
    pub(crate) fn from_chat(chat: &Chat, user_id: &str) -> Self {
        Self {
            id: chat.id.clone(),
            product_id: chat.product_id.clone(),
            product_title: chat.product_title.clone(),
            counterpart: chat.counterpart(user_id).to_string(),
            role: if chat.buyer_id == user_id {
                "buyer"
            } else {
                "seller"
            },
            created_at: chat.created_at,
            last_message: chat.last_message.as_ref().map(|p| p.content.clone()),
            last_message_at: chat.last_message.as_ref().map(|p| p.created_at),
        }
    }
}

/// Start (or reuse) the chat with a seller about one of their listings
pub async fn contact(
    product_id: &str,
    seller_id: &str,
    title: Option<&str>,
    data_dir: &Path,
    config: &Config,
    output: &Output,
) -> Result<()> {
    let session = Session::open(data_dir, config).await?;
    let user_id = config.require_user()?;

    let chat = session
        .view
        .contact_seller(product_id, title, seller_id)
        .await
        .context("Failed to contact seller")?;

    output.success("contact", ChatInfo::from_chat(&chat, user_id));
    Ok(())
}

/// List the signed-in user's chats, newest chat first
pub async fn list(data_dir: &Path, config: &Config, output: &Output) -> Result<()> {
    let session = Session::open(data_dir, config).await?;
    let user_id = config.require_user()?;

    if let Some(notice) = session.view.notices().first() {
        anyhow::bail!("{}", notice.text);
    }

    let chats = session
        .view
        .chats()
        .iter()
        .map(|c| ChatInfo::from_chat(c, user_id))
        .collect();
    output.success("chats", ChatList { chats });
    Ok(())
}
