use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::config::Config;
use crate::output::Output;

#[derive(Serialize)]
struct LoginResult {
    user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
}

#[derive(Serialize)]
struct WhoamiResult {
    user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    logged_in: bool,
}

/// Sign in as a marketplace user
pub async fn login(
    user_id: &str,
    display_name: Option<&str>,
    config: &Config,
    output: &Output,
) -> Result<()> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        anyhow::bail!("User id must not be empty");
    }

    let mut config = config.clone();
    config.set_user(user_id, display_name)?;

    output.success(
        "login",
        LoginResult {
            user_id: user_id.to_string(),
            display_name: config.display_name,
        },
    );
    Ok(())
}

/// Sign out. Chats in the data directory are shared with other users and
/// stay in place.
pub async fn logout(data_dir: &Path, output: &Output) -> Result<()> {
    let mut config = Config::load(data_dir)?;
    config.clear_user()?;

    output.done("logout", "Logged out");
    Ok(())
}

/// Show current identity
pub async fn whoami(config: &Config, output: &Output) -> Result<()> {
    output.success(
        "whoami",
        WhoamiResult {
            user_id: config.user_id.clone().unwrap_or_default(),
            display_name: config.display_name.clone(),
            logged_in: config.is_logged_in(),
        },
    );
    Ok(())
}
