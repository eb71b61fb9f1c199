use anyhow::{Context, Result};
use bazaar_chat::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Signed-in marketplace user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Synchronization tunables
    #[serde(default)]
    pub sync: SyncConfig,

    /// Path to the config file
    #[serde(skip)]
    pub path: PathBuf,
}

impl Config {
    /// Load config from the data directory
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join("config.json");

        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                serde_json::from_str(&content).context("Failed to parse config file")?;
            config.path = config_path;
            Ok(config)
        } else {
            Ok(Config {
                path: config_path,
                ..Default::default()
            })
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&self.path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn set_user(&mut self, user_id: &str, display_name: Option<&str>) -> Result<()> {
        self.user_id = Some(user_id.to_string());
        self.display_name = display_name.map(str::to_string);
        self.save()
    }

    pub fn clear_user(&mut self) -> Result<()> {
        self.user_id = None;
        self.display_name = None;
        self.save()
    }

    pub fn is_logged_in(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn require_user(&self) -> Result<&str> {
        self.user_id
            .as_deref()
            .context("Not logged in. Run `bzc login <user-id>` first")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_load_nonexistent() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(temp.path()).unwrap();
        assert!(config.user_id.is_none());
        assert!(!config.is_logged_in());
        assert_eq!(config.sync, SyncConfig::default());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::load(temp.path()).unwrap();
        config.set_user("alice", Some("Alice")).unwrap();

        let loaded = Config::load(temp.path()).unwrap();
        assert_eq!(loaded.user_id.as_deref(), Some("alice"));
        assert_eq!(loaded.display_name.as_deref(), Some("Alice"));
        assert_eq!(loaded.require_user().unwrap(), "alice");
    }

    #[test]
    fn test_config_clear_user() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::load(temp.path()).unwrap();
        config.set_user("alice", None).unwrap();
        config.clear_user().unwrap();
        assert!(!config.is_logged_in());
        assert!(config.require_user().is_err());
    }

    #[test]
    fn test_sync_section_is_partial() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("config.json"),
            r#"{"user_id":"bob","sync":{"refreshDebounceMs":5}}"#,
        )
        .unwrap();

        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.sync.refresh_debounce_ms, 5);
        assert_eq!(config.sync.match_window_ms, SyncConfig::default().match_window_ms);
    }
}
