use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{DEFAULT_MATCH_WINDOW_MS, DEFAULT_NOTICE_TTL_MS, DEFAULT_REFRESH_DEBOUNCE_MS};

/// Tunables for the synchronization engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Fallback pending/confirmed match window, in milliseconds.
    pub match_window_ms: u64,
    /// Directory refresh requests within this window coalesce into one.
    pub refresh_debounce_ms: u64,
    /// Minimum time a notice stays visible unless dismissed.
    pub notice_ttl_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            match_window_ms: DEFAULT_MATCH_WINDOW_MS,
            refresh_debounce_ms: DEFAULT_REFRESH_DEBOUNCE_MS,
            notice_ttl_ms: DEFAULT_NOTICE_TTL_MS,
        }
    }
}

impl SyncConfig {
    pub fn match_window(&self) -> Duration {
        Duration::from_millis(self.match_window_ms)
    }

    pub fn refresh_debounce(&self) -> Duration {
        Duration::from_millis(self.refresh_debounce_ms)
    }

    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }
}
