use serde::{Deserialize, Serialize};

/// Key the session log is stored under
pub const DEFAULT_STORE_KEY: &str = "chats_history";

/// 4.5 MiB, leaving headroom in a typical 5 MiB browser quota
pub const DEFAULT_BUDGET_BYTES: usize = 4_718_592;

fn default_key() -> String {
    DEFAULT_STORE_KEY.to_string()
}

fn default_budget() -> usize {
    DEFAULT_BUDGET_BYTES
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_key")]
    pub key: String,
    /// Budget for the estimated size of the whole medium, all keys included
    #[serde(default = "default_budget")]
    pub budget_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            budget_bytes: default_budget(),
        }
    }
}
