use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::{PersistError, Result};
use crate::medium::StorageMedium;
use crate::store::ConversationStore;

pub struct ConversationStoreBuilder {
    medium: Option<Arc<dyn StorageMedium>>,
    config: StoreConfig,
}

impl ConversationStoreBuilder {
    pub fn new() -> Self {
        Self {
            medium: None,
            config: StoreConfig::default(),
        }
    }

    pub fn medium(mut self, medium: Arc<dyn StorageMedium>) -> Self {
        self.medium = Some(medium);
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.config.key = key.into();
        self
    }

    pub fn budget_bytes(mut self, budget: usize) -> Self {
        self.config.budget_bytes = budget;
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ConversationStore> {
        let medium = self
            .medium
            .ok_or_else(|| PersistError::Config("medium is required".to_string()))?;

        if self.config.key.is_empty() {
            return Err(PersistError::Config("store key must not be empty".to_string()));
        }

        Ok(ConversationStore::new(medium, self.config))
    }
}

impl Default for ConversationStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
