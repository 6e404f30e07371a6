use std::sync::Arc;

use parley_types::ConversationSession;

use crate::config::StoreConfig;
use crate::error::{PersistError, Result};
use crate::media::MemoryMedium;
use crate::medium::{entry_size, StorageMedium};

/// Size-bounded log of conversation sessions
///
/// Every session of every user lives in one serialized array under a single
/// key. Reads are scoped to a user; writes re-check the budget for the whole
/// medium and, when over, evict only the acting user's oldest sessions.
#[derive(Clone)]
pub struct ConversationStore {
    medium: Arc<dyn StorageMedium>,
    config: StoreConfig,
}

impl ConversationStore {
    pub fn new(medium: Arc<dyn StorageMedium>, config: StoreConfig) -> Self {
        Self { medium, config }
    }

    /// Store over a fresh in-memory medium with default settings
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryMedium::new()), StoreConfig::default())
    }

    pub fn builder() -> crate::builder::ConversationStoreBuilder {
        crate::builder::ConversationStoreBuilder::new()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// All sessions owned by `user_id`, in storage order
    pub fn list(&self, user_id: &str) -> Result<Vec<ConversationSession>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|s| s.user_id == user_id)
            .collect())
    }

    pub fn get(&self, user_id: &str, session_id: &str) -> Result<Option<ConversationSession>> {
        Ok(self
            .load_all()?
            .into_iter()
            .find(|s| s.user_id == user_id && s.session_id == session_id))
    }

    /// Insert `session` as the most recent one
    pub fn append(&self, session: ConversationSession) -> Result<()> {
        let mut sessions = self.load_all()?;
        sessions.retain(|s| s.session_id != session.session_id);

        let acting_user = session.user_id.clone();
        sessions.insert(0, session);
        self.commit(&acting_user, sessions)
    }

    /// Replace the session with the same id in place
    pub fn update(&self, session: ConversationSession) -> Result<()> {
        let mut sessions = self.load_all()?;
        let slot = sessions
            .iter_mut()
            .find(|s| s.session_id == session.session_id)
            .ok_or_else(|| PersistError::SessionNotFound(session.session_id.clone()))?;

        let acting_user = session.user_id.clone();
        *slot = session;
        self.commit(&acting_user, sessions)
    }

    /// Update when present, append otherwise
    pub fn save(&self, session: ConversationSession) -> Result<()> {
        match self.update(session.clone()) {
            Err(PersistError::SessionNotFound(_)) => self.append(session),
            other => other,
        }
    }

    /// Delete one session; returns whether it existed
    pub fn remove(&self, session_id: &str) -> Result<bool> {
        let mut sessions = self.load_all()?;
        let before = sessions.len();
        sessions.retain(|s| s.session_id != session_id);

        if sessions.len() == before {
            return Ok(false);
        }

        self.medium
            .set(&self.config.key, &serde_json::to_string(&sessions)?)?;
        Ok(true)
    }

    /// Drop the whole log, every user included
    pub fn clear(&self) -> Result<()> {
        self.medium.remove(&self.config.key)
    }

    /// Estimated size of the whole medium
    pub fn encoded_size(&self) -> Result<usize> {
        self.medium.total_size()
    }

    fn load_all(&self) -> Result<Vec<ConversationSession>> {
        let Some(raw) = self.medium.get(&self.config.key)? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&raw) {
            Ok(sessions) => Ok(sessions),
            Err(e) => {
                tracing::warn!(key = %self.config.key, "Stored sessions unreadable, treating as empty: {}", e);
                Ok(Vec::new())
            }
        }
    }

    fn commit(&self, acting_user: &str, mut sessions: Vec<ConversationSession>) -> Result<()> {
        let key = self.config.key.as_str();
        let budget = self.config.budget_bytes;

        let others = self.medium.size_excluding(key)?;
        let mut encoded = serde_json::to_string(&sessions)?;
        let mut total = others + entry_size(key, &encoded);

        if total > budget {
            let mut oldest_first: Vec<_> = sessions
                .iter()
                .filter(|s| s.user_id == acting_user)
                .map(|s| (s.updated_at, s.session_id.clone()))
                .collect();
            oldest_first.sort_by_key(|(updated_at, _)| *updated_at);

            let mut evicted = 0usize;
            for (_, session_id) in oldest_first {
                if total <= budget {
                    break;
                }
                sessions.retain(|s| !(s.user_id == acting_user && s.session_id == session_id));
                encoded = serde_json::to_string(&sessions)?;
                total = others + entry_size(key, &encoded);
                evicted += 1;
            }

            tracing::info!(
                user_id = acting_user,
                evicted,
                total,
                budget,
                "Evicted oldest sessions to stay within storage budget"
            );

            if total > budget {
                // Other users' data dominates; their sessions are never evicted here
                tracing::warn!(
                    user_id = acting_user,
                    total,
                    budget,
                    "Storage still over budget after evicting all of the user's sessions"
                );
            }
        }

        self.medium.set(key, &encoded)
    }
}
