use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{PersistError, Result};
use crate::medium::{entry_size, StorageMedium};

/// In-process medium, optionally with a hard quota like a browser's
#[derive(Default)]
pub struct MemoryMedium {
    entries: Mutex<BTreeMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push the estimated total past `quota`
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota: Some(quota),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| PersistError::Medium("memory medium lock poisoned".to_string()))
    }
}

impl StorageMedium for MemoryMedium {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.lock()?;

        if let Some(quota) = self.quota {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| entry_size(k, v))
                .sum();
            let needed = others + entry_size(key, value);
            if needed > quota {
                return Err(PersistError::QuotaExceeded {
                    needed,
                    available: quota,
                });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let medium = MemoryMedium::new();

        medium.set("a", "1").unwrap();
        assert_eq!(medium.get("a").unwrap().as_deref(), Some("1"));

        medium.remove("a").unwrap();
        assert_eq!(medium.get("a").unwrap(), None);
    }

    #[test]
    fn test_quota_rejects_oversized_write() {
        let medium = MemoryMedium::with_quota(10);

        medium.set("k", "ab").unwrap();
        let err = medium.set("k", "abcdefgh").unwrap_err();
        assert!(matches!(err, PersistError::QuotaExceeded { .. }));
        assert_eq!(medium.get("k").unwrap().as_deref(), Some("ab"));
    }

    #[test]
    fn test_sizes() {
        let medium = MemoryMedium::new();
        medium.set("a", "xx").unwrap();
        medium.set("b", "y").unwrap();

        assert_eq!(medium.total_size().unwrap(), 6 + 4);
        assert_eq!(medium.size_excluding("a").unwrap(), 4);
    }
}
