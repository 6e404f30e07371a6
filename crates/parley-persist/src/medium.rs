use crate::error::Result;

/// Estimated storage cost of one entry
///
/// Browser storage keeps strings as UTF-16, so each code unit of key and
/// value is counted as two bytes.
pub fn entry_size(key: &str, value: &str) -> usize {
    2 * (key.encode_utf16().count() + value.encode_utf16().count())
}

/// Durable string key-value medium shared by every user of a profile
///
/// Implementations are synchronous; a write either lands whole or fails.
pub trait StorageMedium: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    fn keys(&self) -> Result<Vec<String>>;

    /// Estimated size of every entry except `key`
    fn size_excluding(&self, key: &str) -> Result<usize> {
        let mut total = 0;
        for other in self.keys()? {
            if other == key {
                continue;
            }
            if let Some(value) = self.get(&other)? {
                total += entry_size(&other, &value);
            }
        }
        Ok(total)
    }

    /// Estimated size of the whole medium
    fn total_size(&self) -> Result<usize> {
        let mut total = 0;
        for key in self.keys()? {
            if let Some(value) = self.get(&key)? {
                total += entry_size(&key, &value);
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_size_counts_utf16_units() {
        assert_eq!(entry_size("k", "ab"), 6);
        // 'é' is one UTF-16 unit, '😀' is two
        assert_eq!(entry_size("", "é"), 2);
        assert_eq!(entry_size("", "😀"), 4);
    }
}
