use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::backend::{StorageBackend, StorageError};

/// Process-local backend.
///
/// An optional byte quota (keys plus values) and a blocked switch reproduce
/// the failure modes of browser storage.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
    blocked: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self { Self::default() }

    pub fn with_quota(quota: usize) -> Self {
        Self { quota: Some(quota), ..Self::default() }
    }

    /// Make every subsequent operation fail with [`StorageError::Unavailable`].
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    fn check_access(&self) -> Result<(), StorageError> {
        if self.blocked.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("access blocked".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_access()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.check_access()?;
        let mut entries = self.entries.write().await;
        if let Some(quota) = self.quota {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_access()?;
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_crud() -> Result<(), anyhow::Error> {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("a").await?, None);
        backend.set("a", "1".into()).await?;
        assert_eq!(backend.get("a").await?.as_deref(), Some("1"));
        backend.remove("a").await?;
        assert_eq!(backend.get("a").await?, None);
        // removing a missing key is fine
        backend.remove("a").await?;
        Ok(())
    }

    #[tokio::test]
    async fn quota_rejects_oversized_writes() -> Result<(), anyhow::Error> {
        let backend = MemoryBackend::with_quota(8);
        backend.set("k", "1234".into()).await?;
        // overwriting the same key only counts once
        backend.set("k", "1234567".into()).await?;
        let err = backend.set("other", "x".into()).await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota: 8, .. }));
        Ok(())
    }

    #[tokio::test]
    async fn blocked_backend_fails_everything() {
        let backend = MemoryBackend::new();
        backend.set_blocked(true);
        assert!(backend.get("a").await.is_err());
        assert!(backend.set("a", "1".into()).await.is_err());
        assert!(backend.remove("a").await.is_err());
        backend.set_blocked(false);
        assert!(backend.get("a").await.is_ok());
    }
}
