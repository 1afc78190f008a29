use std::sync::Arc;

use tracing::warn;

use super::backend::StorageBackend;

/// Failure-tolerant facade over a [`StorageBackend`].
///
/// Backend errors (quota exceeded, blocked access, I/O) are logged and turned
/// into `None` / `false`; nothing above this layer sees them.
#[derive(Clone)]
pub struct KeyValueStore {
    backend: Arc<dyn StorageBackend>,
    namespace: Option<String>,
}

impl KeyValueStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend, namespace: None }
    }

    /// Prefix every key with `<namespace>:`. An empty namespace means no prefix.
    pub fn with_namespace(backend: Arc<dyn StorageBackend>, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self { backend, namespace: (!namespace.is_empty()).then_some(namespace) }
    }

    fn full_key(&self, key: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}:{key}"),
            None => key.to_string(),
        }
    }

    pub async fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(&self.full_key(key)).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "storage read failed");
                None
            }
        }
    }

    pub async fn write(&self, key: &str, value: String) -> bool {
        match self.backend.set(&self.full_key(key), value).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "storage write failed");
                false
            }
        }
    }

    pub async fn remove(&self, key: &str) -> bool {
        match self.backend.remove(&self.full_key(key)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "storage remove failed");
                false
            }
        }
    }
}
