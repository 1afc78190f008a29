use std::{collections::HashMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tokio::{fs, sync::RwLock};
use tracing::warn;

use super::backend::{StorageBackend, StorageError};

/// JSON file-backed string map.
///
/// The whole map lives in one JSON object file (`{"key": "value", ...}`),
/// loaded at open and rewritten on every mutation.
pub struct FileBackend {
    inner: RwLock<HashMap<String, String>>,
    file_path: PathBuf,
}

impl FileBackend {
    /// Open the backend at `path`. Creates the file with an empty map if missing;
    /// an unreadable document is replaced by an empty map.
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, StorageError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let map: HashMap<String, String> = match fs::read(&file_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %file_path.display(), error = %e, "storage file is malformed, starting empty");
                HashMap::new()
            }),
            Err(_) => {
                let empty: HashMap<String, String> = HashMap::new();
                fs::write(&file_path, serde_json::to_vec(&empty)?).await?;
                empty
            }
        };

        Ok(Arc::new(Self { inner: RwLock::new(map), file_path }))
    }

    pub fn path(&self) -> &std::path::Path { &self.file_path }

    // Caller holds the write guard so concurrent saves cannot reorder.
    async fn save(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
        let data = serde_json::to_vec(map)?;
        fs::write(&self.file_path, data).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let map = self.inner.read().await;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut map = self.inner.write().await;
        let previous = map.insert(key.to_string(), value);
        if let Err(e) = self.save(&map).await {
            // keep memory in line with disk
            match previous {
                Some(old) => map.insert(key.to_string(), old),
                None => map.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.inner.write().await;
        if let Some(old) = map.remove(key) {
            if let Err(e) = self.save(&map).await {
                map.insert(key.to_string(), old);
                return Err(e);
            }
        }
        Ok(())
    }
}
