//! Seed sources for the first-run bootstrap of a collection.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("seed io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("seed request failed: {0}")]
    Http(String),
    #[error("seed parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("seed document is not a JSON array")]
    NotAnArray,
}

/// Produces the initial records of a collection.
#[async_trait]
pub trait SeedLoader: Send + Sync {
    async fn load(&self) -> Result<Vec<Value>, SeedError>;
}

fn into_array(doc: Value) -> Result<Vec<Value>, SeedError> {
    match doc {
        Value::Array(items) => Ok(items),
        _ => Err(SeedError::NotAnArray),
    }
}

/// Reads a JSON array from the filesystem.
pub struct FileSeedLoader {
    path: PathBuf,
}

impl FileSeedLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

#[async_trait]
impl SeedLoader for FileSeedLoader {
    async fn load(&self) -> Result<Vec<Value>, SeedError> {
        debug!(path = %self.path.display(), "loading seed file");
        let bytes = tokio::fs::read(&self.path).await?;
        into_array(serde_json::from_slice(&bytes)?)
    }
}

/// Fetches a JSON array over HTTP.
pub struct HttpSeedLoader {
    url: String,
    client: reqwest::Client,
}

impl HttpSeedLoader {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), client: reqwest::Client::new() }
    }
}

#[async_trait]
impl SeedLoader for HttpSeedLoader {
    async fn load(&self) -> Result<Vec<Value>, SeedError> {
        debug!(url = %self.url, "fetching seed");
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SeedError::Http(e.to_string()))?;
        let doc = resp.json::<Value>().await.map_err(|e| SeedError::Http(e.to_string()))?;
        into_array(doc)
    }
}

fn is_url(base: &str) -> bool {
    base.starts_with("http://") || base.starts_with("https://")
}

/// Resolve `resource` against `base` and pick the matching loader.
pub fn loader_for(base: &str, resource: &str) -> Arc<dyn SeedLoader> {
    let resource = resource.trim_start_matches('/');
    if is_url(base) {
        let url = format!("{}/{}", base.trim_end_matches('/'), resource);
        Arc::new(HttpSeedLoader::new(url))
    } else {
        Arc::new(FileSeedLoader::new(PathBuf::from(base).join(resource)))
    }
}
