use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde::Deserialize;

pub const ENV_CONFIG_PATH: &str = "CONFIG_PATH";
pub const ENV_DATA_DIR: &str = "TRACKER_DATA_DIR";
pub const ENV_SEED_BASE: &str = "TRACKER_SEED_BASE";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::File,
            data_dir: default_data_dir(),
            file_name: default_file_name(),
            namespace: default_namespace(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    /// Base path or URL the seed resource is resolved against; no bootstrap when absent.
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default = "default_seed_resource")]
    pub resource: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self { base_path: None, resource: default_seed_resource() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { format: default_log_format(), filter: default_log_filter() }
    }
}

fn default_data_dir() -> String { "data".into() }
fn default_file_name() -> String { "storage.json".into() }
fn default_namespace() -> String { "expense-tracker".into() }
fn default_seed_resource() -> String { "data/expenses.json".into() }
fn default_log_format() -> String { "compact".into() }
fn default_log_filter() -> String { "info".into() }

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `config.toml` (or `CONFIG_PATH`), falling back to defaults when the file is absent.
    pub fn load_and_validate() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| "config.toml".to_string());
        let mut cfg = if std::path::Path::new(&path).exists() {
            load_from_file(&path)?
        } else {
            AppConfig::default()
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.storage.normalize_from_env();
        self.storage.validate()?;
        self.seed.normalize_from_env();
        self.seed.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

impl StorageConfig {
    pub fn normalize_from_env(&mut self) {
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            if !dir.trim().is_empty() {
                self.data_dir = dir;
            }
        }
        if self.data_dir.trim().is_empty() {
            self.data_dir = default_data_dir();
        }
        self.namespace = self.namespace.trim().to_string();
    }

    pub fn validate(&self) -> Result<()> {
        if self.file_name.trim().is_empty() {
            return Err(anyhow!("storage.file_name must not be empty"));
        }
        if self.file_name.contains('/') || self.file_name.contains('\\') {
            return Err(anyhow!("storage.file_name must be a bare file name"));
        }
        Ok(())
    }

    /// Path of the backing file for the file backend.
    pub fn file_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.file_name)
    }
}

impl SeedConfig {
    pub fn normalize_from_env(&mut self) {
        if let Ok(base) = std::env::var(ENV_SEED_BASE) {
            if !base.trim().is_empty() {
                self.base_path = Some(base);
            }
        }
        if let Some(base) = &self.base_path {
            if base.trim().is_empty() {
                self.base_path = None;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_path.is_some() && self.resource.trim().is_empty() {
            return Err(anyhow!("seed.resource must not be empty when seed.base_path is set"));
        }
        Ok(())
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        match self.format.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" | "json" => Ok(()),
            other => Err(anyhow!("logging.format must be compact or json, got {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() -> Result<()> {
        let cfg = load_from_str("")?;
        assert_eq!(cfg.storage.backend, BackendKind::File);
        assert_eq!(cfg.storage.data_dir, "data");
        assert_eq!(cfg.storage.namespace, "expense-tracker");
        assert!(cfg.seed.base_path.is_none());
        assert_eq!(cfg.seed.resource, "data/expenses.json");
        assert_eq!(cfg.logging.filter, "info");
        Ok(())
    }

    #[test]
    fn parses_full_document() -> Result<()> {
        let cfg = load_from_str(
            r#"
            [storage]
            backend = "memory"
            data_dir = "/tmp/tracker"
            file_name = "kv.json"
            namespace = "demo"

            [seed]
            base_path = "https://example.com/app"
            resource = "seed.json"

            [logging]
            format = "json"
            filter = "debug"
            "#,
        )?;
        assert_eq!(cfg.storage.backend, BackendKind::Memory);
        assert_eq!(cfg.storage.file_path(), PathBuf::from("/tmp/tracker/kv.json"));
        assert_eq!(cfg.seed.base_path.as_deref(), Some("https://example.com/app"));
        assert_eq!(cfg.logging.format, "json");
        Ok(())
    }

    #[test]
    fn rejects_bad_values() {
        let mut storage = StorageConfig::default();
        storage.file_name = "nested/kv.json".into();
        assert!(storage.validate().is_err());

        let logging = LoggingConfig { format: "xml".into(), filter: "info".into() };
        assert!(logging.validate().is_err());

        let seed = SeedConfig { base_path: Some("/srv".into()), resource: " ".into() };
        assert!(seed.validate().is_err());
    }

    #[test]
    fn unknown_backend_fails_to_parse() {
        assert!(load_from_str("[storage]\nbackend = \"redis\"").is_err());
    }
}
