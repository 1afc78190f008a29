//! Runtime wiring
//!
//! Builds the storage stack and the services from an [`AppConfig`].

use std::sync::Arc;

use configs::{AppConfig, BackendKind};
use tracing::info;

use crate::auth::{repository::StoreAuthRepository, AuthService};
use crate::expense::ExpenseService;
use crate::storage::{keys, seed, CollectionStore, FileBackend, KeyValueStore, MemoryBackend, StorageBackend};

/// Everything a front end needs.
pub struct TrackerServices {
    pub auth: Arc<AuthService<StoreAuthRepository>>,
    pub expenses: ExpenseService,
    pub store: Arc<CollectionStore>,
}

/// Assemble the services over an already opened backend.
pub fn assemble(backend: Arc<dyn StorageBackend>, cfg: &AppConfig) -> TrackerServices {
    let kv = KeyValueStore::with_namespace(backend, cfg.storage.namespace.clone());
    let mut store = CollectionStore::new(kv);
    if let Some(base) = &cfg.seed.base_path {
        store = store.with_bootstrap(keys::EXPENSES, keys::EXPENSES_META, seed::loader_for(base, &cfg.seed.resource));
    }
    let store = Arc::new(store);
    let auth = Arc::new(AuthService::new(Arc::new(StoreAuthRepository::new(store.clone()))));
    let expenses = ExpenseService::new(store.clone(), auth.clone());
    TrackerServices { auth, expenses, store }
}

/// Open the configured backend and assemble the services.
pub async fn build_services(cfg: &AppConfig) -> anyhow::Result<TrackerServices> {
    let backend: Arc<dyn StorageBackend> = match cfg.storage.backend {
        BackendKind::Memory => Arc::new(MemoryBackend::new()),
        BackendKind::File => {
            common::env::ensure_data_dir(&cfg.storage.data_dir).await?;
            FileBackend::open(cfg.storage.file_path()).await?
        }
    };
    info!(backend = ?cfg.storage.backend, namespace = %cfg.storage.namespace, seeded = cfg.seed.base_path.is_some(), "storage ready");
    Ok(assemble(backend, cfg))
}
