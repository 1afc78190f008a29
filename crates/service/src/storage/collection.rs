use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use models::meta::Metadata;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::kv_store::KeyValueStore;
use super::seed::{SeedError, SeedLoader};

struct Bootstrap {
    loader: Arc<dyn SeedLoader>,
    meta_key: String,
}

/// A stored element as seen by a typed mutation: either decoded, or kept
/// verbatim because it does not fit `T`.
enum Slot {
    Decoded,
    Opaque(Value),
}

#[derive(Serialize)]
#[serde(untagged)]
enum Stored<'a, T> {
    Item(&'a T),
    Raw(&'a Value),
}

/// JSON collections and singletons on top of a [`KeyValueStore`].
///
/// Every read-modify-write holds a per-key async mutex, so tasks sharing one
/// store cannot lose each other's updates. Separate processes sharing one
/// backing file are not coordinated: the last full-collection write wins.
///
/// Elements are decoded one at a time. An element that does not decode is
/// skipped by reads and written back untouched by mutations.
pub struct CollectionStore {
    kv: KeyValueStore,
    locks: DashMap<String, Arc<Mutex<()>>>,
    bootstraps: HashMap<String, Bootstrap>,
}

impl CollectionStore {
    pub fn new(kv: KeyValueStore) -> Self {
        Self { kv, locks: DashMap::new(), bootstraps: HashMap::new() }
    }

    /// Seed `key` from `loader` the first time it is read while absent.
    /// Accessing the collection also creates the metadata record at `meta_key`.
    pub fn with_bootstrap(
        mut self,
        key: impl Into<String>,
        meta_key: impl Into<String>,
        loader: Arc<dyn SeedLoader>,
    ) -> Self {
        self.bootstraps.insert(key.into(), Bootstrap { loader, meta_key: meta_key.into() });
        self
    }

    pub fn kv(&self) -> &KeyValueStore { &self.kv }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks.entry(key.to_string()).or_default().clone()
    }

    /// Decodable elements of the collection at `key`; empty when absent or malformed.
    pub async fn get_all<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;
        self.load_raw(key)
            .await
            .iter()
            .filter_map(|raw| match T::deserialize(raw) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(key, error = %e, "skipping undecodable element");
                    None
                }
            })
            .collect()
    }

    /// Unconditional overwrite. Returns the value written.
    pub async fn set_all<T: Serialize>(&self, key: &str, items: Vec<T>) -> Vec<T> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;
        match serde_json::to_string(&items) {
            Ok(raw) => {
                self.kv.write(key, raw).await;
            }
            Err(e) => warn!(key, error = %e, "collection encode failed"),
        }
        items
    }

    /// Append `item`; returns the decodable elements after the append.
    pub async fn add_item<T>(&self, key: &str, item: T) -> Vec<T>
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        let res: Result<Vec<T>, std::convert::Infallible> = self
            .mutate(key, |list: &mut Vec<T>| {
                list.push(item);
                Ok(list.clone())
            })
            .await;
        match res {
            Ok(list) => list,
            Err(never) => match never {},
        }
    }

    /// Shallow-merge the object returned by `updater` into every element
    /// matching `predicate`; the updater's fields win. Returns the decodable elements.
    pub async fn update_item<T, P, U>(&self, key: &str, predicate: P, updater: U) -> Vec<T>
    where
        T: Serialize + DeserializeOwned + Clone,
        P: Fn(&T) -> bool,
        U: Fn(&T) -> Map<String, Value>,
    {
        let res: Result<Vec<T>, std::convert::Infallible> = self
            .mutate(key, |list: &mut Vec<T>| {
                for item in list.iter_mut() {
                    if predicate(item) {
                        let patch = updater(item);
                        if let Some(merged) = merge_patch(key, item, patch) {
                            *item = merged;
                        }
                    }
                }
                Ok(list.clone())
            })
            .await;
        match res {
            Ok(list) => list,
            Err(never) => match never {},
        }
    }

    /// Drop every element matching `predicate`; returns the decodable elements left.
    pub async fn remove_item<T, P>(&self, key: &str, predicate: P) -> Vec<T>
    where
        T: Serialize + DeserializeOwned + Clone,
        P: Fn(&T) -> bool,
    {
        let res: Result<Vec<T>, std::convert::Infallible> = self
            .mutate(key, |list: &mut Vec<T>| {
                list.retain(|item| !predicate(item));
                Ok(list.clone())
            })
            .await;
        match res {
            Ok(list) => list,
            Err(never) => match never {},
        }
    }

    /// Locked read-modify-write. `f` sees the decodable elements; the result
    /// is persisted only when `f` succeeds and actually changed them.
    ///
    /// Undecodable elements keep their slots. The elements `f` leaves behind
    /// fill the remaining slots in order and any surplus is appended.
    pub async fn mutate<T, R, E, F>(&self, key: &str, f: F) -> Result<R, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Vec<T>) -> Result<R, E>,
    {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;
        let raw = self.load_raw(key).await;

        let mut slots = Vec::with_capacity(raw.len());
        let mut list: Vec<T> = Vec::with_capacity(raw.len());
        for value in raw {
            match T::deserialize(&value) {
                Ok(item) => {
                    list.push(item);
                    slots.push(Slot::Decoded);
                }
                Err(e) => {
                    debug!(key, error = %e, "keeping undecodable element as is");
                    slots.push(Slot::Opaque(value));
                }
            }
        }

        let before = serde_json::to_value(&list).ok();
        let out = f(&mut list)?;
        let encoded = match serde_json::to_value(&list) {
            Ok(after) if before.as_ref() == Some(&after) => {
                debug!(key, "collection unchanged");
                return Ok(out);
            }
            Ok(_) => serde_json::to_string(&interleave(&slots, &list)),
            Err(e) => Err(e),
        };
        match encoded {
            Ok(encoded) => {
                self.kv.write(key, encoded).await;
            }
            Err(e) => warn!(key, error = %e, "collection encode failed"),
        }
        Ok(out)
    }

    /// Singleton read; `None` when absent or malformed.
    pub async fn get_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.kv.read(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "stored value is malformed");
                None
            }
        }
    }

    pub async fn set_value<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.kv.write(key, raw).await,
            Err(e) => {
                warn!(key, error = %e, "value encode failed");
                false
            }
        }
    }

    pub async fn clear_value(&self, key: &str) -> bool {
        self.kv.remove(key).await
    }

    /// Read the metadata record at `meta_key`, creating or resetting it when
    /// missing or malformed.
    pub async fn ensure_metadata(&self, meta_key: &str) -> Metadata {
        let lock = self.lock_for(meta_key);
        let _guard = lock.lock().await;
        if let Some(raw) = self.kv.read(meta_key).await {
            match serde_json::from_str::<Metadata>(&raw) {
                Ok(meta) => return meta,
                Err(e) => warn!(key = meta_key, error = %e, "metadata malformed, resetting"),
            }
        }
        let meta = Metadata::default();
        if self.set_value(meta_key, &meta).await {
            info!(key = meta_key, version = meta.version, "metadata initialized");
        }
        meta
    }

    // Caller holds the lock for `key`.
    async fn load_raw(&self, key: &str) -> Vec<Value> {
        let bootstrap = self.bootstraps.get(key);
        if let Some(bs) = bootstrap {
            self.ensure_metadata(&bs.meta_key).await;
        }
        let raw = match (self.kv.read(key).await, bootstrap) {
            (Some(raw), _) => raw,
            (None, Some(bs)) => self.bootstrap(key, bs).await,
            (None, None) => return Vec::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(Value::Array(items)) => items,
            Ok(_) => {
                warn!(key, "stored collection is not an array");
                Vec::new()
            }
            Err(e) => {
                warn!(key, error = %e, "stored collection is malformed");
                Vec::new()
            }
        }
    }

    async fn fetch_seed(&self, bs: &Bootstrap) -> Result<Vec<Value>, SeedError> {
        bs.loader.load().await
    }

    /// Persist the seed, or an empty collection when the seed fails, so a
    /// failed attempt is never repeated.
    async fn bootstrap(&self, key: &str, bs: &Bootstrap) -> String {
        let rows = match self.fetch_seed(bs).await {
            Ok(rows) => {
                info!(key, count = rows.len(), "collection seeded");
                rows
            }
            Err(e) => {
                warn!(key, error = %e, "seed unavailable, starting with an empty collection");
                Vec::new()
            }
        };
        let raw = Value::Array(rows).to_string();
        self.kv.write(key, raw.clone()).await;
        raw
    }
}

fn interleave<'a, T>(slots: &'a [Slot], items: &'a [T]) -> Vec<Stored<'a, T>> {
    let mut items = items.iter();
    let mut out = Vec::with_capacity(slots.len().max(items.len()));
    for slot in slots {
        match slot {
            Slot::Opaque(value) => out.push(Stored::Raw(value)),
            Slot::Decoded => {
                if let Some(item) = items.next() {
                    out.push(Stored::Item(item));
                }
            }
        }
    }
    out.extend(items.map(Stored::Item));
    out
}

fn merge_patch<T>(key: &str, item: &T, patch: Map<String, Value>) -> Option<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = match serde_json::to_value(item) {
        Ok(Value::Object(obj)) => obj,
        Ok(_) => {
            warn!(key, "element is not an object, update skipped");
            return None;
        }
        Err(e) => {
            warn!(key, error = %e, "element encode failed, update skipped");
            return None;
        }
    };
    value.extend(patch);
    match serde_json::from_value(Value::Object(value)) {
        Ok(merged) => Some(merged),
        Err(e) => {
            warn!(key, error = %e, "merged element is invalid, update skipped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use async_trait::async_trait;
    use crate::storage::backend::StorageBackend;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: u32,
        name: String,
        #[serde(default)]
        done: bool,
    }

    fn item(id: u32, name: &str) -> Item {
        Item { id, name: name.into(), done: false }
    }

    fn store() -> (Arc<MemoryBackend>, CollectionStore) {
        let backend = Arc::new(MemoryBackend::new());
        let kv = KeyValueStore::new(backend.clone());
        (backend, CollectionStore::new(kv))
    }

    struct CountingLoader {
        calls: AtomicUsize,
        rows: Option<Vec<Value>>,
    }

    #[async_trait]
    impl SeedLoader for CountingLoader {
        async fn load(&self) -> Result<Vec<Value>, SeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rows.clone().ok_or(SeedError::Http("offline".into()))
        }
    }

    #[tokio::test]
    async fn absent_collection_is_empty() {
        let (_, store) = store();
        let items: Vec<Item> = store.get_all("items").await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn crud_round() -> Result<(), anyhow::Error> {
        let (backend, store) = store();
        store.set_all("items", vec![item(1, "a")]).await;
        let after_add = store.add_item("items", item(2, "b")).await;
        assert_eq!(after_add.len(), 2);

        let updated: Vec<Item> = store
            .update_item("items", |i: &Item| i.id == 2, |_| {
                let mut patch = Map::new();
                patch.insert("done".into(), json!(true));
                patch
            })
            .await;
        assert_eq!(updated, vec![item(1, "a"), Item { id: 2, name: "b".into(), done: true }]);

        let removed: Vec<Item> = store.remove_item("items", |i: &Item| i.id == 1).await;
        assert_eq!(removed.len(), 1);

        let raw = backend.get("items").await?.unwrap_or_default();
        assert_eq!(raw, r#"[{"id":2,"name":"b","done":true}]"#);
        Ok(())
    }

    #[tokio::test]
    async fn update_without_match_is_a_noop() {
        let (_, store) = store();
        store.set_all("items", vec![item(1, "a")]).await;
        let list: Vec<Item> = store
            .update_item("items", |i: &Item| i.id == 9, |_| Map::new())
            .await;
        assert_eq!(list, vec![item(1, "a")]);
    }

    #[tokio::test]
    async fn invalid_patch_keeps_element() {
        let (_, store) = store();
        store.set_all("items", vec![item(1, "a")]).await;
        let list: Vec<Item> = store
            .update_item("items", |_: &Item| true, |_| {
                let mut patch = Map::new();
                patch.insert("id".into(), json!("not a number"));
                patch
            })
            .await;
        assert_eq!(list, vec![item(1, "a")]);
    }

    #[tokio::test]
    async fn malformed_collection_degrades_to_empty() -> Result<(), anyhow::Error> {
        let (backend, store) = store();
        backend.set("items", "{broken".into()).await?;
        let items: Vec<Item> = store.get_all("items").await;
        assert!(items.is_empty());

        // a no-op mutation leaves the stored bytes alone
        let _: Vec<Item> = store.remove_item("items", |_: &Item| true).await;
        assert_eq!(backend.get("items").await?.as_deref(), Some("{broken"));

        backend.set("single", "nope".into()).await?;
        assert_eq!(store.get_value::<Item>("single").await, None);
        Ok(())
    }

    #[tokio::test]
    async fn singleton_roundtrip() {
        let (_, store) = store();
        assert_eq!(store.get_value::<Item>("single").await, None);
        assert!(store.set_value("single", &item(3, "c")).await);
        assert_eq!(store.get_value::<Item>("single").await, Some(item(3, "c")));
        assert!(store.clear_value("single").await);
        assert_eq!(store.get_value::<Item>("single").await, None);
    }

    #[tokio::test]
    async fn bootstrap_persists_seed_and_metadata() -> Result<(), anyhow::Error> {
        let (backend, store) = store();
        let loader = Arc::new(CountingLoader {
            calls: AtomicUsize::new(0),
            rows: Some(vec![json!({"id": 1, "name": "seed"})]),
        });
        let store = store.with_bootstrap("items", "items-meta", loader.clone());

        let first: Vec<Item> = store.get_all("items").await;
        let second: Vec<Item> = store.get_all("items").await;
        assert_eq!(first, vec![item(1, "seed")]);
        assert_eq!(second, first);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);

        let meta: Metadata = serde_json::from_str(&backend.get("items-meta").await?.unwrap_or_default())?;
        assert_eq!(meta.version, models::meta::SCHEMA_VERSION);
        Ok(())
    }

    #[tokio::test]
    async fn failed_seed_persists_empty_collection_once() -> Result<(), anyhow::Error> {
        let (backend, store) = store();
        let loader = Arc::new(CountingLoader { calls: AtomicUsize::new(0), rows: None });
        let store = store.with_bootstrap("items", "items-meta", loader.clone());

        let items: Vec<Item> = store.get_all("items").await;
        assert!(items.is_empty());
        assert_eq!(backend.get("items").await?.as_deref(), Some("[]"));

        let _: Vec<Item> = store.get_all("items").await;
        let _ = store.add_item("items", item(5, "e")).await;
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_metadata_is_reset() -> Result<(), anyhow::Error> {
        let (backend, store) = store();
        backend.set("meta", "{oops".into()).await?;
        let meta = store.ensure_metadata("meta").await;
        assert_eq!(meta.version, models::meta::SCHEMA_VERSION);
        let again = store.ensure_metadata("meta").await;
        assert_eq!(again, meta);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_are_not_lost() -> Result<(), anyhow::Error> {
        let (_, store) = store();
        let store = Arc::new(store);
        let mut handles = Vec::new();
        for id in 0..50u32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.add_item("items", item(id, "x")).await;
            }));
        }
        for h in handles {
            h.await?;
        }
        let items: Vec<Item> = store.get_all("items").await;
        assert_eq!(items.len(), 50);
        Ok(())
    }

    #[tokio::test]
    async fn reads_skip_undecodable_elements() -> Result<(), anyhow::Error> {
        let (backend, store) = store();
        backend.set("items", r#"[{"id":1,"name":"a"},7,{"id":"x"},{"id":2,"name":"b"}]"#.into()).await?;
        let items: Vec<Item> = store.get_all("items").await;
        assert_eq!(items, vec![item(1, "a"), item(2, "b")]);
        Ok(())
    }

    #[tokio::test]
    async fn mutations_keep_undecodable_elements() -> Result<(), anyhow::Error> {
        let (backend, store) = store();
        backend.set("items", r#"[7,{"id":1,"name":"a"},{"id":"x"},{"id":2,"name":"b"}]"#.into()).await?;

        let after_remove: Vec<Item> = store.remove_item("items", |i: &Item| i.id == 1).await;
        assert_eq!(after_remove, vec![item(2, "b")]);
        let raw: Value = serde_json::from_str(&backend.get("items").await?.unwrap_or_default())?;
        assert_eq!(raw, json!([7, {"id": 2, "name": "b", "done": false}, {"id": "x"}]));

        let after_add = store.add_item("items", item(3, "c")).await;
        assert_eq!(after_add, vec![item(2, "b"), item(3, "c")]);
        let raw: Value = serde_json::from_str(&backend.get("items").await?.unwrap_or_default())?;
        assert_eq!(
            raw,
            json!([
                7,
                {"id": 2, "name": "b", "done": false},
                {"id": "x"},
                {"id": 3, "name": "c", "done": false}
            ])
        );
        Ok(())
    }
}
