//! Storage abstractions for the service layer
//!
//! Layering, leaf first:
//! - [`backend::StorageBackend`]: fallible string key/value medium (memory or JSON file)
//! - [`kv_store::KeyValueStore`]: absorbs backend failures into `None`/`false`
//! - [`collection::CollectionStore`]: JSON collections and singletons with seed bootstrap

pub mod backend;
pub mod collection;
pub mod json_file;
pub mod keys;
pub mod kv_store;
pub mod memory;
pub mod seed;

pub use backend::{StorageBackend, StorageError};
pub use collection::CollectionStore;
pub use json_file::FileBackend;
pub use kv_store::KeyValueStore;
pub use memory::MemoryBackend;
