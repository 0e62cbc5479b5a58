//! CCG Store — the key-value capability behind consent persistence.
//!
//! The consent manager only ever needs `get`/`set` on string keys, the same
//! surface a browser's `localStorage` offers. Backends: an in-memory map for
//! tests, a JSON file, and SQLite.

pub mod file;
pub mod kv;
pub mod schema;
pub mod sqlite;

use std::sync::Arc;

use ccg_core::{ConsentConfig, StorageBackend};
use tracing::{info, warn};

pub use file::JsonFileStore;
pub use kv::{KeyValueStore, MemoryStore};
pub use sqlite::SqliteKvStore;

/// Open the backend selected by configuration.
///
/// A SQLite database that cannot be opened yields a disabled store, so the
/// consent manager re-prompts instead of the service failing to start.
pub fn open_store(config: &ConsentConfig) -> Arc<dyn KeyValueStore> {
    let store: Arc<dyn KeyValueStore> = match config.storage {
        StorageBackend::File => Arc::new(JsonFileStore::new(&config.data_paths.consent_file)),
        StorageBackend::Sqlite => match SqliteKvStore::open(&config.data_paths.consent_db) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(
                    "Consent storage disabled, {} could not be opened: {}",
                    config.data_paths.consent_db.display(),
                    e
                );
                Arc::new(MemoryStore::disabled())
            }
        },
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };
    info!("Consent storage backend: {}", store.backend());
    store
}
