use std::path::PathBuf;
use std::sync::Arc;

use messages_core::TemplateStore;
use tokio::sync::RwLock;

/// Holds the shared state accessible by all API request handlers.
///
/// The store sits behind one `RwLock`; writers keep the lock while the
/// snapshot is persisted so files are written in mutation order.
#[derive(Clone, Debug)]
pub struct AppState {
    pub data_path: PathBuf,
    pub store: Arc<RwLock<TemplateStore>>,
}

impl AppState {
    /// Creates a state around an empty store.
    pub fn new(data_path: PathBuf) -> Self {
        Self::with_store(data_path, TemplateStore::new())
    }

    pub fn with_store(data_path: PathBuf, store: TemplateStore) -> Self {
        AppState {
            data_path,
            store: Arc::new(RwLock::new(store)),
        }
    }
}
