use crate::config::Config;
use crate::storage::DataDir;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Every read-modify-write cycle holds `store` for its whole duration, so
/// cycles within one process never interleave.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<Mutex<DataDir>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store = DataDir::new(config.data_dir.clone());
        Self {
            config: Arc::new(config),
            store: Arc::new(Mutex::new(store)),
        }
    }
}
