use config::Config;
use log::{info, warn};
use sse::Manager;
use std::sync::Arc;
use storage::{FsStorage, Storage};

pub mod config;
pub mod logging;

/// Prepares the filesystem backend, creating the storage root if needed.
pub async fn init_storage(config: &Config) -> std::io::Result<FsStorage> {
    let root = config.storage_path();
    info!("Storage root: {root}");
    FsStorage::create_root(&root).await?;

    if config.auth_token().is_empty() {
        warn!("CN_AUTH is empty: any request with an empty `q` parameter will be accepted");
    }

    Ok(FsStorage::new())
}

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub sse_manager: Arc<Manager>,
}

impl AppState {
    pub fn new(app_config: Config, storage: Arc<dyn Storage>) -> Self {
        let sse_manager = Arc::new(Manager::with_heartbeat_interval(
            app_config.heartbeat_interval(),
        ));
        Self {
            config: app_config,
            storage,
            sse_manager,
        }
    }
}
