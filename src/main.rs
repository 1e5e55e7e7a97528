use log::{error, info};
use service::{config::Config, logging::Logger, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!("Starting file server on {}...", config.bind_address());

    let storage = match service::init_storage(&config).await {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            error!("Failed to prepare storage at {}: {e}", config.storage_path());
            std::process::exit(1);
        }
    };

    let app_state = AppState::new(config, storage);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server stopped: {e}");
        std::process::exit(1);
    }
}
