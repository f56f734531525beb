use std::sync::Arc;

use tracing::{error, info};

use pesos::feed::HttpFetcher;
use pesos::sync::{start_scheduler, DbActivityLog};
use pesos::{AppState, Config, Database, SyncService, WebServer};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = pesos::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        pesos::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("PESOS feed synchronizer {}", env!("CARGO_PKG_VERSION"));

    let db = match Database::open(&config.database.path).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database {}: {}", config.database.path, e);
            std::process::exit(1);
        }
    };

    let fetcher = match HttpFetcher::from_config(&config.fetch) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create feed fetcher: {}", e);
            std::process::exit(1);
        }
    };

    let sync = Arc::new(
        SyncService::new(db.clone(), Arc::new(fetcher), config.sync.clone())
            .with_activity_log(Arc::new(DbActivityLog::new(db.pool().clone()))),
    );

    let _scheduler = start_scheduler(Arc::clone(&sync), &config.scheduler);

    let state = AppState::new(db, sync).with_cron_secret(config.web.cron_secret.clone());
    let server = match WebServer::new(&config.server, state) {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );

    if let Err(e) = server.run().await {
        error!("Web server error: {}", e);
        std::process::exit(1);
    }
}
