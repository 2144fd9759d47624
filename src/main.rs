use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::{error, info};
use std::path::Path;

mod aggregate;
mod cache;
mod client;
mod config;
mod db;
mod decode;
mod env_setup;
mod error;
mod formatters;
mod models;
mod network;
mod routes;
mod state;
mod worker;

use config::Config;
use db::PreferenceStore;
use state::Dashboard;

/// Boots the dashboard backend: .env and logging, the preference store, the
/// shared dashboard context, the background refresher, then the HTTP server.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Create a default .env file if needed, then load it.
    env_setup::setup_env(Path::new(".env"))?;
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    // The selected network survives restarts. The app won't start without the store.
    let prefs = PreferenceStore::new(&config.prefs_path);
    let network = match prefs.initialize().and_then(|_| prefs.load_network()) {
        Ok(network) => network,
        Err(e) => {
            error!("Failed to open preference store: {}", e);
            return Err(std::io::Error::other("Preference store initialization failed"));
        }
    };
    info!("[Main] Preferences loaded, active network is {}.", network);

    let dashboard = match Dashboard::new(&config, prefs, network) {
        Ok(dashboard) => web::Data::new(dashboard),
        Err(e) => {
            error!("Failed to build API client: {}", e);
            return Err(std::io::Error::other("API client initialization failed"));
        }
    };

    worker::spawn_worker(dashboard.clone().into_inner(), config.refresh_interval);
    info!("[Main] Background worker started.");

    let port = config.server_port;
    info!("Starting server on http://0.0.0.0:{}", port);
    HttpServer::new(move || {
        App::new()
            .app_data(dashboard.clone())
            .configure(routes::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
