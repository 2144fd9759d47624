use std::fs::File;
use std::io::Write;
use std::path::Path;

const DEFAULT_ENV: &str = r#"
MAINNET_API_URL="https://dashboard.fiber.world/api"
TESTNET_API_URL="https://testnet.dashboard.fiber.world/api"
PREFS_PATH="fiberdash.db"
REFRESH_INTERVAL_SECONDS=60
FETCH_TIMEOUT_SECONDS=30
FETCH_RETRIES=3
RETRY_BACKOFF_MILLIS=500
SERVER_PORT=8080
CACHE_TTL_SECONDS=300
CACHE_MAX_ENTRIES=10000
DEFAULT_PAGE_SIZE=10
RUST_LOG=info
"#;

/// Writes a default `.env` next to the binary's working directory if none exists.
pub fn setup_env(env_path: &Path) -> std::io::Result<bool> {
    if env_path.exists() {
        return Ok(false);
    }
    let mut file = File::create(env_path)?;
    file.write_all(DEFAULT_ENV.as_bytes())?;
    // The logger is not up yet.
    println!("[Env] Created {} with default configurations.", env_path.display());
    Ok(true)
}
