use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;


/// Runtime settings, read from the environment after `.env` is loaded.
#[derive(Debug, Clone)]
pub struct Config {
    pub mainnet_api_url: String,
    pub testnet_api_url: String,
    pub prefs_path: PathBuf,
    pub refresh_interval: Duration,
    pub fetch_timeout: Duration,
    pub fetch_retries: u32,
    pub retry_backoff: Duration,
    pub server_port: u16,
    pub cache_ttl: Duration,
    pub cache_max_entries: u64,
    pub default_page_size: usize,
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("[Config] Ignoring unparseable {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mainnet_api_url = lookup("MAINNET_API_URL")
            .unwrap_or_else(|| "https://dashboard.fiber.world/api".to_string());
        let testnet_api_url = lookup("TESTNET_API_URL")
            .unwrap_or_else(|| "https://testnet.dashboard.fiber.world/api".to_string());
        let prefs_path = lookup("PREFS_PATH").unwrap_or_else(|| "fiberdash.db".to_string());

        Config {
            mainnet_api_url: mainnet_api_url.trim_end_matches('/').to_string(),
            testnet_api_url: testnet_api_url.trim_end_matches('/').to_string(),
            prefs_path: PathBuf::from(prefs_path),
            refresh_interval: Duration::from_secs(parse_or(
                &lookup,
                "REFRESH_INTERVAL_SECONDS",
                60,
            )),
            fetch_timeout: Duration::from_secs(parse_or(&lookup, "FETCH_TIMEOUT_SECONDS", 30)),
            // At least one attempt is always made.
            fetch_retries: parse_or(&lookup, "FETCH_RETRIES", 3u32).max(1),
            retry_backoff: Duration::from_millis(parse_or(&lookup, "RETRY_BACKOFF_MILLIS", 500)),
            server_port: parse_or(&lookup, "SERVER_PORT", 8080),
            cache_ttl: Duration::from_secs(parse_or(&lookup, "CACHE_TTL_SECONDS", 300)),
            cache_max_entries: parse_or(&lookup, "CACHE_MAX_ENTRIES", 10_000),
            default_page_size: parse_or(&lookup, "DEFAULT_PAGE_SIZE", 10usize).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn falls_back_to_defaults() {
        let config = config_with(&[]);
        assert_eq!(config.fetch_retries, 3);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn reads_overrides_and_ignores_garbage() {
        let config = config_with(&[
            ("TESTNET_API_URL", "http://localhost:8000/"),
            ("FETCH_RETRIES", "0"),
            ("SERVER_PORT", "not-a-port"),
            ("CACHE_TTL_SECONDS", " 15 "),
        ]);
        assert_eq!(config.testnet_api_url, "http://localhost:8000");
        assert_eq!(config.fetch_retries, 1);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.cache_ttl, Duration::from_secs(15));
    }
}
