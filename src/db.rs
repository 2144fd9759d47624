use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, Result, params};

use crate::network::Network;

const NETWORK_KEY: &str = "network";

/// Local preference storage. Only the selected network lives here.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        PreferenceStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn initialize(&self) -> Result<()> {
        let conn = Connection::open(&self.path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS preferences (
                key           TEXT PRIMARY KEY,
                value         TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            )",
            (),
        )?;

        Ok(())
    }

    /// The stored network, or the default when nothing (or garbage) is stored.
    pub fn load_network(&self) -> Result<Network> {
        let conn = Connection::open(&self.path)?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![NETWORK_KEY],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match stored {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                log::warn!("[Prefs] {}; falling back to {}", e, Network::default());
                Network::default()
            }),
            None => Network::default(),
        })
    }

    pub fn save_network(&self, network: Network) -> Result<()> {
        let conn = Connection::open(&self.path)?;
        conn.execute(
            "INSERT INTO preferences (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE
             SET value = excluded.value, updated_at = excluded.updated_at",
            params![
                NETWORK_KEY,
                network.as_str(),
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, PreferenceStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::new(dir.path().join("prefs.db"));
        store.initialize().unwrap();
        (dir, store)
    }

    #[test]
    fn defaults_to_mainnet() {
        let (_dir, store) = store();
        assert_eq!(store.load_network().unwrap(), Network::Mainnet);
    }

    #[test]
    fn remembers_the_last_switch() {
        let (_dir, store) = store();
        store.save_network(Network::Testnet).unwrap();
        assert_eq!(store.load_network().unwrap(), Network::Testnet);
        store.save_network(Network::Mainnet).unwrap();
        assert_eq!(store.load_network().unwrap(), Network::Mainnet);
    }

    #[test]
    fn ignores_corrupt_values() {
        let (_dir, store) = store();
        let conn = Connection::open(&store.path).unwrap();
        conn.execute(
            "INSERT INTO preferences (key, value, updated_at) VALUES ('network', 'devnet', '')",
            (),
        )
        .unwrap();
        assert_eq!(store.load_network().unwrap(), Network::Mainnet);
    }

    #[test]
    fn initialize_is_idempotent() {
        let (_dir, store) = store();
        store.save_network(Network::Testnet).unwrap();
        store.initialize().unwrap();
        assert_eq!(store.load_network().unwrap(), Network::Testnet);
    }
}
