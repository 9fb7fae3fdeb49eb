use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection string
    #[serde(default = "default_db_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Size of each stored chunk in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_dist_path")]
    pub dist_path: String,
}

pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;
const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_db_url() -> String {
    "sqlite:data/udm.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_upload_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_dist_path() -> String {
    "frontend/dist".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            dist_path: default_dist_path(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides(|key| env::var(key).ok());
        config.validate()?;
        config.ensure_directories()?;
        Ok(config)
    }

    /// Load configuration from udm.toml or config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["udm.toml", "config.toml", "data/udm.toml", "data/config.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config: Config = toml::from_str(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    /// Format: UDM_CONF_<SECTION>_<KEY>
    fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("UDM_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        if let Some(port) = lookup("UDM_CONF_SERVER_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }

        if let Some(val) = lookup("UDM_CONF_DATABASE_URL") {
            if !val.trim().is_empty() {
                self.database.url = val;
            }
        }
        if let Some(n) = lookup("UDM_CONF_DATABASE_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
            self.database.max_connections = n;
        }

        if let Some(size) = lookup("UDM_CONF_STORAGE_CHUNK_SIZE").and_then(|v| v.parse().ok()) {
            self.storage.chunk_size = size;
        }
        if let Some(size) = lookup("UDM_CONF_STORAGE_MAX_UPLOAD_BYTES").and_then(|v| v.parse().ok())
        {
            self.storage.max_upload_bytes = size;
        }

        if let Some(val) = lookup("UDM_CONF_UI_DIST_PATH") {
            self.ui.dist_path = val;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.storage.chunk_size == 0 || self.storage.chunk_size > MAX_CHUNK_SIZE {
            anyhow::bail!(
                "storage.chunk_size must be between 1 and {} bytes",
                MAX_CHUNK_SIZE
            );
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }
        Ok(())
    }

    /// Ensure the directory of a file-backed SQLite database exists
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = sqlite_file_path(&self.database.url).and_then(|p| p.parent()) {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// File path of a `sqlite:` URL, `None` for in-memory databases
fn sqlite_file_path(url: &str) -> Option<&Path> {
    let rest = url.strip_prefix("sqlite:")?;
    let rest = rest.trim_start_matches("//");
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(Path::new(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.url, "sqlite:data/udm.db?mode=rwc");
        assert_eq!(config.storage.chunk_size, 261_120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [database]
            url = "sqlite::memory:"

            [storage]
            chunk_size = 1024
            "#,
        )
        .unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.storage.chunk_size, 1024);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("UDM_CONF_SERVER_PORT", "8081"),
            ("UDM_CONF_DATABASE_URL", "sqlite:/tmp/other.db"),
            ("UDM_CONF_STORAGE_CHUNK_SIZE", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.database.url, "sqlite:/tmp/other.db");
        assert_eq!(config.storage.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let mut config = Config::default();
        config.storage.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sqlite_file_path() {
        assert_eq!(
            sqlite_file_path("sqlite:data/udm.db?mode=rwc"),
            Some(Path::new("data/udm.db"))
        );
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(sqlite_file_path("postgres://x"), None);
    }
}
