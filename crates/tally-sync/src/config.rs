//! # Sync Configuration
//!
//! Configuration management for the offline queue.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_MAX_RETRIES=5                                                │
//! │     TALLY_DATABASE_PATH=/var/lib/tally/offline.db                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/offline/sync.toml (Linux)                                │
//! │     ~/Library/Application Support/com.tally.offline/sync.toml (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     namespace "offline-storage", 3 retries, 5s grace delay             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [queue]
//! namespace = "offline-storage"
//! max_retries = 3
//! grace_delay_ms = 5000
//!
//! [sync]
//! transport_timeout_secs = 30
//! sync_on_enqueue = true
//! start_online = false
//!
//! [storage]
//! database_path = "/var/lib/tally/offline.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use tally_core::validation::validate_max_retries;
use tally_core::{DEFAULT_MAX_RETRIES, DEFAULT_NAMESPACE};
use tally_db::DbConfig;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Queue Settings
// =============================================================================

/// How actions are kept and retired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Storage namespace the queue is saved under.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Delivery attempts per action before it becomes `failed`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// How long a completed action stays visible before removal (ms).
    #[serde(default = "default_grace_delay")]
    pub grace_delay_ms: u64,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_grace_delay() -> u64 {
    5_000
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            namespace: default_namespace(),
            max_retries: default_max_retries(),
            grace_delay_ms: default_grace_delay(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync pass behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Upper bound for one transport call (seconds). Expiry counts as a
    /// failed attempt.
    #[serde(default = "default_transport_timeout")]
    pub transport_timeout_secs: u64,

    /// Start a pass right after an enqueue when online and idle.
    #[serde(default = "default_true")]
    pub sync_on_enqueue: bool,

    /// Connectivity assumed before the first signal arrives.
    #[serde(default)]
    pub start_online: bool,
}

fn default_transport_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            transport_timeout_secs: default_transport_timeout(),
            sync_on_enqueue: true,
            start_online: false,
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Where the durable store lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// SQLite file path. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete configuration for a sync agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub queue: QueueSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.queue.namespace.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "queue.namespace must not be empty".into(),
            ));
        }

        validate_max_retries(self.queue.max_retries)
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;

        if self.sync.transport_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "transport_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(namespace) = lookup("TALLY_NAMESPACE") {
            debug!(namespace = %namespace, "Overriding namespace from environment");
            self.queue.namespace = namespace;
        }

        if let Some(value) = lookup("TALLY_MAX_RETRIES") {
            match value.parse::<u32>() {
                Ok(n) => self.queue.max_retries = n,
                Err(_) => warn!(value = %value, "Ignoring invalid TALLY_MAX_RETRIES"),
            }
        }

        if let Some(value) = lookup("TALLY_GRACE_DELAY_MS") {
            match value.parse::<u64>() {
                Ok(ms) => self.queue.grace_delay_ms = ms,
                Err(_) => warn!(value = %value, "Ignoring invalid TALLY_GRACE_DELAY_MS"),
            }
        }

        if let Some(value) = lookup("TALLY_TRANSPORT_TIMEOUT_SECS") {
            match value.parse::<u64>() {
                Ok(secs) => self.sync.transport_timeout_secs = secs,
                Err(_) => warn!(value = %value, "Ignoring invalid TALLY_TRANSPORT_TIMEOUT_SECS"),
            }
        }

        if let Some(value) = lookup("TALLY_START_ONLINE") {
            match value.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.sync.start_online = true,
                "0" | "false" | "no" => self.sync.start_online = false,
                _ => warn!(value = %value, "Ignoring invalid TALLY_START_ONLINE"),
            }
        }

        if let Some(path) = lookup("TALLY_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.storage.database_path = Some(PathBuf::from(path));
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "tally", "offline")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the storage namespace.
    pub fn namespace(&self) -> &str {
        &self.queue.namespace
    }

    /// Returns the grace delay before completed actions are removed.
    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.queue.grace_delay_ms)
    }

    /// Returns the per-call transport timeout.
    pub fn transport_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.transport_timeout_secs)
    }

    /// Resolves the SQLite file path: configured, else platform data dir.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.storage.database_path.clone().or_else(|| {
            Self::project_dirs().map(|dirs| dirs.data_dir().join("offline.db"))
        })
    }

    /// Builds the database configuration for the durable store.
    pub fn db_config(&self) -> SyncResult<DbConfig> {
        self.database_path()
            .map(DbConfig::new)
            .ok_or_else(|| SyncError::InvalidConfig("No database path available".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.namespace(), "offline-storage");
        assert_eq!(config.queue.max_retries, 3);
        assert_eq!(config.grace_delay(), Duration::from_secs(5));
        assert_eq!(config.transport_timeout(), Duration::from_secs(30));
        assert!(config.sync.sync_on_enqueue);
        assert!(!config.sync.start_online);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.queue.namespace = "  ".to_string();
        assert!(config.validate().is_err());

        config.queue.namespace = "register-1".to_string();
        config.queue.max_retries = 0;
        assert!(config.validate().is_err());

        config.queue.max_retries = 5;
        config.sync.transport_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.sync.transport_timeout_secs = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [queue]
            max_retries = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.queue.max_retries, 7);
        assert_eq!(config.queue.namespace, "offline-storage");
        assert_eq!(config.sync.transport_timeout_secs, 30);
        assert!(config.sync.sync_on_enqueue);
    }

    #[test]
    fn test_toml_serialization() {
        let config = SyncConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[queue]"));
        assert!(toml_str.contains("[sync]"));

        let parsed: SyncConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TALLY_NAMESPACE", "register-2"),
            ("TALLY_MAX_RETRIES", "5"),
            ("TALLY_GRACE_DELAY_MS", "not-a-number"),
            ("TALLY_START_ONLINE", "yes"),
            ("TALLY_DATABASE_PATH", "/tmp/offline.db"),
        ]);

        let mut config = SyncConfig::default();
        config.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.namespace(), "register-2");
        assert_eq!(config.queue.max_retries, 5);
        assert_eq!(config.queue.grace_delay_ms, 5_000);
        assert!(config.sync.start_online);
        assert_eq!(config.database_path(), Some(PathBuf::from("/tmp/offline.db")));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("tally-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("sync.toml");

        let mut config = SyncConfig::default();
        config.queue.grace_delay_ms = 250;
        config.save(Some(path.clone())).unwrap();

        let loaded = SyncConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.queue.grace_delay_ms, 250);

        let _ = std::fs::remove_dir_all(dir);
    }
}
