//! # Durable Store
//!
//! Where queue state goes between process restarts.
//!
//! ## Implementations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  DurableStore (trait)                                                  │
//! │  ├── SqliteStore   tally-db, one namespace per queue, transactional    │
//! │  └── MemoryStore   process-local, for tests and throwaway sessions     │
//! │                                                                         │
//! │  save_state() always writes the whole record: actions in FIFO order,   │
//! │  last_sync_time, errors. Runtime flags are never part of it.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use tally_core::PersistedState;
use tally_db::Database;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

/// Persists queue state under a fixed namespace.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Loads the last saved state, or an empty one.
    async fn load_state(&self) -> SyncResult<PersistedState>;

    /// Replaces the saved state atomically.
    async fn save_state(&self, state: &PersistedState) -> SyncResult<()>;
}

// =============================================================================
// SQLite Store
// =============================================================================

/// SQLite-backed store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
    namespace: String,
}

impl SqliteStore {
    pub fn new(db: Database, namespace: impl Into<String>) -> Self {
        SqliteStore {
            db,
            namespace: namespace.into(),
        }
    }

    /// Opens (creating if needed) the database named by the config.
    pub async fn open(config: &SyncConfig) -> SyncResult<Self> {
        let db_config = config.db_config()?;

        if let Some(parent) = db_config.database_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SyncError::DatabaseError(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        info!(
            path = %db_config.database_path.display(),
            namespace = %config.namespace(),
            "Opening offline store"
        );

        let db = Database::new(db_config).await?;
        Ok(Self::new(db, config.namespace()))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn load_state(&self) -> SyncResult<PersistedState> {
        Ok(self.db.offline_storage().load(&self.namespace).await?)
    }

    async fn save_state(&self, state: &PersistedState) -> SyncResult<()> {
        Ok(self.db.offline_storage().save(&self.namespace, state).await?)
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory store. Contents are lost with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<PersistedState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from previously saved state (e.g. to simulate a restart).
    pub fn with_state(state: PersistedState) -> Self {
        MemoryStore {
            state: Mutex::new(state),
        }
    }

    /// Returns a copy of what is currently saved.
    pub async fn snapshot(&self) -> PersistedState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn load_state(&self) -> SyncResult<PersistedState> {
        Ok(self.snapshot().await)
    }

    async fn save_state(&self, state: &PersistedState) -> SyncResult<()> {
        *self.state.lock().await = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tally_core::OfflineAction;
    use tally_db::DbConfig;

    fn state() -> PersistedState {
        PersistedState {
            actions: vec![OfflineAction::new(
                "a-1",
                "product.update",
                json!({ "sku": "COKE" }),
                Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            )],
            last_sync_time: None,
            errors: vec!["Failed to sync product.update: HTTP 503".into()],
        }
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.load_state().await.unwrap(), PersistedState::default());

        store.save_state(&state()).await.unwrap();
        assert_eq!(store.load_state().await.unwrap(), state());
    }

    #[tokio::test]
    async fn test_sqlite_store_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = SqliteStore::new(db, "offline-storage");

        store.save_state(&state()).await.unwrap();
        let loaded = store.load_state().await.unwrap();

        assert_eq!(loaded.actions.len(), 1);
        assert_eq!(loaded.actions[0].payload, json!({ "sku": "COKE" }));
        assert_eq!(loaded.errors, state().errors);
    }

    #[tokio::test]
    async fn test_sqlite_store_open_from_config() {
        let dir = std::env::temp_dir().join(format!("tally-store-{}", uuid::Uuid::new_v4()));
        let mut config = SyncConfig::default();
        config.storage.database_path = Some(dir.join("offline.db"));

        let store = SqliteStore::open(&config).await.unwrap();
        assert_eq!(store.namespace(), "offline-storage");
        assert!(store.database().health_check().await);

        store.database().close().await;
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_sqlite_store_open_reports_unusable_directory() {
        let blocker = std::env::temp_dir().join(format!("tally-blocker-{}", uuid::Uuid::new_v4()));
        std::fs::write(&blocker, b"not a directory").unwrap();
        let mut config = SyncConfig::default();
        config.storage.database_path = Some(blocker.join("nested").join("offline.db"));

        let err = SqliteStore::open(&config).await.unwrap_err();
        assert!(matches!(err, SyncError::DatabaseError(ref msg) if msg.contains("cannot create")));
        assert!(!err.is_config_error());

        let _ = std::fs::remove_file(blocker);
    }
}
