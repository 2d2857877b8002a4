//! # Offline Storage Repository
//!
//! Loads and saves the offline queue of one namespace.
//!
//! ## Save Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    save(namespace, state)                               │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │    DELETE FROM offline_actions WHERE namespace = ?                     │
//! │    INSERT INTO offline_actions ... (one row per action, seq = index)   │
//! │    INSERT INTO offline_sync_meta ... ON CONFLICT DO UPDATE             │
//! │  COMMIT  ← all or nothing                                              │
//! │                                                                         │
//! │  A crash before COMMIT leaves the previous state untouched, so an      │
//! │  action is never half-written, lost, or duplicated.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::{ActionStatus, OfflineAction, PersistedState};

/// Repository for the persisted offline queue.
#[derive(Debug, Clone)]
pub struct OfflineStorageRepository {
    pool: SqlitePool,
}

impl OfflineStorageRepository {
    /// Creates a new OfflineStorageRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OfflineStorageRepository { pool }
    }

    /// Loads the state stored under `namespace`.
    ///
    /// Returns an empty state if nothing was ever saved there.
    pub async fn load(&self, namespace: &str) -> DbResult<PersistedState> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, payload, created_at, retry_count, max_retries, status
            FROM offline_actions
            WHERE namespace = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await?;

        let mut actions = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let payload: String = row.try_get("payload")?;
            let payload = serde_json::from_str(&payload)
                .map_err(|e| DbError::corrupt("offline_actions", &id, e))?;
            let status: ActionStatus = row.try_get("status")?;

            actions.push(OfflineAction {
                kind: row.try_get("kind")?,
                payload,
                created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
                retry_count: row.try_get("retry_count")?,
                max_retries: row.try_get("max_retries")?,
                status,
                id,
            });
        }

        let meta = sqlx::query(
            r#"
            SELECT last_sync_time, errors
            FROM offline_sync_meta
            WHERE namespace = ?1
            "#,
        )
        .bind(namespace)
        .fetch_optional(&self.pool)
        .await?;

        let (last_sync_time, errors) = match meta {
            Some(row) => {
                let last_sync_time: Option<DateTime<Utc>> = row.try_get("last_sync_time")?;
                let errors: String = row.try_get("errors")?;
                let errors = serde_json::from_str(&errors)
                    .map_err(|e| DbError::corrupt("offline_sync_meta", namespace, e))?;
                (last_sync_time, errors)
            }
            None => (None, Vec::new()),
        };

        debug!(
            namespace = %namespace,
            actions = actions.len(),
            "Loaded offline state"
        );

        Ok(PersistedState {
            actions,
            last_sync_time,
            errors,
        })
    }

    /// Replaces the state stored under `namespace` in one transaction.
    pub async fn save(&self, namespace: &str, state: &PersistedState) -> DbResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query("DELETE FROM offline_actions WHERE namespace = ?1")
            .bind(namespace)
            .execute(&mut *tx)
            .await?;

        for (seq, action) in state.actions.iter().enumerate() {
            let payload = serde_json::to_string(&action.payload)
                .map_err(|e| DbError::corrupt("offline_actions", &action.id, e))?;

            sqlx::query(
                r#"
                INSERT INTO offline_actions (
                    namespace, id, seq, kind, payload,
                    created_at, retry_count, max_retries, status
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5,
                    ?6, ?7, ?8, ?9
                )
                "#,
            )
            .bind(namespace)
            .bind(&action.id)
            .bind(seq as i64)
            .bind(&action.kind)
            .bind(payload)
            .bind(action.created_at)
            .bind(action.retry_count)
            .bind(action.max_retries)
            .bind(action.status)
            .execute(&mut *tx)
            .await?;
        }

        let errors = serde_json::to_string(&state.errors)
            .map_err(|e| DbError::corrupt("offline_sync_meta", namespace, e))?;

        sqlx::query(
            r#"
            INSERT INTO offline_sync_meta (namespace, last_sync_time, errors, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (namespace) DO UPDATE SET
                last_sync_time = excluded.last_sync_time,
                errors = excluded.errors,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(namespace)
        .bind(state.last_sync_time)
        .bind(errors)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(
            namespace = %namespace,
            actions = state.actions.len(),
            "Saved offline state"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::TimeZone;
    use serde_json::json;

    async fn repo() -> OfflineStorageRepository {
        Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .offline_storage()
    }

    fn sample_state() -> PersistedState {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();

        let mut failed = OfflineAction::new(
            "7d0f6c1e-0000-4000-8000-000000000002",
            "transaction.create",
            json!({ "total_cents": 1099, "lines": [{ "sku": "COKE", "qty": 2 }] }),
            t0,
        )
        .with_max_retries(5);
        failed.retry_count = 5;
        failed.status = ActionStatus::Failed;

        PersistedState {
            actions: vec![
                OfflineAction::new(
                    "7d0f6c1e-0000-4000-8000-000000000001",
                    "product.update",
                    json!({ "sku": "COKE", "price_cents": 199 }),
                    t0,
                ),
                failed,
            ],
            last_sync_time: Some(t0),
            errors: vec!["Failed to sync transaction.create: 503".to_string()],
        }
    }

    #[tokio::test]
    async fn test_load_empty_namespace() {
        let repo = repo().await;
        let state = repo.load("offline-storage").await.unwrap();
        assert_eq!(state, PersistedState::default());
    }

    #[tokio::test]
    async fn test_save_then_load_keeps_every_field() {
        let repo = repo().await;
        let state = sample_state();

        repo.save("offline-storage", &state).await.unwrap();
        let loaded = repo.load("offline-storage").await.unwrap();

        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_save_replaces_previous_state() {
        let repo = repo().await;
        let mut state = sample_state();
        repo.save("offline-storage", &state).await.unwrap();

        state.actions.remove(0);
        state.errors.clear();
        repo.save("offline-storage", &state).await.unwrap();

        let loaded = repo.load("offline-storage").await.unwrap();
        assert_eq!(loaded.actions.len(), 1);
        assert_eq!(loaded.actions[0].kind, "transaction.create");
        assert!(loaded.errors.is_empty());
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let repo = repo().await;
        repo.save("register-1", &sample_state()).await.unwrap();

        assert!(repo.load("register-2").await.unwrap().actions.is_empty());

        // Rewriting one namespace leaves the other's rows alone.
        repo.save("register-2", &PersistedState::default()).await.unwrap();
        assert_eq!(repo.load("register-1").await.unwrap(), sample_state());
    }

    #[tokio::test]
    async fn test_order_follows_queue_position_not_timestamp() {
        let repo = repo().await;
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let state = PersistedState {
            actions: vec![
                OfflineAction::new("b", "product.update", json!(2), t0),
                OfflineAction::new("a", "product.update", json!(1), t0),
            ],
            ..Default::default()
        };

        repo.save("offline-storage", &state).await.unwrap();
        let loaded = repo.load("offline-storage").await.unwrap();

        let ids: Vec<_> = loaded.actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
