//! # Domain Types
//!
//! Core types of the offline action queue.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Queue Types                                     │
//! │                                                                         │
//! │  ┌──────────────────────┐        ┌──────────────────────┐              │
//! │  │    OfflineAction     │        │    ActionStatus      │              │
//! │  │  ──────────────────  │        │  ──────────────────  │              │
//! │  │  id (UUID)           │───────►│  Pending             │              │
//! │  │  kind ("sale.create")│        │  Syncing             │              │
//! │  │  payload (opaque)    │        │  Completed  terminal │              │
//! │  │  retry_count         │        │  Failed     terminal │              │
//! │  │  max_retries         │        └──────────────────────┘              │
//! │  └──────────────────────┘                                              │
//! │                                                                         │
//! │  ┌──────────────────────┐                                              │
//! │  │   PersistedState     │  What survives a restart: actions,           │
//! │  │  ──────────────────  │  last_sync_time, errors.                     │
//! │  │  actions (FIFO)      │  Runtime flags (online, in-progress)         │
//! │  │  last_sync_time      │  are never stored.                           │
//! │  │  errors              │                                              │
//! │  └──────────────────────┘                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::DEFAULT_MAX_RETRIES;

// =============================================================================
// Action Status
// =============================================================================

/// Delivery state of an offline action.
///
/// ## State Machine
/// ```text
///            enqueue
///               │
///               ▼
///         ┌──────────┐   pass picks it up   ┌──────────┐
///         │ Pending  │─────────────────────►│ Syncing  │
///         └──────────┘                      └────┬─────┘
///               ▲     failure, retries left      │
///               └────────────────────────────────┤
///                                                │
///                     success ┌──────────────────┴───┐ retries exhausted
///                             ▼                      ▼
///                       ┌───────────┐          ┌──────────┐
///                       │ Completed │          │  Failed  │
///                       └───────────┘          └──────────┘
///                        removed after           kept until the
///                        the grace delay         user acts on it
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Waiting for the next sync pass.
    Pending,
    /// Being delivered by the active sync pass.
    Syncing,
    /// Delivered; awaiting removal after the grace delay.
    Completed,
    /// Retries exhausted; needs manual intervention.
    Failed,
}

impl ActionStatus {
    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionStatus::Completed | ActionStatus::Failed)
    }

    /// Lowercase name, matching the serialized and stored form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Syncing => "syncing",
            ActionStatus::Completed => "completed",
            ActionStatus::Failed => "failed",
        }
    }
}

impl Default for ActionStatus {
    fn default() -> Self {
        ActionStatus::Pending
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Offline Action
// =============================================================================

/// One intended mutation awaiting delivery to the backend.
///
/// `kind` and `payload` are opaque here: the queue never looks inside them,
/// it only hands them to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OfflineAction {
    pub id: String,
    /// Operation tag, e.g. "product.update" or "transaction.create".
    pub kind: String,
    /// Operation arguments as JSON.
    #[ts(type = "unknown")]
    pub payload: serde_json::Value,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    /// Failed delivery attempts so far. Never decreases.
    pub retry_count: u32,
    /// Attempts allowed before the action becomes `Failed`.
    pub max_retries: u32,
    pub status: ActionStatus,
}

impl OfflineAction {
    /// Creates a pending action with the default retry budget.
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        OfflineAction {
            id: id.into(),
            kind: kind.into(),
            payload,
            created_at,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            status: ActionStatus::Pending,
        }
    }

    /// Overrides the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns true if the next sync pass should pick this action up.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status == ActionStatus::Pending
    }

    /// Attempts left before the action fails for good.
    pub fn retries_remaining(&self) -> u32 {
        self.max_retries.saturating_sub(self.retry_count)
    }
}

// =============================================================================
// Persisted State
// =============================================================================

/// The record written to the durable store.
///
/// Only fields that are meaningful after a restart live here. Connectivity
/// and the in-progress flag are re-derived at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Actions in enqueue order.
    pub actions: Vec<OfflineAction>,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub errors: Vec<String>,
}

impl PersistedState {
    /// Repairs state left behind by a process that stopped mid-pass.
    ///
    /// No pass survives a restart, so `Syncing` is reset to `Pending`.
    /// `Completed` actions already had their delivery confirmed and are
    /// dropped. Returns the number of actions that were changed or removed.
    pub fn recover(&mut self) -> usize {
        let before = self.actions.len();
        self.actions.retain(|a| a.status != ActionStatus::Completed);
        let mut touched = before - self.actions.len();

        for action in self
            .actions
            .iter_mut()
            .filter(|a| a.status == ActionStatus::Syncing)
        {
            action.status = ActionStatus::Pending;
            touched += 1;
        }

        touched
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(id: &str, status: ActionStatus) -> OfflineAction {
        let mut a = OfflineAction::new(id, "product.update", json!({ "sku": "COKE" }), Utc::now());
        a.status = status;
        a
    }

    #[test]
    fn test_new_action_defaults() {
        let a = OfflineAction::new("a-1", "sale.create", json!(null), Utc::now());
        assert_eq!(a.status, ActionStatus::Pending);
        assert_eq!(a.retry_count, 0);
        assert_eq!(a.max_retries, 3);
        assert_eq!(a.retries_remaining(), 3);
        assert!(a.is_pending());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&ActionStatus::Syncing).unwrap(), "\"syncing\"");
        let parsed: ActionStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, ActionStatus::Failed);
        assert_eq!(ActionStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ActionStatus::Completed.is_terminal());
        assert!(ActionStatus::Failed.is_terminal());
        assert!(!ActionStatus::Pending.is_terminal());
        assert!(!ActionStatus::Syncing.is_terminal());
    }

    #[test]
    fn test_recover_resets_syncing_and_drops_completed() {
        let mut state = PersistedState {
            actions: vec![
                action("a", ActionStatus::Syncing),
                action("b", ActionStatus::Completed),
                action("c", ActionStatus::Failed),
                action("d", ActionStatus::Pending),
            ],
            last_sync_time: None,
            errors: vec![],
        };

        assert_eq!(state.recover(), 2);

        let ids: Vec<_> = state.actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "d"]);
        assert_eq!(state.actions[0].status, ActionStatus::Pending);
        assert_eq!(state.actions[1].status, ActionStatus::Failed);
    }
}
