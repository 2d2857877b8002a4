//! # Queue Status
//!
//! Read-only projection of the queue and sync state for the UI.
//!
//! `QueueStatus` is rebuilt from the source of truth on every read, so it
//! can never drift from the queue it describes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{ActionStatus, OfflineAction};

/// Snapshot of everything a sync indicator needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub is_online: bool,
    pub sync_in_progress: bool,
    pub pending_count: usize,
    pub syncing_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub errors: Vec<String>,
    #[ts(as = "Option<String>")]
    pub last_sync_time: Option<DateTime<Utc>>,
}

impl QueueStatus {
    /// Derives the status from the live actions and sync metadata.
    pub fn derive<'a>(
        actions: impl IntoIterator<Item = &'a OfflineAction>,
        is_online: bool,
        sync_in_progress: bool,
        last_sync_time: Option<DateTime<Utc>>,
        errors: &[String],
    ) -> Self {
        let mut status = QueueStatus {
            is_online,
            sync_in_progress,
            errors: errors.to_vec(),
            last_sync_time,
            ..Default::default()
        };

        for action in actions {
            match action.status {
                ActionStatus::Pending => status.pending_count += 1,
                ActionStatus::Syncing => status.syncing_count += 1,
                ActionStatus::Completed => status.completed_count += 1,
                ActionStatus::Failed => status.failed_count += 1,
            }
        }

        status
    }

    /// Total number of actions in the queue.
    pub fn total(&self) -> usize {
        self.pending_count + self.syncing_count + self.completed_count + self.failed_count
    }

    /// True when nothing is waiting and nothing has failed.
    pub fn is_settled(&self) -> bool {
        self.pending_count == 0 && self.syncing_count == 0 && self.failed_count == 0
    }
}
