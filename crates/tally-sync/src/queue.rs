//! # Action Queue
//!
//! Ordered in-memory collection of offline actions. The single source of
//! truth for queue state; the agent owns exactly one behind its lock.
//!
//! ## Ordering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   front ──► [a-1 pending] [a-2 failed] [a-3 pending] [a-4 syncing] ◄── back
//! │                                                                         │
//! │   • push() appends, so position == enqueue order                       │
//! │   • a retried action keeps its slot; it competes with newer actions    │
//! │     strictly by position on the next pass                              │
//! │   • list() hands out copies, never references into the live queue      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tally_core::{ActionStatus, OfflineAction};

use crate::error::{SyncError, SyncResult};

/// FIFO queue of actions keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionQueue {
    actions: Vec<OfflineAction>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a queue from persisted actions, keeping their order.
    ///
    /// Later duplicates of an id are dropped.
    pub fn from_actions(actions: Vec<OfflineAction>) -> Self {
        let mut queue = ActionQueue::new();
        for action in actions {
            let _ = queue.push(action);
        }
        queue
    }

    /// Appends an action. Ids must be unique within the queue.
    pub fn push(&mut self, action: OfflineAction) -> SyncResult<()> {
        if self.contains(&action.id) {
            return Err(SyncError::DuplicateAction(action.id));
        }
        self.actions.push(action);
        Ok(())
    }

    /// Removes and returns the action, if present.
    pub fn remove(&mut self, id: &str) -> Option<OfflineAction> {
        let index = self.actions.iter().position(|a| a.id == id)?;
        Some(self.actions.remove(index))
    }

    /// Updates status in place. Returns false if the id is absent.
    pub fn set_status(&mut self, id: &str, status: ActionStatus) -> bool {
        match self.get_mut(id) {
            Some(action) => {
                action.status = status;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.actions.iter().any(|a| a.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&OfflineAction> {
        self.actions.iter().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut OfflineAction> {
        self.actions.iter_mut().find(|a| a.id == id)
    }

    /// Snapshot of the queue, optionally narrowed to one status.
    pub fn list(&self, filter: Option<ActionStatus>) -> Vec<OfflineAction> {
        self.actions
            .iter()
            .filter(|a| filter.map_or(true, |status| a.status == status))
            .cloned()
            .collect()
    }

    /// Ids of pending actions in enqueue order.
    pub fn pending_ids(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter(|a| a.is_pending())
            .map(|a| a.id.clone())
            .collect()
    }

    /// Puts every `Syncing` action back to `Pending`. Returns how many moved.
    pub fn reset_syncing(&mut self) -> usize {
        let mut reset = 0;
        for action in self
            .actions
            .iter_mut()
            .filter(|a| a.status == ActionStatus::Syncing)
        {
            action.status = ActionStatus::Pending;
            reset += 1;
        }
        reset
    }

    pub fn iter(&self) -> impl Iterator<Item = &OfflineAction> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Copies the actions out for persistence.
    pub fn to_vec(&self) -> Vec<OfflineAction> {
        self.actions.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn action(id: &str) -> OfflineAction {
        OfflineAction::new(id, "product.update", json!({ "id": id }), Utc::now())
    }

    fn queue_of(ids: &[&str]) -> ActionQueue {
        let mut queue = ActionQueue::new();
        for id in ids {
            queue.push(action(id)).unwrap();
        }
        queue
    }

    #[test]
    fn test_push_keeps_order() {
        let queue = queue_of(&["a", "b", "c"]);
        let ids: Vec<_> = queue.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn test_push_rejects_duplicate_id() {
        let mut queue = queue_of(&["a"]);
        let err = queue.push(action("a")).unwrap_err();
        assert!(matches!(err, SyncError::DuplicateAction(id) if id == "a"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut queue = queue_of(&["a", "b"]);
        assert_eq!(queue.remove("a").map(|a| a.id), Some("a".to_string()));
        assert!(queue.remove("a").is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_set_status_on_missing_id_is_noop() {
        let mut queue = queue_of(&["a"]);
        assert!(!queue.set_status("zzz", ActionStatus::Failed));
        assert!(queue.set_status("a", ActionStatus::Failed));
        assert_eq!(queue.get("a").unwrap().status, ActionStatus::Failed);
    }

    #[test]
    fn test_list_filters_and_copies() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.set_status("b", ActionStatus::Failed);

        let mut snapshot = queue.list(None);
        assert_eq!(snapshot.len(), 3);

        // Mutating the copy leaves the queue alone.
        snapshot[0].status = ActionStatus::Completed;
        assert_eq!(queue.get("a").unwrap().status, ActionStatus::Pending);

        let failed = queue.list(Some(ActionStatus::Failed));
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, "b");
    }

    #[test]
    fn test_pending_ids_in_fifo_order() {
        let mut queue = queue_of(&["a", "b", "c", "d"]);
        queue.set_status("b", ActionStatus::Completed);
        assert_eq!(queue.pending_ids(), ["a", "c", "d"]);
    }

    #[test]
    fn test_reset_syncing() {
        let mut queue = queue_of(&["a", "b"]);
        queue.set_status("a", ActionStatus::Syncing);
        assert_eq!(queue.reset_syncing(), 1);
        assert_eq!(queue.pending_ids(), ["a", "b"]);
    }

    #[test]
    fn test_from_actions_drops_duplicates() {
        let queue = ActionQueue::from_actions(vec![action("a"), action("b"), action("a")]);
        assert_eq!(queue.len(), 2);
    }
}
