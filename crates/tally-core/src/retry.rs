//! # Retry Policy
//!
//! Decides what happens to an action after one delivery attempt.
//!
//! ## Decision Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  outcome    retry_count'         status'                               │
//! │  ─────────  ───────────────────  ─────────────────────────────────     │
//! │  Delivered  retry_count          Completed                             │
//! │  Failed     retry_count + 1      Failed   if retry_count' >= max       │
//! │                                  Pending  otherwise                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The policy is a pure function: the sync engine feeds it the action and
//! the transport outcome and writes back whatever it returns.

use crate::types::{ActionStatus, OfflineAction};

/// Result of one delivery attempt, as far as the policy cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
}

/// New status and retry count for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub status: ActionStatus,
    pub retry_count: u32,
}

impl RetryDecision {
    /// Writes the decision onto the action.
    pub fn apply_to(self, action: &mut OfflineAction) {
        action.status = self.status;
        action.retry_count = self.retry_count;
    }
}

/// Decides the action's next state after a delivery attempt.
///
/// An action whose count already sits at its budget fails without being
/// incremented again, so `retry_count` never exceeds `max_retries`.
pub fn decide(action: &OfflineAction, outcome: DeliveryOutcome) -> RetryDecision {
    match outcome {
        DeliveryOutcome::Delivered => RetryDecision {
            status: ActionStatus::Completed,
            retry_count: action.retry_count,
        },
        DeliveryOutcome::Failed => {
            if action.retry_count >= action.max_retries {
                return RetryDecision {
                    status: ActionStatus::Failed,
                    retry_count: action.retry_count,
                };
            }

            let retry_count = action.retry_count + 1;
            let status = if retry_count >= action.max_retries {
                ActionStatus::Failed
            } else {
                ActionStatus::Pending
            };

            RetryDecision {
                status,
                retry_count,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn action_with(retry_count: u32, max_retries: u32) -> OfflineAction {
        let mut a = OfflineAction::new("a-1", "product.update", json!({}), Utc::now())
            .with_max_retries(max_retries);
        a.retry_count = retry_count;
        a.status = ActionStatus::Syncing;
        a
    }

    #[test]
    fn test_success_completes_without_touching_count() {
        let decision = decide(&action_with(2, 3), DeliveryOutcome::Delivered);
        assert_eq!(decision.status, ActionStatus::Completed);
        assert_eq!(decision.retry_count, 2);
    }

    #[test]
    fn test_failure_with_budget_left_goes_back_to_pending() {
        let decision = decide(&action_with(0, 3), DeliveryOutcome::Failed);
        assert_eq!(decision.status, ActionStatus::Pending);
        assert_eq!(decision.retry_count, 1);

        let decision = decide(&action_with(1, 3), DeliveryOutcome::Failed);
        assert_eq!(decision.status, ActionStatus::Pending);
        assert_eq!(decision.retry_count, 2);
    }

    #[test]
    fn test_failure_reaching_budget_is_terminal() {
        let decision = decide(&action_with(2, 3), DeliveryOutcome::Failed);
        assert_eq!(decision.status, ActionStatus::Failed);
        assert_eq!(decision.retry_count, 3);
    }

    #[test]
    fn test_single_attempt_budget() {
        let decision = decide(&action_with(0, 1), DeliveryOutcome::Failed);
        assert_eq!(decision.status, ActionStatus::Failed);
        assert_eq!(decision.retry_count, 1);
    }

    #[test]
    fn test_count_never_exceeds_budget() {
        let mut action = action_with(0, 3);
        for _ in 0..10 {
            decide(&action, DeliveryOutcome::Failed).apply_to(&mut action);
            assert!(action.retry_count <= action.max_retries);
        }
        assert_eq!(action.status, ActionStatus::Failed);
        assert_eq!(action.retry_count, 3);
    }
}
