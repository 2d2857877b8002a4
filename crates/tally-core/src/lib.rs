//! # tally-core: Pure Queue Logic
//!
//! Types and decisions for the offline action queue, with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Producers (sale screen, inventory editor)            │   │
//! │  │      add_offline_action("product.update", payload)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             tally-sync (queue + sync engine)                    │   │
//! │  └──────────────┬─────────────────────────────────┬────────────────┘   │
//! │                 │                                 │                     │
//! │  ┌──────────────▼──────────────────┐  ┌───────────▼────────────────┐   │
//! │  │   ★ tally-core (THIS CRATE) ★   │  │  tally-db (SQLite store)   │   │
//! │  │                                 │  └────────────────────────────┘   │
//! │  │  types   retry   status  valid. │                                    │
//! │  │  NO I/O • NO TIMERS • PURE      │                                    │
//! │  └─────────────────────────────────┘                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - `OfflineAction`, `ActionStatus`, `PersistedState`
//! - [`retry`] - Retry policy (pure decision function)
//! - [`status`] - `QueueStatus` projection for the UI
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use serde_json::json;
//! use tally_core::retry::{decide, DeliveryOutcome};
//! use tally_core::{ActionStatus, OfflineAction};
//!
//! let action = OfflineAction::new("a-1", "product.update", json!({ "sku": "COKE" }), Utc::now());
//!
//! let decision = decide(&action, DeliveryOutcome::Failed);
//! assert_eq!(decision.status, ActionStatus::Pending);
//! assert_eq!(decision.retry_count, 1);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod retry;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use retry::{DeliveryOutcome, RetryDecision};
pub use status::QueueStatus;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Delivery attempts an action gets unless the producer asks otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Upper bound for a per-action retry budget.
pub const MAX_RETRY_BUDGET: u32 = 100;

/// Longest accepted action kind tag.
pub const MAX_ACTION_KIND_LEN: usize = 100;

/// Storage namespace used when the embedding app does not pick one.
pub const DEFAULT_NAMESPACE: &str = "offline-storage";
