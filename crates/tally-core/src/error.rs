//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Queue rule violations                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - Durable store failures                         │
//! │                                                                         │
//! │  tally-sync errors (separate crate)                                    │
//! │  ├── SyncError        - What callers of the agent see                  │
//! │  └── TransportError   - Per-action delivery failures                   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → caller                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::ActionStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Queue rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Only failed actions can be requeued.
    ///
    /// ## When This Occurs
    /// - The UI offers "retry" on an action that already recovered
    /// - Two dismiss/retry clicks race each other
    #[error("Action {id} is {status}, only failed actions can be requeued")]
    NotRequeueable { id: String, status: ActionStatus },

    /// `Syncing` belongs to the active pass and cannot be set by hand.
    #[error("Status {status} is managed by the sync engine")]
    ReservedStatus { status: ActionStatus },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before an action enters the queue so that nothing malformed is
/// ever persisted.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid UUID, control characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
