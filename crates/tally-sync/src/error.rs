//! # Sync Error Types
//!
//! Error types for the offline queue and sync engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Storage      │  │     Queue               │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  DatabaseError  │  │  Core (validation,      │ │
//! │  │  ConfigLoad...  │  │  Serialization  │  │        requeue rules)   │ │
//! │  │  ConfigSave...  │  │                 │  │  DuplicateAction        │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────────────────────────────────┐  │
//! │  │   Lifecycle     │  │  TransportError (never escapes a pass)      │  │
//! │  │                 │  │                                             │  │
//! │  │  ShuttingDown   │  │  Rejected / Unreachable / Timeout           │  │
//! │  │  Internal       │  │  → recorded as "Failed to sync {kind}: …"   │  │
//! │  └─────────────────┘  └─────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use thiserror::Error;

use tally_core::{CoreError, ValidationError};

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors returned by the sync agent and its collaborators.
///
/// Per-action delivery failures are not in here: they are recorded on the
/// action and in the error list, never returned to the caller.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// The durable store could not be read or written.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Failed to serialize state.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Queue Errors
    // =========================================================================
    /// Rejected by queue rules or input validation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An action with this id is already queued.
    #[error("Action {0} is already queued")]
    DuplicateAction(String),

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// Agent is shutting down.
    #[error("Sync agent is shutting down")]
    ShuttingDown,

    /// Internal sync agent error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why one delivery attempt failed.
///
/// The `Display` output is the reason embedded in the pass error list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The backend received the action and refused it.
    #[error("{0}")]
    Rejected(String),

    /// The backend could not be reached.
    #[error("network unreachable: {0}")]
    Unreachable(String),

    /// The transport did not answer in time.
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for SyncError {
    fn from(err: ValidationError) -> Self {
        SyncError::Core(CoreError::Validation(err))
    }
}

impl From<tally_db::DbError> for SyncError {
    fn from(err: tally_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if repeating the same call may succeed.
    ///
    /// Storage hiccups (locked database, full pool) are worth retrying;
    /// bad input and bad configuration are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::DatabaseError(_))
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::DatabaseError("database is locked".into()).is_retryable());

        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::ShuttingDown.is_retryable());
        assert!(!SyncError::DuplicateAction("a-1".into()).is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::ConfigLoadFailed("missing".into()).is_config_error());
        assert!(!SyncError::DatabaseError("locked".into()).is_config_error());
    }

    #[test]
    fn test_validation_error_is_transparent() {
        let err: SyncError = ValidationError::Required {
            field: "kind".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Validation error: kind is required");
    }

    #[test]
    fn test_transport_error_reasons() {
        assert_eq!(TransportError::Rejected("HTTP 409".into()).to_string(), "HTTP 409");
        assert_eq!(
            TransportError::Timeout(Duration::from_secs(30)).to_string(),
            "timed out after 30s"
        );
    }
}
