//! # Validation Module
//!
//! Input checks applied before an action enters the queue.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Producer (UI form, import job)                               │
//! │  └── Builds kind + payload                                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: SyncAgent::add_offline_action                                │
//! │  └── THIS MODULE: kind, retry budget                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Durable store (SQLite)                                       │
//! │  ├── NOT NULL constraints                                              │
//! │  └── PRIMARY KEY (namespace, id)                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_action_kind, validate_max_retries};
//!
//! validate_action_kind("product.update").unwrap();
//! validate_max_retries(3).unwrap();
//! ```

use crate::error::ValidationError;
use crate::{MAX_ACTION_KIND_LEN, MAX_RETRY_BUDGET};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates an action kind tag.
///
/// ## Rules
/// - Must not be empty or whitespace
/// - At most 100 characters
/// - No control characters (kinds end up in log lines and error strings)
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_action_kind;
///
/// assert!(validate_action_kind("transaction.create").is_ok());
/// assert!(validate_action_kind("").is_err());
/// ```
pub fn validate_action_kind(kind: &str) -> ValidationResult<()> {
    if kind.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "kind".to_string(),
        });
    }

    if kind.len() > MAX_ACTION_KIND_LEN {
        return Err(ValidationError::TooLong {
            field: "kind".to_string(),
            max: MAX_ACTION_KIND_LEN,
        });
    }

    if kind.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: "kind".to_string(),
            reason: "must not contain control characters".to_string(),
        });
    }

    Ok(())
}

/// Validates a per-action retry budget.
///
/// ## Rules
/// - Between 1 and [`MAX_RETRY_BUDGET`]
pub fn validate_max_retries(max_retries: u32) -> ValidationResult<()> {
    if max_retries == 0 || max_retries > MAX_RETRY_BUDGET {
        return Err(ValidationError::OutOfRange {
            field: "max_retries".to_string(),
            min: 1,
            max: MAX_RETRY_BUDGET as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_action_kind() {
        assert!(validate_action_kind("product.update").is_ok());
        assert!(validate_action_kind("transaction.create").is_ok());

        assert!(validate_action_kind("").is_err());
        assert!(validate_action_kind("   ").is_err());
        assert!(validate_action_kind("bad\nkind").is_err());
        assert!(validate_action_kind(&"k".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_max_retries() {
        assert!(validate_max_retries(1).is_ok());
        assert!(validate_max_retries(3).is_ok());
        assert!(validate_max_retries(MAX_RETRY_BUDGET).is_ok());

        assert!(validate_max_retries(0).is_err());
        assert!(validate_max_retries(MAX_RETRY_BUDGET + 1).is_err());
    }
}
