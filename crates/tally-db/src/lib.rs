//! # tally-db: Durable Store for the Offline Queue
//!
//! SQLite storage for queue state, using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   tally-sync ──► DurableStore trait ──► SqliteStore ──► tally-db        │
//! │                                                          │              │
//! │                                                          ▼              │
//! │                                        offline_actions (one row/action) │
//! │                                        offline_sync_meta (one/namespace)│
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/offline.db")).await?;
//! let state = db.offline_storage().load("offline-storage").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::offline::OfflineStorageRepository;
