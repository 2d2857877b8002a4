//! # tally-sync: Offline Queue & Sync Engine
//!
//! Records mutations made while offline, persists them, and delivers them
//! through an injected transport once connectivity returns.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Agent Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      SyncAgent (owns all queue state)            │  │
//! │  │                                                                  │  │
//! │  │  add / remove / requeue      sync_pending_actions               │  │
//! │  │  set_online_status           status() and readers               │  │
//! │  └────────────┬──────────────────────┬─────────────────┬────────────┘  │
//! │               │                      │                 │               │
//! │               ▼                      ▼                 ▼               │
//! │  ┌────────────────────┐  ┌────────────────────┐  ┌──────────────────┐  │
//! │  │  DurableStore      │  │  Transport         │  │  Clock / Ids     │  │
//! │  │                    │  │                    │  │                  │  │
//! │  │  SqliteStore       │  │  supplied by the   │  │  SystemClock     │  │
//! │  │  MemoryStore       │  │  embedding app     │  │  UuidGenerator   │  │
//! │  └────────────────────┘  └────────────────────┘  └──────────────────┘  │
//! │                                                                         │
//! │  ConnectivityMonitor: watch::Receiver<bool> → set_online_status()      │
//! │                                                                         │
//! │  STATUS EVENTS (SyncEventEmitter):                                     │
//! │  • status   - QueueStatus after each change                            │
//! │  • progress - processed / total within a pass                          │
//! │  • error    - every recorded error line                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - `SyncAgent`, its builder, and the sync pass
//! - [`queue`] - FIFO action queue
//! - [`transport`] - Transport trait and timeout wrapper
//! - [`store`] - Durable store trait with SQLite and memory backends
//! - [`clock`] - Clock and id generator seams
//! - [`connectivity`] - Connectivity source bridge
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tally_sync::{SyncAgent, SyncConfig};
//!
//! let config = SyncConfig::load_or_default(None);
//! let agent = SyncAgent::open(config, Arc::new(HttpTransport::new(api))).await?;
//!
//! let id = agent
//!     .add_offline_action("product.update", serde_json::json!({ "sku": "COKE", "stock": 4 }))
//!     .await?;
//!
//! agent.set_online_status(true).await;
//! let status = agent.status().await;
//! println!("pending: {}, failed: {}", status.pending_count, status.failed_count);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod queue;
pub mod store;
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{
    NoOpEmitter, PassSummary, SkipReason, SyncAgent, SyncAgentBuilder, SyncEventEmitter,
    SyncPassOutcome,
};
pub use clock::{Clock, IdGenerator, ManualClock, SequentialIds, SystemClock, UuidGenerator};
pub use config::{QueueSettings, StorageSettings, SyncConfig, SyncSettings};
pub use connectivity::{ConnectivityHandle, ConnectivityMonitor};
pub use error::{SyncError, SyncResult, TransportError};
pub use queue::ActionQueue;
pub use store::{DurableStore, MemoryStore, SqliteStore};
pub use transport::Transport;

pub use tally_core::{ActionStatus, OfflineAction, QueueStatus};
