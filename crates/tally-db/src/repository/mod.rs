//! # Repository Module
//!
//! Database repositories for the offline store.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SqliteStore (tally-sync)                                              │
//! │       │                                                                 │
//! │       │  db.offline_storage().save("offline-storage", &state)          │
//! │       ▼                                                                 │
//! │  OfflineStorageRepository                                              │
//! │  ├── load(&self, namespace)                                            │
//! │  └── save(&self, namespace, state)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (offline_actions, offline_sync_meta)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`OfflineStorageRepository`](offline::OfflineStorageRepository) - Queue persistence

pub mod offline;
