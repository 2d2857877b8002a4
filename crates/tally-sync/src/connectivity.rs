//! # Connectivity Monitor
//!
//! Bridges an external connectivity source to the agent.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  OS / browser / health probe                                           │
//! │        │  watch::Sender<bool>  (true = online)                         │
//! │        ▼                                                                │
//! │  ConnectivityMonitor ──► SyncAgent::set_online_status(bool)            │
//! │                              │                                          │
//! │                              └── offline → online with pending actions │
//! │                                  starts a sync pass                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A watch channel only keeps the latest value, so a flapping link collapses
//! into the state it settled on.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::agent::SyncAgent;
use crate::error::{SyncError, SyncResult};

/// Forwards connectivity changes to a [`SyncAgent`].
pub struct ConnectivityMonitor {
    agent: SyncAgent,
    online_rx: watch::Receiver<bool>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping a running monitor.
pub struct ConnectivityHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ConnectivityHandle {
    /// Stops the monitor and waits for it to exit.
    pub async fn shutdown(self) -> SyncResult<()> {
        // The monitor may already have exited because the source went away.
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| SyncError::Internal(format!("connectivity monitor failed: {e}")))
    }
}

impl ConnectivityMonitor {
    /// Spawns a monitor that applies the source's current value right away
    /// and every change after it.
    pub fn spawn(agent: SyncAgent, online_rx: watch::Receiver<bool>) -> ConnectivityHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let monitor = ConnectivityMonitor {
            agent,
            online_rx,
            shutdown_rx,
        };
        let task = tokio::spawn(monitor.run());

        ConnectivityHandle { shutdown_tx, task }
    }

    async fn run(mut self) {
        info!("Connectivity monitor starting");

        let initial = *self.online_rx.borrow_and_update();
        self.agent.set_online_status(initial).await;

        loop {
            tokio::select! {
                changed = self.online_rx.changed() => {
                    if changed.is_err() {
                        debug!("Connectivity source closed");
                        break;
                    }
                    let online = *self.online_rx.borrow_and_update();
                    if self.agent.set_online_status(online).await {
                        debug!("Reconnect started a sync pass");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Connectivity monitor shutting down");
                    break;
                }
            }
        }

        info!("Connectivity monitor stopped");
    }
}
