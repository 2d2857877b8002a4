//! # Sync Agent
//!
//! Owns the offline queue and runs sync passes against the transport.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncAgent Architecture                           │
//! │                                                                         │
//! │  Producers (UI)            Connectivity source                         │
//! │  add_offline_action()      set_online_status()                         │
//! │        │                          │                                     │
//! │        ▼                          ▼                                     │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 Mutex<SyncState>  (single owner)                 │  │
//! │  │                                                                  │  │
//! │  │  ActionQueue · is_online · sync_in_progress · errors · last_sync │  │
//! │  │                                                                  │  │
//! │  │  every mutation: draft → DurableStore::save_state → commit       │  │
//! │  └──────────────────────────────┬───────────────────────────────────┘  │
//! │                                 │ claim (test-and-set under the lock) │
//! │                                 ▼                                       │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Sync pass (at most one)                                         │  │
//! │  │  for id in pending snapshot (FIFO):                              │  │
//! │  │     pending → syncing → Transport::apply (timeout) → decide()    │  │
//! │  │     completed → cleanup task after grace delay                   │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  STATUS EVENTS (SyncEventEmitter):                                     │
//! │  emit_status   - QueueStatus after every visible change                │
//! │  emit_progress - (processed, total) after each action of a pass        │
//! │  emit_error    - every line appended to the error list                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//! The state lock is never held across a transport call, so producers can
//! enqueue while a pass is waiting on the network. It is held across store
//! writes: a mutation is only visible in memory once it is durable.
//! Emitter callbacks run after the lock is released and may read the agent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use tally_core::retry::{self, DeliveryOutcome};
use tally_core::validation::{validate_action_kind, validate_max_retries};
use tally_core::{ActionStatus, CoreError, OfflineAction, PersistedState, QueueStatus};

use crate::clock::{Clock, IdGenerator, SystemClock, UuidGenerator};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::queue::ActionQueue;
use crate::store::{DurableStore, SqliteStore};
use crate::transport::{deliver, Transport};

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives sync events (implemented by the UI integration).
pub trait SyncEventEmitter: Send + Sync {
    /// Emits the current queue status.
    fn emit_status(&self, status: &QueueStatus);

    /// Emits pass progress: actions processed so far out of the snapshot.
    fn emit_progress(&self, processed: usize, total: usize);

    /// Emits an error line as it is recorded.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &QueueStatus) {}
    fn emit_progress(&self, _processed: usize, _total: usize) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Pass Outcome
// =============================================================================

/// Why a sync request did not start a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    AlreadyRunning,
    NothingPending,
    ShuttingDown,
}

/// What one pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Transport calls started.
    pub attempted: usize,
    pub delivered: usize,
    /// Failed but still within budget, back to pending.
    pub retried: usize,
    /// Failed and out of budget.
    pub failed: usize,
    /// Snapshot entries left unprocessed because of shutdown.
    pub cancelled: usize,
}

/// Result of asking for a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPassOutcome {
    Skipped(SkipReason),
    Completed(PassSummary),
}

impl SyncPassOutcome {
    pub fn summary(&self) -> Option<&PassSummary> {
        match self {
            SyncPassOutcome::Completed(summary) => Some(summary),
            SyncPassOutcome::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncPassOutcome::Skipped(_))
    }
}

enum ActionStep {
    /// Removed or changed by hand while the pass was running.
    Skipped,
    Delivered,
    Retried,
    Failed,
    Cancelled,
}

// =============================================================================
// Agent State
// =============================================================================

#[derive(Debug, Clone, Default)]
struct SyncState {
    queue: ActionQueue,
    is_online: bool,
    sync_in_progress: bool,
    last_sync_time: Option<DateTime<Utc>>,
    errors: Vec<String>,
}

impl SyncState {
    fn persisted(&self) -> PersistedState {
        PersistedState {
            actions: self.queue.to_vec(),
            last_sync_time: self.last_sync_time,
            errors: self.errors.clone(),
        }
    }

    fn status(&self) -> QueueStatus {
        QueueStatus::derive(
            self.queue.iter(),
            self.is_online,
            self.sync_in_progress,
            self.last_sync_time,
            &self.errors,
        )
    }
}

#[derive(Debug, Clone)]
struct AgentSettings {
    namespace: String,
    max_retries: u32,
    grace_delay: Duration,
    transport_timeout: Duration,
    sync_on_enqueue: bool,
}

impl From<&SyncConfig> for AgentSettings {
    fn from(config: &SyncConfig) -> Self {
        AgentSettings {
            namespace: config.namespace().to_string(),
            max_retries: config.queue.max_retries,
            grace_delay: config.grace_delay(),
            transport_timeout: config.transport_timeout(),
            sync_on_enqueue: config.sync.sync_on_enqueue,
        }
    }
}

struct AgentInner {
    settings: AgentSettings,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn DurableStore>,
    emitter: Arc<dyn SyncEventEmitter>,
    state: Mutex<SyncState>,
    /// True while no pass is running.
    idle_tx: watch::Sender<bool>,
    shutdown_tx: watch::Sender<bool>,
    /// Grace-delay removals keyed by action id.
    cleanups: StdMutex<HashMap<String, JoinHandle<()>>>,
}

// =============================================================================
// Sync Agent
// =============================================================================

/// The offline queue and its sync engine.
///
/// Cheap to clone; clones share one queue.
#[derive(Clone)]
pub struct SyncAgent {
    inner: Arc<AgentInner>,
}

impl SyncAgent {
    /// Builds an agent on the SQLite store named by the config.
    pub async fn open(config: SyncConfig, transport: Arc<dyn Transport>) -> SyncResult<Self> {
        let store = SqliteStore::open(&config).await?;
        SyncAgentBuilder::new(config)
            .with_transport(transport)
            .with_store(Arc::new(store))
            .build()
            .await
    }

    // =========================================================================
    // Producers
    // =========================================================================

    /// Enqueues an action with the configured retry budget.
    ///
    /// Returns the new action's id. If the agent is online and idle, a sync
    /// pass starts in the background.
    pub async fn add_offline_action(
        &self,
        kind: impl Into<String>,
        payload: serde_json::Value,
    ) -> SyncResult<String> {
        let max_retries = self.inner.settings.max_retries;
        self.add_offline_action_with_retries(kind, payload, max_retries)
            .await
    }

    /// Enqueues an action with its own retry budget.
    pub async fn add_offline_action_with_retries(
        &self,
        kind: impl Into<String>,
        payload: serde_json::Value,
        max_retries: u32,
    ) -> SyncResult<String> {
        let kind = kind.into();
        validate_action_kind(&kind)?;
        validate_max_retries(max_retries)?;

        if self.inner.is_shutting_down() {
            return Err(SyncError::ShuttingDown);
        }

        let action = OfflineAction::new(
            self.inner.ids.next_id(),
            kind,
            payload,
            self.inner.clock.now(),
        )
        .with_max_retries(max_retries);
        let id = action.id.clone();

        let (status, claim) = {
            let mut state = self.inner.state.lock().await;
            let kind = action.kind.clone();
            self.inner
                .transact(&mut state, |s| s.queue.push(action))
                .await?;

            debug!(action_id = %id, kind = %kind, max_retries, "Action enqueued");

            let claim = if self.inner.settings.sync_on_enqueue {
                self.inner.try_claim(&mut state).ok()
            } else {
                None
            };
            (state.status(), claim)
        };

        self.inner.emitter.emit_status(&status);
        if let Some(snapshot) = claim {
            self.spawn_pass(snapshot);
        }

        Ok(id)
    }

    /// Removes an action. Returns false if it was not queued.
    pub async fn remove_offline_action(&self, id: &str) -> SyncResult<bool> {
        let status = {
            let mut state = self.inner.state.lock().await;
            if !state.queue.contains(id) {
                return Ok(false);
            }
            self.inner
                .transact(&mut state, |s| {
                    s.queue.remove(id);
                    Ok(())
                })
                .await?;
            state.status()
        };

        self.inner.cancel_cleanup(id);
        debug!(action_id = %id, "Action removed");
        self.inner.emitter.emit_status(&status);
        Ok(true)
    }

    /// Sets an action's status by hand. Returns false if it was not queued.
    ///
    /// `Syncing` is reserved for the running pass. An action moved off
    /// `Syncing` mid-delivery keeps the new status and the delivery result
    /// is discarded.
    pub async fn set_action_status(&self, id: &str, status: ActionStatus) -> SyncResult<bool> {
        if status == ActionStatus::Syncing {
            return Err(CoreError::ReservedStatus { status }.into());
        }
        if self.inner.is_shutting_down() {
            return Err(SyncError::ShuttingDown);
        }

        let snapshot = {
            let mut state = self.inner.state.lock().await;
            if !state.queue.contains(id) {
                return Ok(false);
            }
            self.inner
                .transact(&mut state, |s| {
                    s.queue.set_status(id, status);
                    Ok(())
                })
                .await?;
            state.status()
        };

        if status == ActionStatus::Completed {
            self.inner.schedule_cleanup(id);
        } else {
            self.inner.cancel_cleanup(id);
        }

        info!(action_id = %id, %status, "Action status set manually");
        self.inner.emitter.emit_status(&snapshot);
        Ok(true)
    }

    /// Puts a failed action back in line as a fresh action.
    ///
    /// The failed entry is removed and a copy with a new id and a zero retry
    /// count is appended. Returns the new id, or `None` if `id` is unknown.
    pub async fn requeue_failed_action(&self, id: &str) -> SyncResult<Option<String>> {
        if self.inner.is_shutting_down() {
            return Err(SyncError::ShuttingDown);
        }

        let (new_id, status, claim) = {
            let mut state = self.inner.state.lock().await;
            let Some(failed) = state.queue.get(id) else {
                return Ok(None);
            };
            if failed.status != ActionStatus::Failed {
                return Err(CoreError::NotRequeueable {
                    id: id.to_string(),
                    status: failed.status,
                }
                .into());
            }

            let fresh = OfflineAction::new(
                self.inner.ids.next_id(),
                failed.kind.clone(),
                failed.payload.clone(),
                self.inner.clock.now(),
            )
            .with_max_retries(failed.max_retries);
            let new_id = fresh.id.clone();

            self.inner
                .transact(&mut state, |s| {
                    s.queue.remove(id);
                    s.queue.push(fresh)
                })
                .await?;

            let claim = if self.inner.settings.sync_on_enqueue {
                self.inner.try_claim(&mut state).ok()
            } else {
                None
            };
            (new_id, state.status(), claim)
        };

        info!(action_id = %id, new_id = %new_id, "Failed action requeued");
        self.inner.emitter.emit_status(&status);
        if let Some(snapshot) = claim {
            self.spawn_pass(snapshot);
        }

        Ok(Some(new_id))
    }

    // =========================================================================
    // Sync Control
    // =========================================================================

    /// Runs one sync pass now and waits for it to finish.
    ///
    /// Skipped when offline, when a pass is already running, or when nothing
    /// is pending. Dropping the returned future does not stop a pass that
    /// has started.
    pub async fn sync_pending_actions(&self) -> SyncResult<SyncPassOutcome> {
        let claim = {
            let mut state = self.inner.state.lock().await;
            self.inner.try_claim(&mut state)
        };

        let snapshot = match claim {
            Ok(snapshot) => snapshot,
            Err(reason) => {
                debug!(?reason, "Sync pass skipped");
                return Ok(SyncPassOutcome::Skipped(reason));
            }
        };

        let inner = Arc::clone(&self.inner);
        match tokio::spawn(inner.run_pass(snapshot)).await {
            Ok(result) => result.map(SyncPassOutcome::Completed),
            Err(e) => Err(SyncError::Internal(format!("sync pass task failed: {e}"))),
        }
    }

    /// Records a connectivity change.
    ///
    /// Going from offline to online starts a pass when something is pending
    /// and no pass is running. Returns true if a pass was started.
    pub async fn set_online_status(&self, online: bool) -> bool {
        let (changed, status, claim) = {
            let mut state = self.inner.state.lock().await;
            let was_online = state.is_online;
            state.is_online = online;

            let claim = if !was_online && online {
                self.inner.try_claim(&mut state).ok()
            } else {
                None
            };
            (was_online != online, state.status(), claim)
        };

        if changed {
            info!(online, "Connectivity changed");
            self.inner.emitter.emit_status(&status);
        }

        match claim {
            Some(snapshot) => {
                self.spawn_pass(snapshot);
                true
            }
            None => false,
        }
    }

    /// Empties the error list. Action statuses are untouched.
    pub async fn clear_sync_errors(&self) -> SyncResult<()> {
        let status = {
            let mut state = self.inner.state.lock().await;
            self.inner
                .transact(&mut state, |s| {
                    s.errors.clear();
                    Ok(())
                })
                .await?;
            state.status()
        };

        self.inner.emitter.emit_status(&status);
        Ok(())
    }

    /// Resolves once no pass is running.
    pub async fn wait_until_idle(&self) {
        let mut idle_rx = self.inner.idle_tx.subscribe();
        let _ = idle_rx.wait_for(|idle| *idle).await;
    }

    /// Stops the agent.
    ///
    /// A running pass stops at its current action and returns every
    /// unfinished action to `Pending`. Pending grace-delay removals are
    /// cancelled. Enqueues, requeues and manual status changes are refused
    /// afterwards.
    pub async fn shutdown(&self) {
        info!(namespace = %self.inner.settings.namespace, "Shutting down sync agent");
        self.inner.shutdown_tx.send_replace(true);
        self.wait_until_idle().await;

        let handles: Vec<JoinHandle<()>> = match self.inner.cleanups.lock() {
            Ok(mut cleanups) => cleanups.drain().map(|(_, handle)| handle).collect(),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            handle.abort();
        }

        info!("Sync agent stopped");
    }

    // =========================================================================
    // Status Facade
    // =========================================================================

    /// Returns the current queue status.
    pub async fn status(&self) -> QueueStatus {
        self.inner.state.lock().await.status()
    }

    pub async fn is_online(&self) -> bool {
        self.inner.state.lock().await.is_online
    }

    pub async fn sync_in_progress(&self) -> bool {
        self.inner.state.lock().await.sync_in_progress
    }

    pub async fn errors(&self) -> Vec<String> {
        self.inner.state.lock().await.errors.clone()
    }

    pub async fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().await.last_sync_time
    }

    /// Copies of the queued actions in enqueue order.
    pub async fn actions(&self, filter: Option<ActionStatus>) -> Vec<OfflineAction> {
        self.inner.state.lock().await.queue.list(filter)
    }

    pub async fn get_action(&self, id: &str) -> Option<OfflineAction> {
        self.inner.state.lock().await.queue.get(id).cloned()
    }

    fn spawn_pass(&self, snapshot: Vec<String>) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(e) = inner.run_pass(snapshot).await {
                warn!(error = %e, "Background sync pass aborted");
            }
        });
    }
}

// =============================================================================
// Pass Execution
// =============================================================================

impl AgentInner {
    fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Applies `f` to a copy of the state, saves the copy, then commits it.
    ///
    /// If `f` or the save fails, the live state is left as it was.
    async fn transact<R>(
        &self,
        state: &mut SyncState,
        f: impl FnOnce(&mut SyncState) -> SyncResult<R>,
    ) -> SyncResult<R> {
        let mut draft = state.clone();
        let result = f(&mut draft)?;
        self.store.save_state(&draft.persisted()).await?;
        *state = draft;
        Ok(result)
    }

    /// Claims the single pass slot and snapshots the pending ids.
    ///
    /// Must be called with the state lock held: the test and the set happen
    /// in one critical section.
    fn try_claim(&self, state: &mut SyncState) -> Result<Vec<String>, SkipReason> {
        if self.is_shutting_down() {
            return Err(SkipReason::ShuttingDown);
        }
        if !state.is_online {
            return Err(SkipReason::Offline);
        }
        if state.sync_in_progress {
            return Err(SkipReason::AlreadyRunning);
        }

        let snapshot = state.queue.pending_ids();
        if snapshot.is_empty() {
            return Err(SkipReason::NothingPending);
        }

        state.sync_in_progress = true;
        state.errors.clear();
        self.idle_tx.send_replace(false);
        Ok(snapshot)
    }

    async fn run_pass(self: Arc<Self>, snapshot: Vec<String>) -> SyncResult<PassSummary> {
        let total = snapshot.len();
        info!(pending = total, namespace = %self.settings.namespace, "Starting sync pass");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut summary = PassSummary::default();
        let mut aborted = None;

        for (index, id) in snapshot.iter().enumerate() {
            if *shutdown_rx.borrow() {
                summary.cancelled = total - index;
                break;
            }

            match self.process_action(id, &mut shutdown_rx, &mut summary).await {
                Ok(ActionStep::Cancelled) => {
                    summary.cancelled = total - index;
                    break;
                }
                Ok(ActionStep::Delivered) => summary.delivered += 1,
                Ok(ActionStep::Retried) => summary.retried += 1,
                Ok(ActionStep::Failed) => summary.failed += 1,
                Ok(ActionStep::Skipped) => {}
                Err(e) => {
                    aborted = Some(e);
                    break;
                }
            }

            self.emitter.emit_progress(index + 1, total);
        }

        let completed = aborted.is_none() && summary.cancelled == 0;
        self.finish_pass(completed).await;

        match aborted {
            Some(e) => Err(e),
            None => {
                info!(
                    delivered = summary.delivered,
                    retried = summary.retried,
                    failed = summary.failed,
                    cancelled = summary.cancelled,
                    "Sync pass finished"
                );
                Ok(summary)
            }
        }
    }

    async fn process_action(
        self: &Arc<Self>,
        id: &str,
        shutdown_rx: &mut watch::Receiver<bool>,
        summary: &mut PassSummary,
    ) -> SyncResult<ActionStep> {
        // Mark syncing.
        let (kind, payload, status) = {
            let mut state = self.state.lock().await;
            let Some(action) = state.queue.get(id).filter(|a| a.is_pending()) else {
                return Ok(ActionStep::Skipped);
            };
            let (kind, payload) = (action.kind.clone(), action.payload.clone());

            let marked = self
                .transact(&mut state, |s| {
                    s.queue.set_status(id, ActionStatus::Syncing);
                    Ok(())
                })
                .await;
            if let Err(e) = marked {
                return Err(self.record_persist_failure(state, e));
            }
            (kind, payload, state.status())
        };
        self.emitter.emit_status(&status);

        summary.attempted += 1;
        debug!(action_id = %id, kind = %kind, "Delivering action");

        let delivery = tokio::select! {
            result = deliver(
                self.transport.as_ref(),
                &kind,
                &payload,
                self.settings.transport_timeout,
            ) => result,
            _ = shutdown_requested(shutdown_rx) => {
                debug!(action_id = %id, "Delivery abandoned for shutdown");
                return Ok(ActionStep::Cancelled);
            }
        };

        // Apply the retry policy.
        let (step, error_line, retryable, status) = {
            let mut state = self.state.lock().await;
            let Some(action) = state
                .queue
                .get(id)
                .filter(|a| a.status == ActionStatus::Syncing)
            else {
                debug!(action_id = %id, "Action changed during delivery, result dropped");
                return Ok(ActionStep::Skipped);
            };

            let outcome = match delivery {
                Ok(()) => DeliveryOutcome::Delivered,
                Err(_) => DeliveryOutcome::Failed,
            };
            let decision = retry::decide(action, outcome);
            let error_line = delivery
                .err()
                .map(|reason| format!("Failed to sync {kind}: {reason}"));

            let line = error_line.clone();
            let applied = self
                .transact(&mut state, |s| {
                    if let Some(action) = s.queue.get_mut(id) {
                        decision.apply_to(action);
                    }
                    if let Some(line) = line {
                        s.errors.push(line);
                    }
                    Ok(())
                })
                .await;
            if let Err(e) = applied {
                return Err(self.record_persist_failure(state, e));
            }

            let step = match decision.status {
                ActionStatus::Completed => {
                    info!(action_id = %id, kind = %kind, "Action synced");
                    ActionStep::Delivered
                }
                ActionStatus::Pending => {
                    warn!(
                        action_id = %id,
                        kind = %kind,
                        retry_count = decision.retry_count,
                        "Delivery failed, will retry"
                    );
                    ActionStep::Retried
                }
                _ => {
                    error!(
                        action_id = %id,
                        kind = %kind,
                        retry_count = decision.retry_count,
                        "Delivery failed, retries exhausted"
                    );
                    ActionStep::Failed
                }
            };
            let retryable = decision.status == ActionStatus::Pending;
            (step, error_line, retryable, state.status())
        };

        if let ActionStep::Delivered = step {
            self.schedule_cleanup(id);
        }
        if let Some(line) = error_line {
            self.emitter.emit_error(&line, retryable);
        }
        self.emitter.emit_status(&status);

        Ok(step)
    }

    /// Records a failed store write and returns the error for the caller.
    ///
    /// Takes the guard so the lock is released before the emitter runs.
    fn record_persist_failure(
        &self,
        mut state: tokio::sync::MutexGuard<'_, SyncState>,
        err: SyncError,
    ) -> SyncError {
        let message = format!("Failed to persist offline queue: {err}");
        error!(error = %err, "Sync pass aborted");
        state.errors.push(message.clone());
        drop(state);

        self.emitter.emit_error(&message, err.is_retryable());
        err
    }

    async fn finish_pass(&self, completed: bool) {
        let status = {
            let mut state = self.state.lock().await;

            let reset = state.queue.reset_syncing();
            if reset > 0 {
                debug!(reset, "Returned unfinished actions to pending");
            }
            state.sync_in_progress = false;
            if completed {
                state.last_sync_time = Some(self.clock.now());
            }

            if let Err(e) = self.store.save_state(&state.persisted()).await {
                warn!(error = %e, "Failed to persist sync pass result");
            }
            state.status()
        };

        self.idle_tx.send_replace(true);
        self.emitter.emit_status(&status);
    }

    // =========================================================================
    // Grace-Delay Cleanup
    // =========================================================================

    fn schedule_cleanup(self: &Arc<Self>, id: &str) {
        let weak: Weak<AgentInner> = Arc::downgrade(self);
        let grace = self.settings.grace_delay;
        let action_id = id.to_string();

        if let Ok(mut cleanups) = self.cleanups.lock() {
            let handle = tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                if let Some(inner) = weak.upgrade() {
                    inner.remove_completed(&action_id).await;
                }
            });
            if let Some(previous) = cleanups.insert(id.to_string(), handle) {
                previous.abort();
            }
        }
    }

    fn take_cleanup(&self, id: &str) -> Option<JoinHandle<()>> {
        match self.cleanups.lock() {
            Ok(mut cleanups) => cleanups.remove(id),
            Err(_) => None,
        }
    }

    fn cancel_cleanup(&self, id: &str) {
        if let Some(handle) = self.take_cleanup(id) {
            handle.abort();
        }
    }

    async fn remove_completed(&self, id: &str) {
        let status = {
            let mut state = self.state.lock().await;
            // Runs inside the task being forgotten, so no abort.
            let _ = self.take_cleanup(id);

            let still_completed = state
                .queue
                .get(id)
                .is_some_and(|a| a.status == ActionStatus::Completed);
            if !still_completed {
                return;
            }

            let removed = self
                .transact(&mut state, |s| {
                    s.queue.remove(id);
                    Ok(())
                })
                .await;
            if let Err(e) = removed {
                warn!(action_id = %id, error = %e, "Failed to remove completed action");
                return;
            }
            state.status()
        };

        debug!(action_id = %id, "Completed action removed after grace delay");
        self.emitter.emit_status(&status);
    }
}

/// Resolves once shutdown has been requested.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        let stop = *rx.borrow_and_update();
        if stop {
            return;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating a SyncAgent with injected collaborators.
pub struct SyncAgentBuilder {
    config: SyncConfig,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn DurableStore>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    emitter: Option<Arc<dyn SyncEventEmitter>>,
}

impl SyncAgentBuilder {
    /// Creates a new builder with the given config.
    pub fn new(config: SyncConfig) -> Self {
        SyncAgentBuilder {
            config,
            transport: None,
            store: None,
            clock: None,
            ids: None,
            emitter: None,
        }
    }

    /// Sets the transport (required).
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the durable store (required).
    pub fn with_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Sets the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Restores saved state and builds the agent.
    ///
    /// Actions left `Syncing` by a previous process go back to `Pending`,
    /// and `Completed` ones are dropped. If the config starts online and
    /// something is pending, the first pass starts right away.
    pub async fn build(self) -> SyncResult<SyncAgent> {
        self.config.validate()?;

        let transport = self
            .transport
            .ok_or_else(|| SyncError::InvalidConfig("Transport required".into()))?;
        let store = self
            .store
            .ok_or_else(|| SyncError::InvalidConfig("Durable store required".into()))?;

        let mut persisted = store.load_state().await?;
        let repaired = persisted.recover();
        if repaired > 0 {
            info!(repaired, "Recovered actions from an interrupted session");
            store.save_state(&persisted).await?;
        }

        let state = SyncState {
            queue: ActionQueue::from_actions(persisted.actions),
            is_online: self.config.sync.start_online,
            sync_in_progress: false,
            last_sync_time: persisted.last_sync_time,
            errors: persisted.errors,
        };
        info!(
            namespace = %self.config.namespace(),
            queued = state.queue.len(),
            online = state.is_online,
            "Sync agent ready"
        );

        let (idle_tx, _) = watch::channel(true);
        let (shutdown_tx, _) = watch::channel(false);

        let agent = SyncAgent {
            inner: Arc::new(AgentInner {
                settings: AgentSettings::from(&self.config),
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                ids: self.ids.unwrap_or_else(|| Arc::new(UuidGenerator)),
                transport,
                store,
                emitter: self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter)),
                state: Mutex::new(state),
                idle_tx,
                shutdown_tx,
                cleanups: StdMutex::new(HashMap::new()),
            }),
        };

        let claim = {
            let mut state = agent.inner.state.lock().await;
            agent.inner.try_claim(&mut state).ok()
        };
        if let Some(snapshot) = claim {
            agent.spawn_pass(snapshot);
        }

        Ok(agent)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
