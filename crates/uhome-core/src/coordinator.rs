// ── Update coordinator ──
//
// Owns the poll loop over the U-home API. Setup performs exactly one
// discovery; every later tick queries state for the already-discovered
// id set -- discovery never re-runs on its own. Lock/unlock commands run
// the optimistic protocol: issue, assume the target state, wait out the
// vendor's deferred-response window, then request a reconciling poll.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use uhome_api::UhomeClient;

use crate::config::CoordinatorConfig;
use crate::convert;
use crate::error::CoreError;
use crate::model::{Device, DeviceId, LockState};
use crate::store::DeviceStore;

// ── Observable state ─────────────────────────────────────────────────

/// Poll-loop state observable by consumers.
///
/// `Uninitialized` is left exactly once, on the first successful
/// discovery; afterwards the state alternates between `Ready` and
/// `Degraded` per tick and never resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Uninitialized,
    Ready,
    /// The last poll failed. The last-known device list is retained.
    Degraded,
}

/// Which command to issue against a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockCommand {
    Lock,
    Unlock,
}

impl LockCommand {
    pub fn target_state(self) -> LockState {
        match self {
            Self::Lock => LockState::Locked,
            Self::Unlock => LockState::Unlocked,
        }
    }
}

/// Lifecycle phase of one lock/unlock command, for logs and
/// cancellation reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandPhase {
    Issued,
    Assumed,
    Reconciled,
}

// ── Coordinator ──────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc`. Manages the poll lifecycle: one-time
/// discovery, the periodic state query task, manual refresh requests,
/// and the optimistic command protocol.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    client: UhomeClient,
    store: Arc<DeviceStore>,
    config: CoordinatorConfig,
    poll_state: watch::Sender<PollState>,
    refresh_notify: Notify,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    /// Create a coordinator. Does NOT touch the network -- call
    /// [`start()`](Self::start) to discover devices and begin polling.
    pub fn new(client: UhomeClient, config: CoordinatorConfig) -> Self {
        let (poll_state, _) = watch::channel(PollState::Uninitialized);

        Self {
            inner: Arc::new(CoordinatorInner {
                client,
                store: Arc::new(DeviceStore::new()),
                config,
                poll_state,
                refresh_notify: Notify::new(),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    /// The device store backing this coordinator.
    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.inner.store
    }

    /// Current snapshot of the device list, in discovery order.
    pub fn devices(&self) -> Arc<Vec<Device>> {
        self.inner.store.snapshot()
    }

    /// Subscribe to poll-state changes.
    pub fn poll_state(&self) -> watch::Receiver<PollState> {
        self.inner.poll_state.subscribe()
    }

    pub fn current_state(&self) -> PollState {
        *self.inner.poll_state.borrow()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Discover devices, run the first state refresh, and spawn the
    /// poll task.
    ///
    /// Discovery failure leaves the coordinator `Uninitialized` and is
    /// returned to the caller. The first refresh is an ordinary tick:
    /// its failure marks the coordinator `Degraded` without failing
    /// startup.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut task = self.inner.task.lock().await;
        if task.is_some() {
            return Err(CoreError::Internal("coordinator already started".into()));
        }

        let records = self.inner.client.discover().await?;
        let devices = convert::devices_from_discovery(&records)?;
        info!(count = devices.len(), "device discovery complete");
        self.inner.store.replace_all(devices);

        let _ = self.inner.poll_state.send(PollState::Ready);

        // First data refresh, as an ordinary tick.
        self.tick().await;

        let coordinator = self.clone();
        *task = Some(tokio::spawn(poll_task(coordinator)));

        Ok(())
    }

    /// Cancel the poll task and wait for it to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.task.lock().await.take() {
            let _ = handle.await;
        }
        debug!("coordinator shut down");
    }

    /// Re-run discovery explicitly, replacing the device set.
    ///
    /// Never triggered automatically; exposed for consumers that know
    /// the account's device list changed.
    pub async fn rediscover(&self) -> Result<(), CoreError> {
        let records = self.inner.client.discover().await?;
        let devices = convert::devices_from_discovery(&records)?;
        info!(count = devices.len(), "re-discovery complete");
        self.inner.store.replace_all(devices);
        self.tick().await;
        Ok(())
    }

    /// Ask the poll task for an out-of-band refresh. Returns
    /// immediately; the refresh runs on the poll task.
    pub fn request_refresh(&self) {
        self.inner.refresh_notify.notify_one();
    }

    /// Run one state refresh on the caller's task, with the usual
    /// Ready/Degraded transition.
    pub async fn refresh_now(&self) -> PollState {
        self.tick().await;
        self.current_state()
    }

    // ── Poll internals ───────────────────────────────────────────────

    async fn tick(&self) {
        match self.refresh_once().await {
            Ok(()) => {
                let _ = self.inner.poll_state.send(PollState::Ready);
            }
            Err(e) => {
                warn!(error = %e, "poll failed, keeping last-known device states");
                let _ = self.inner.poll_state.send(PollState::Degraded);
            }
        }
    }

    async fn refresh_once(&self) -> Result<(), CoreError> {
        let ids: Vec<String> = self
            .inner
            .store
            .ids()
            .iter()
            .map(|id| id.as_str().to_owned())
            .collect();

        let records = self.inner.client.query(&ids).await?;
        let outcome = self.inner.store.apply_query_response(&records);
        debug!(
            updated = outcome.updated,
            missing = outcome.missing,
            "state refresh applied"
        );
        Ok(())
    }

    // ── Optimistic command protocol ──────────────────────────────────

    /// Lock a device. See [`command`](Self::command).
    pub async fn lock(&self, id: &DeviceId) -> Result<Duration, CoreError> {
        self.command(id, LockCommand::Lock).await
    }

    /// Unlock a device. See [`command`](Self::command).
    pub async fn unlock(&self, id: &DeviceId) -> Result<Duration, CoreError> {
        self.command(id, LockCommand::Unlock).await
    }

    /// Issue a lock/unlock command and drive its full lifecycle:
    ///
    /// 1. issue the vendor command, obtaining the deferred-response
    ///    duration (a response without one fails here, before any local
    ///    state is touched);
    /// 2. set the commanded state locally with the assumed-state flag,
    ///    notifying observers synchronously;
    /// 3. wait out the deferred-response window;
    /// 4. request a reconciling refresh from the poll task.
    ///
    /// The call returns only after the wait and the refresh request.
    /// Cancellation during the wait leaves the device flagged
    /// (`assumed_state` stays true) and returns [`CoreError::Cancelled`].
    ///
    /// There is no per-device mutual exclusion: a poll that lands during
    /// the deferred wait interleaves with the command's mutations, and
    /// the last write wins.
    pub async fn command(&self, id: &DeviceId, cmd: LockCommand) -> Result<Duration, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::NotRunning);
        }

        // Validate the target before going to the network.
        let device = self
            .inner
            .store
            .get(id)
            .ok_or_else(|| CoreError::DeviceNotFound { id: id.clone() })?;
        if !device.is_smart_lock() {
            return Err(CoreError::SubtypeMismatch {
                id: id.clone(),
                expected: crate::model::CATEGORY_SMART_LOCK.to_owned(),
                got: device.category,
            });
        }

        let mut phase = CommandPhase::Issued;
        debug!(id = %id, ?cmd, ?phase, "issuing command");

        let deferred = match cmd {
            LockCommand::Lock => self.inner.client.lock_device(id.as_str()).await?,
            LockCommand::Unlock => self.inner.client.unlock_device(id.as_str()).await?,
        };

        self.inner
            .store
            .set_optimistic_lock_state(id, cmd.target_state())?;
        phase = CommandPhase::Assumed;
        info!(
            id = %id,
            ?cmd,
            deferred_secs = deferred.as_secs_f64(),
            "command accepted, holding assumed state"
        );

        tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => {
                warn!(
                    id = %id,
                    ?phase,
                    "cancelled during deferred wait, device left with assumed state set"
                );
                return Err(CoreError::Cancelled { id: id.clone() });
            }
            () = tokio::time::sleep(deferred) => {}
        }

        self.request_refresh();
        phase = CommandPhase::Reconciled;
        debug!(id = %id, ?phase, "reconciling refresh requested");

        Ok(deferred)
    }
}

// ── Background poll task ─────────────────────────────────────────────

/// Poll device states on the configured interval, and on demand when a
/// refresh is requested.
async fn poll_task(coordinator: Coordinator) {
    let mut interval = tokio::time::interval(coordinator.inner.config.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = coordinator.inner.cancel.cancelled() => break,
            () = coordinator.inner.refresh_notify.notified() => {
                coordinator.tick().await;
            }
            _ = interval.tick() => {
                coordinator.tick().await;
            }
        }
    }
}
