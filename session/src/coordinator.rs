//! Audio session coordinator.
//!
//! The coordinator owns the canonical [`AudioMode`]. Every change is executed
//! by a single worker task; callers submit requests into a one-slot pending
//! box. A request that arrives while a transition is running replaces the
//! pending mode instead of queuing behind it, so rapid request storms settle
//! on the most recent mode.

use crate::{AudioError, AudioMode, AudioPlatform, CoordinatorConfig};
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Notify, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of a mode request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeAck {
    /// Mode the caller asked for.
    pub requested: AudioMode,
    /// Mode the worker actually applied for this request.
    pub applied: AudioMode,
    /// False when the session was already in `applied` and stable.
    pub changed: bool,
    /// True when a later request replaced this one before it ran.
    pub coalesced: bool,
}

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub mode: AudioMode,
    pub stable: bool,
    /// A failed transition is waiting for recovery.
    pub recovering: bool,
    /// Recovery attempts were exhausted.
    pub recovery_failed: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            mode: AudioMode::Inactive,
            stable: true,
            recovering: false,
            recovery_failed: false,
        }
    }
}

type Reply = oneshot::Sender<Result<ModeAck, AudioError>>;

struct Waiter {
    requested: AudioMode,
    reply: Reply,
}

struct Pending {
    mode: AudioMode,
    force: bool,
    waiters: Vec<Waiter>,
}

struct Recovery {
    deadline: Instant,
    attempts: u32,
}

struct Shared {
    config: CoordinatorConfig,
    platform: Arc<dyn AudioPlatform>,
    pending: Mutex<Option<Pending>>,
    wake: Notify,
    state: watch::Sender<SessionSnapshot>,
    vehicle_route: AtomicBool,
    transitions: AtomicU64,
    cancel: CancellationToken,
}

/// Serializes every hardware audio mode change through one worker.
///
/// Cloning is cheap; all clones share the same worker.
#[derive(Clone)]
pub struct AudioSessionCoordinator {
    shared: Arc<Shared>,
}

impl AudioSessionCoordinator {
    /// Creates a coordinator and spawns its worker on the current runtime.
    pub fn new(platform: Arc<dyn AudioPlatform>, config: CoordinatorConfig) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        let shared = Arc::new(Shared {
            config,
            platform,
            pending: Mutex::new(None),
            wake: Notify::new(),
            state,
            vehicle_route: AtomicBool::new(false),
            transitions: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        });
        tokio::spawn(run(shared.clone()));
        Self { shared }
    }

    /// Requests a mode change and waits for the worker to answer.
    ///
    /// If a newer request replaces this one before it runs, the answer
    /// reflects the newer mode with `coalesced = true`.
    pub async fn request_mode(&self, mode: AudioMode) -> Result<ModeAck, AudioError> {
        self.submit(mode, false).await
    }

    /// Re-applies the current mode even if it is unchanged.
    pub async fn reassert_mode(&self) -> Result<ModeAck, AudioError> {
        let mode = self.current_mode();
        self.submit(mode, true).await
    }

    async fn submit(&self, mode: AudioMode, force: bool) -> Result<ModeAck, AudioError> {
        if mode == AudioMode::VehicleAudio && !self.vehicle_route_connected() {
            return Err(AudioError::RouteUnavailable);
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.shared.pending.lock();
            if self.shared.cancel.is_cancelled() {
                return Err(AudioError::Closed);
            }
            let waiter = Waiter {
                requested: mode,
                reply: tx,
            };
            match pending.as_mut() {
                Some(p) => {
                    if p.mode != mode {
                        debug!(replaced = %p.mode, mode = %mode, "session: coalescing pending request");
                    }
                    p.mode = mode;
                    p.force |= force;
                    p.waiters.push(waiter);
                }
                None => {
                    *pending = Some(Pending {
                        mode,
                        force,
                        waiters: vec![waiter],
                    });
                }
            }
        }
        self.shared.wake.notify_one();

        rx.await.unwrap_or(Err(AudioError::Closed))
    }

    /// Returns the current mode.
    pub fn current_mode(&self) -> AudioMode {
        self.shared.state.borrow().mode
    }

    /// Returns true if no transition is running and the last one succeeded.
    pub fn is_stable(&self) -> bool {
        self.shared.state.borrow().stable
    }

    /// Returns a copy of the current session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        *self.shared.state.borrow()
    }

    /// Subscribes to session state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.state.subscribe()
    }

    /// Records whether a vehicle audio route is connected.
    pub fn set_vehicle_route(&self, connected: bool) {
        self.shared.vehicle_route.store(connected, Ordering::SeqCst);
    }

    /// Returns true if a vehicle audio route is connected.
    pub fn vehicle_route_connected(&self) -> bool {
        self.shared.vehicle_route.load(Ordering::SeqCst)
    }

    /// Returns the number of transitions the worker has applied.
    pub fn transitions_applied(&self) -> u64 {
        self.shared.transitions.load(Ordering::SeqCst)
    }

    /// Stops the worker. Pending and later requests fail with `Closed`.
    pub fn close(&self) {
        self.shared.cancel.cancel();
    }

    /// Returns true if the coordinator has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

async fn run(shared: Arc<Shared>) {
    let mut recovery: Option<Recovery> = None;

    loop {
        if shared.cancel.is_cancelled() {
            break;
        }

        let next = shared.pending.lock().take();
        if let Some(pending) = next {
            let outcome = shared.transition(pending.mode, pending.force).await;
            match &outcome {
                Ok(_) => recovery = None,
                Err(e) if e.needs_recovery() => {
                    let attempts = recovery.as_ref().map(|r| r.attempts).unwrap_or(0);
                    recovery = Some(Recovery {
                        deadline: Instant::now() + shared.config.recovery_backoff(),
                        attempts,
                    });
                }
                Err(_) => {}
            }
            reply_all(pending, outcome);
            continue;
        }

        let deadline = recovery.as_ref().map(|r| r.deadline);
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = shared.wake.notified() => {}
            _ = sleep_until(deadline) => {
                if let Some(r) = recovery.take() {
                    recovery = shared.recover(r).await;
                }
            }
        }
    }

    let pending = shared.pending.lock().take();
    if let Some(pending) = pending {
        for w in pending.waiters {
            let _ = w.reply.send(Err(AudioError::Closed));
        }
    }
    debug!("session: worker stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

fn reply_all(pending: Pending, outcome: Result<bool, AudioError>) {
    let applied = pending.mode;
    let last = pending.waiters.len().saturating_sub(1);
    for (i, w) in pending.waiters.into_iter().enumerate() {
        let result = outcome.clone().map(|changed| ModeAck {
            requested: w.requested,
            applied,
            changed,
            coalesced: i != last,
        });
        let _ = w.reply.send(result);
    }
}

impl Shared {
    async fn transition(&self, target: AudioMode, force: bool) -> Result<bool, AudioError> {
        let current = *self.state.borrow();
        if current.mode == target && current.stable && !force {
            debug!(mode = %target, "session: mode unchanged");
            return Ok(false);
        }

        self.state.send_modify(|s| s.stable = false);

        match self.apply(current.mode, target).await {
            Ok(()) => {
                self.transitions.fetch_add(1, Ordering::SeqCst);
                self.state.send_modify(|s| {
                    s.mode = target;
                    s.stable = true;
                    s.recovering = false;
                    s.recovery_failed = false;
                });
                info!(from = %current.mode, to = %target, "session: mode applied");
                Ok(true)
            }
            Err(e) => {
                warn!(from = %current.mode, to = %target, error = %e, "session: transition failed");
                self.state.send_modify(|s| {
                    s.stable = false;
                    s.recovering = e.needs_recovery();
                });
                Err(e)
            }
        }
    }

    async fn apply(&self, from: AudioMode, to: AudioMode) -> Result<(), AudioError> {
        let cfg = to.session_config();
        if from.is_active() {
            self.call("deactivate", self.platform.deactivate()).await?;
            tokio::time::sleep(self.config.deactivate_settle()).await;
        }
        self.call("set_category", self.platform.set_category(&cfg)).await?;
        if cfg.activate {
            self.call("activate", self.platform.activate(cfg.notify_others))
                .await?;
        }
        tokio::time::sleep(cfg.stabilize).await;
        Ok(())
    }

    async fn recover(&self, mut r: Recovery) -> Option<Recovery> {
        r.attempts += 1;
        info!(attempt = r.attempts, "session: recovering to inactive");

        let cfg = AudioMode::Inactive.session_config();
        if let Err(e) = self.call("deactivate", self.platform.deactivate()).await {
            debug!(error = %e, "session: deactivate during recovery failed");
        }
        match self.call("set_category", self.platform.set_category(&cfg)).await {
            Ok(()) => {
                tokio::time::sleep(cfg.stabilize).await;
                self.state.send_modify(|s| {
                    s.mode = AudioMode::Inactive;
                    s.stable = true;
                    s.recovering = false;
                    s.recovery_failed = false;
                });
                info!("session: recovered");
                None
            }
            Err(e) if r.attempts >= self.config.max_recovery_attempts => {
                error!(attempts = r.attempts, error = %e, "session: recovery exhausted");
                self.state.send_modify(|s| {
                    s.recovering = false;
                    s.recovery_failed = true;
                });
                None
            }
            Err(e) => {
                warn!(attempt = r.attempts, error = %e, "session: recovery failed, retrying");
                r.deadline = Instant::now() + self.config.recovery_backoff();
                Some(r)
            }
        }
    }

    async fn call<F>(&self, op: &'static str, fut: F) -> Result<(), AudioError>
    where
        F: Future<Output = Result<(), AudioError>>,
    {
        match tokio::time::timeout(self.config.platform_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(AudioError::Timeout(op)),
        }
    }
}
