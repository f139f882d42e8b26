//! Listener supervisor: owns the worker lifecycle.
//!
//! At most one worker is live per supervisor. Start spawns a worker seeded
//! with the last known session marker; reset stops the current worker,
//! waits for it to fully exit, then starts a replacement carrying the
//! marker forward so an already-seen session is never re-detected. All
//! control calls take `&mut self`, so two lifecycle operations cannot race
//! through one supervisor handle.

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use scopestream_common::{DocumentMarker, ListenerState, NO_SESSION};

use crate::adapter::{AdapterError, AdapterFactory};
use crate::bus::EventBus;
use crate::config::ListenerConfig;
use crate::worker::ListenerWorker;

/// Lifecycle errors. Calling a control operation in the wrong state is an
/// invariant violation and surfaces explicitly instead of being ignored.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("Listener is already running")]
    AlreadyRunning,

    #[error("Listener is not running")]
    NotRunning,

    #[error("Adapter connection failed: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Signals and handles for the one live worker.
struct WorkerHandle {
    stop_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<ListenerState>,
    join: JoinHandle<DocumentMarker>,
}

/// Supervises the polling worker: start, stop, hot-reset.
pub struct ListenerSupervisor<F: AdapterFactory> {
    factory: F,
    bus: EventBus,
    config: ListenerConfig,
    marker: DocumentMarker,
    active: Option<WorkerHandle>,
}

impl<F: AdapterFactory> ListenerSupervisor<F> {
    /// Create a supervisor that has seen no session yet.
    ///
    /// The bus is passed in explicitly; the supervisor publishes nothing
    /// itself but hands the bus to each worker it spawns and listens on the
    /// bus's reset channel in [`serve_resets`](Self::serve_resets).
    pub fn new(factory: F, bus: EventBus, config: ListenerConfig) -> Self {
        Self {
            factory,
            bus,
            config,
            marker: NO_SESSION,
            active: None,
        }
    }

    /// Last session marker the supervisor has adopted from a stopped
    /// worker. While a worker is live this lags the worker's own view.
    pub fn marker(&self) -> DocumentMarker {
        self.marker
    }

    /// Whether a worker is currently live.
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Current state of the live worker, if any.
    pub fn worker_state(&self) -> Option<ListenerState> {
        self.active.as_ref().map(|handle| *handle.state_rx.borrow())
    }

    /// Spawn a worker seeded with the current marker.
    ///
    /// A fresh adapter is connected per worker lifetime; the execution
    /// context is never reused across workers.
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        if self.active.is_some() {
            return Err(SupervisorError::AlreadyRunning);
        }

        let adapter = self.factory.connect()?;
        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(ListenerState::Idle);

        let worker = ListenerWorker::new(
            adapter,
            self.bus.clone(),
            self.config.clone(),
            self.marker,
            stop_rx,
            state_tx,
        );
        let join = tokio::spawn(worker.run());

        info!(marker = self.marker, "Started listener worker");
        self.active = Some(WorkerHandle {
            stop_tx,
            state_rx,
            join,
        });
        Ok(())
    }

    /// Stop the current worker, wait for it to fully exit, then start a
    /// replacement seeded with the marker the stopped worker handed back.
    ///
    /// Synchronous from the caller's point of view: returns only once the
    /// replacement worker is live, so two workers' events never interleave.
    pub async fn reset(&mut self) -> Result<(), SupervisorError> {
        info!("Resetting listener");
        self.halt_worker().await?;
        self.start()
    }

    /// Stop the current worker and wait until its task has fully exited.
    ///
    /// After `stop()` the supervisor holds no worker; a subsequent
    /// `reset()` or `stop()` is an error.
    pub async fn stop(&mut self) -> Result<(), SupervisorError> {
        self.halt_worker().await
    }

    /// Serve reset requests from the bus until the reset channel closes.
    pub async fn serve_resets(&mut self) -> Result<(), SupervisorError> {
        let mut reset_rx = self.bus.subscribe_reset();

        loop {
            match reset_rx.recv().await {
                Ok(()) => {
                    info!("Reset requested");
                    self.reset().await?;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // Coalesce a burst of reset requests into one reset.
                    warn!(missed, "Reset channel lagged");
                    self.reset().await?;
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }

    /// Signal stop, await the worker's exit, adopt its final marker.
    async fn halt_worker(&mut self) -> Result<(), SupervisorError> {
        let handle = self.active.take().ok_or(SupervisorError::NotRunning)?;

        // The worker may already have exited; a closed channel is fine.
        let _ = handle.stop_tx.send(true);

        // Awaiting the join handle is the stop acknowledgement: the worker
        // has left its execution context before this returns.
        self.marker = handle.join.await?;
        info!(marker = self.marker, "Listener worker stopped");
        Ok(())
    }
}
