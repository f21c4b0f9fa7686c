//! Connection supervisor
//!
//! Owns the single transport handle to the remote MCP server. Callers get a
//! healthy handle from [`Supervisor::acquire`] or an error; anyone who sees
//! the handle misbehave calls [`Supervisor::report_failure`], which drops the
//! handle and raises a single-slot reconnect signal for the background
//! listener.
//!
//! All state lives behind one async mutex. `acquire` holds it for the whole
//! connect protocol, so concurrent callers queue behind one attempt and
//! share its outcome instead of racing duplicate connections.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use super::connect::{close_bounded, discard, establish, ConnectPolicy};
use super::error::ConnectError;
use super::transport::{McpTransport, TransportFactory};
use super::types::{ClientIdentity, ServerSummary};

/// Connection state, only touched under the supervisor's lock.
///
/// `connected` implies `handle.is_some()`; both change together.
#[derive(Default)]
struct ConnectionState {
    handle: Option<Arc<dyn McpTransport>>,
    connected: bool,
    last_error: Option<String>,
    server: Option<ServerSummary>,
    /// Outcome of the most recent failed connect, shared with callers that
    /// were already waiting when it ran
    last_connect_failure: Option<ConnectError>,
    failures_reported: u64,
    connects: u64,
}

/// Point-in-time view of the supervisor for status displays
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    pub endpoint: String,
    pub connected: bool,
    pub last_error: Option<String>,
    pub server: Option<ServerSummary>,
    pub failures_reported: u64,
    pub connects: u64,
}

/// Receiving end of the reconnect notification.
///
/// Capacity one: any number of failures before the listener wakes collapse
/// into a single pending signal.
pub struct ReconnectSignal {
    rx: mpsc::Receiver<()>,
}

impl ReconnectSignal {
    /// Wait for the next reconnect request. Returns `false` once the
    /// supervisor is gone.
    pub async fn notified(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }

    /// Consume a pending signal without waiting
    pub fn try_take(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

/// Supervises the connection to one remote MCP endpoint
pub struct Supervisor {
    endpoint: String,
    factory: Arc<dyn TransportFactory>,
    policy: ConnectPolicy,
    identity: ClientIdentity,
    state: Mutex<ConnectionState>,
    /// Bumped under the lock each time the connect protocol finishes
    connect_epoch: AtomicU64,
    reconnect_tx: mpsc::Sender<()>,
    reconnect_rx: std::sync::Mutex<Option<mpsc::Receiver<()>>>,
}

impl Supervisor {
    pub fn new(
        endpoint: impl Into<String>,
        factory: Arc<dyn TransportFactory>,
        policy: ConnectPolicy,
        identity: ClientIdentity,
    ) -> Self {
        let (reconnect_tx, reconnect_rx) = mpsc::channel(1);
        Self {
            endpoint: endpoint.into(),
            factory,
            policy,
            identity,
            state: Mutex::new(ConnectionState::default()),
            connect_epoch: AtomicU64::new(0),
            reconnect_tx,
            reconnect_rx: std::sync::Mutex::new(Some(reconnect_rx)),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn policy(&self) -> &ConnectPolicy {
        &self.policy
    }

    /// Get a healthy handle, connecting first if needed.
    ///
    /// May wait for the full connect protocol. The returned handle is for
    /// the current operation only; do not hold on to it.
    pub async fn acquire(&self) -> Result<Arc<dyn McpTransport>, ConnectError> {
        let epoch_on_entry = self.connect_epoch.load(Ordering::Acquire);
        let mut state = self.state.lock().await;

        if state.connected {
            if let Some(handle) = &state.handle {
                return Ok(handle.clone());
            }
        }

        // A connect ran and failed while we were queued on the lock
        if self.connect_epoch.load(Ordering::Acquire) != epoch_on_entry {
            if let Some(err) = &state.last_connect_failure {
                return Err(err.clone());
            }
        }

        if let Some(old) = state.handle.take() {
            discard(old);
        }
        state.connected = false;

        let outcome = establish(&*self.factory, &self.endpoint, &self.identity, &self.policy).await;
        self.connect_epoch.fetch_add(1, Ordering::AcqRel);

        match outcome {
            Ok(conn) => {
                state.handle = Some(conn.handle.clone());
                state.connected = true;
                state.last_error = None;
                state.last_connect_failure = None;
                state.server = Some(conn.server);
                state.connects += 1;
                Ok(conn.handle)
            }
            Err(e) => {
                tracing::error!("Connection to {} failed: {}", self.endpoint, e);
                state.last_error = Some(e.to_string());
                state.last_connect_failure = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Mark the connection as broken and request a reconnect.
    ///
    /// Closes and drops the current handle. Any number of concurrent reports
    /// leave at most one reconnect signal pending.
    pub async fn report_failure(&self, err: impl Display) {
        let mut state = self.state.lock().await;

        state.connected = false;
        state.last_error = Some(err.to_string());
        state.failures_reported += 1;

        // Closed in the background so a stuck close never holds the lock
        if let Some(handle) = state.handle.take() {
            discard(handle);
        }

        tracing::warn!("MCP connection marked as failed: {}", err);

        // Full slot means a reconnect is already pending
        let _ = self.reconnect_tx.try_send(());
    }

    /// True when the next `acquire` would have to connect
    pub async fn needs_reconnect(&self) -> bool {
        let state = self.state.lock().await;
        !state.connected || state.handle.is_none()
    }

    /// Take the reconnect signal. Only the first call gets it.
    pub fn reconnect_signal(&self) -> Option<ReconnectSignal> {
        self.reconnect_rx
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .map(|rx| ReconnectSignal { rx })
    }

    pub async fn status(&self) -> ConnectionStatus {
        let state = self.state.lock().await;
        ConnectionStatus {
            endpoint: self.endpoint.clone(),
            connected: state.connected,
            last_error: state.last_error.clone(),
            server: state.server.clone(),
            failures_reported: state.failures_reported,
            connects: state.connects,
        }
    }

    /// Close any live handle, waiting at most [`CLOSE_TIMEOUT`](super::CLOSE_TIMEOUT).
    /// Later `acquire` calls reconnect.
    pub async fn shutdown(&self) {
        let handle = {
            let mut state = self.state.lock().await;
            state.connected = false;
            state.handle.take()
        };
        if let Some(handle) = handle {
            tracing::debug!("Closing MCP connection to {}", self.endpoint);
            close_bounded(handle).await;
        }
    }
}
