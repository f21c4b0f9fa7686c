//! Bounded connect protocol
//!
//! Turns "no connection" into "started and initialized" within a fixed
//! number of attempts:
//!
//! 1. construct a fresh handle
//! 2. race `start` against the per-attempt deadline
//! 3. on failure, pause for the backoff interval and go again with a new handle
//! 4. once started, run `initialize` under its own deadline, exactly once
//!
//! A start that misses its deadline is abandoned, not cancelled: the task
//! keeps running detached and its handle is never reused.

use std::sync::Arc;
use std::time::Duration;

use super::error::{ConnectError, TransportError};
use super::transport::{McpTransport, TransportFactory};
use super::types::{ClientIdentity, ServerSummary};

/// Default number of start attempts
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default deadline for one start attempt
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default pause between failed attempts
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

/// Default deadline for protocol initialization
pub const DEFAULT_INITIALIZE_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest wait for a handle to close
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Attempt cap and deadlines for the connect protocol
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub backoff: Duration,
    pub initialize_timeout: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            backoff: DEFAULT_BACKOFF,
            initialize_timeout: DEFAULT_INITIALIZE_TIMEOUT,
        }
    }
}

impl ConnectPolicy {
    /// Upper bound on how long one run of the protocol can take
    pub fn worst_case(&self) -> Duration {
        let attempts = self.max_attempts.max(1);
        self.attempt_timeout * attempts + self.backoff * (attempts - 1) + self.initialize_timeout
    }
}

/// A started and initialized handle
pub struct Connection {
    pub handle: Arc<dyn McpTransport>,
    pub server: ServerSummary,
    /// Which attempt succeeded (1-based)
    pub attempts: u32,
}

/// Run the connect protocol once
pub async fn establish(
    factory: &dyn TransportFactory,
    endpoint: &str,
    identity: &ClientIdentity,
    policy: &ConnectPolicy,
) -> Result<Connection, ConnectError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = TransportError::NotStarted;
    let mut started = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            tokio::time::sleep(policy.backoff).await;
        }

        tracing::info!("Starting MCP client for {} ({}/{})", endpoint, attempt, max_attempts);

        let handle = match factory.create(endpoint) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("Failed to create MCP client: {}", e);
                last_error = e;
                continue;
            }
        };

        match start_with_deadline(handle.clone(), policy.attempt_timeout).await {
            Ok(()) => {
                started = Some((handle, attempt));
                break;
            }
            Err(e) => {
                tracing::warn!("MCP start attempt {}/{} failed: {}", attempt, max_attempts, e);
                discard(handle);
                last_error = e;
            }
        }
    }

    let Some((handle, attempts)) = started else {
        return Err(ConnectError::Exhausted {
            attempts: max_attempts,
            last: last_error,
        });
    };

    let initialized =
        tokio::time::timeout(policy.initialize_timeout, handle.initialize(identity)).await;

    match initialized {
        Ok(Ok(server)) => {
            tracing::info!("Connected to {} after {} attempt(s)", endpoint, attempts);
            Ok(Connection {
                handle,
                server,
                attempts,
            })
        }
        Ok(Err(e)) => {
            close_bounded(handle).await;
            Err(ConnectError::Initialize(e))
        }
        Err(_) => {
            discard(handle);
            Err(ConnectError::Initialize(TransportError::timeout(
                "initialize",
                policy.initialize_timeout,
            )))
        }
    }
}

/// Race `start` against a deadline without cancelling it
async fn start_with_deadline(
    handle: Arc<dyn McpTransport>,
    deadline: Duration,
) -> Result<(), TransportError> {
    let task = tokio::spawn(async move { handle.start().await });

    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(TransportError::Connection(format!(
            "start task failed: {}",
            join
        ))),
        // Dropping the JoinHandle detaches the task
        Err(_) => Err(TransportError::timeout("start", deadline)),
    }
}

/// Close `handle`, ignoring errors and giving up after [`CLOSE_TIMEOUT`]
pub(super) async fn close_bounded(handle: Arc<dyn McpTransport>) {
    if tokio::time::timeout(CLOSE_TIMEOUT, handle.close()).await.is_err() {
        tracing::debug!("Gave up closing handle after {:?}", CLOSE_TIMEOUT);
    }
}

/// Close a handle we no longer want, without waiting on it
pub(super) fn discard(handle: Arc<dyn McpTransport>) {
    tokio::spawn(close_bounded(handle));
}
