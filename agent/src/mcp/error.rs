//! Error types for the remote MCP connection
//!
//! All errors are `Clone`: one connect attempt can fail for many callers
//! waiting on the supervisor at once, and each gets its own copy.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by a single transport handle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Endpoint could not be turned into a client (bad URL, unsupported scheme)
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// An operation was issued before `start` succeeded, or after `close`
    #[error("transport not started")]
    NotStarted,

    /// Connection-level failure (reset, closed stream, send failure)
    #[error("connection error: {0}")]
    Connection(String),

    /// The operation did not finish within its deadline
    #[error("{operation} timeout after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    /// Protocol handshake produced something we cannot work with
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server processed the request and returned an error
    #[error("remote error: {0}")]
    Remote(String),
}

impl TransportError {
    pub fn timeout(operation: &'static str, elapsed: Duration) -> Self {
        Self::Timeout { operation, elapsed }
    }

    /// Whether this error says the handle itself is unhealthy.
    ///
    /// `Remote` errors come back over a working connection and say nothing
    /// about transport health.
    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::Remote(_))
    }
}

/// Errors from the bounded connect protocol
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectError {
    /// Every start attempt failed or timed out
    #[error("could not connect to MCP server after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: TransportError },

    /// Start succeeded but protocol initialization did not; not retried
    #[error("failed to initialize MCP session: {0}")]
    Initialize(TransportError),
}

/// Errors from enumerating the remote tool set
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RefreshError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("failed to list MCP tools: {0}")]
    Enumeration(TransportError),
}
