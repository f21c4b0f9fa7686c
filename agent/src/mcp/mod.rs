//! MCP (Model Context Protocol) client side
//!
//! Connects to one remote MCP server and keeps that connection usable:
//! - `transport`: the handle abstraction (start / initialize / list / call / close)
//! - `remote`: rmcp streamable HTTP implementation of the handle
//! - `connect`: bounded retry protocol that produces an initialized handle
//! - `supervisor`: owner of the single live handle and the reconnect signal
//! - `refresh`: enumerates the remote tool set through the supervisor

mod connect;
mod error;
mod refresh;
#[cfg(feature = "remote")]
mod remote;
mod supervisor;
mod transport;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use connect::{establish, ConnectPolicy, Connection, CLOSE_TIMEOUT};
pub use error::{ConnectError, RefreshError, TransportError};
pub use refresh::{ToolSetRefresher, DEFAULT_ENUMERATION_TIMEOUT};
#[cfg(feature = "remote")]
pub use remote::{parse_endpoint, RemoteTransport, RemoteTransportFactory};
pub use supervisor::{ConnectionStatus, ReconnectSignal, Supervisor};
pub use transport::{McpTransport, TransportFactory};
pub use types::{ClientIdentity, McpTool, ServerSummary, ToolOutput, ToolSet};
