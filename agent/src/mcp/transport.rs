//! Transport handle abstraction
//!
//! A transport handle is one streaming connection to the remote MCP server.
//! Construction, start and initialization are separate steps so the connect
//! protocol can retry the flaky part (start) without retrying the
//! deterministic part (initialize).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::error::TransportError;
use super::types::{ClientIdentity, McpTool, ServerSummary, ToolOutput};

/// One connection to the remote MCP server
///
/// Implementations must tolerate being abandoned mid-operation: a `start`
/// that outlives its deadline is dropped by the caller without being
/// cancelled, and the handle is never used again.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Open the underlying stream. Must succeed before any other operation.
    async fn start(&self) -> Result<(), TransportError>;

    /// Run the protocol-level handshake and check compatibility
    async fn initialize(&self, identity: &ClientIdentity) -> Result<ServerSummary, TransportError>;

    /// Enumerate the tools the server currently exposes, in server order
    async fn list_tools(&self) -> Result<Vec<McpTool>, TransportError>;

    /// Invoke a tool
    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<ToolOutput, TransportError>;

    /// Tear the connection down. Callers ignore the result.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Builds fresh transport handles bound to an endpoint
pub trait TransportFactory: Send + Sync {
    /// Construct a handle without touching the network
    fn create(&self, endpoint: &str) -> Result<Arc<dyn McpTransport>, TransportError>;
}
