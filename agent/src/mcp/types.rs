//! MCP type definitions
//!
//! Shared types used by the transport, the supervisor and the session loop.

use std::sync::Arc;

use serde_json::Value;

/// A tool exposed by the remote MCP server
#[derive(Debug, Clone, PartialEq)]
pub struct McpTool {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: Option<String>,
    /// Input schema (JSON)
    pub input_schema: Option<Value>,
}

impl McpTool {
    /// Create a tool descriptor with no schema
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
        }
    }

    /// First line of the description, or an empty string
    pub fn summary(&self) -> &str {
        self.description
            .as_deref()
            .and_then(|d| d.lines().next())
            .unwrap_or("")
    }
}

/// The tools available on the remote server at one point in time.
///
/// Immutable once fetched. A refresh produces a new `ToolSet` that replaces
/// the old one wholesale; cloning only bumps a reference count.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    tools: Arc<Vec<McpTool>>,
}

impl ToolSet {
    pub fn new(tools: Vec<McpTool>) -> Self {
        Self {
            tools: Arc::new(tools),
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, McpTool> {
        self.tools.iter()
    }

    /// Look up a tool by exact name
    pub fn get(&self, name: &str) -> Option<&McpTool> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Tool names in server order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a ToolSet {
    type Item = &'a McpTool;
    type IntoIter = std::slice::Iter<'a, McpTool>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Result of a tool call, reduced to what the session loop needs
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Text content blocks joined by newlines
    pub text: String,
    /// The server flagged the call as failed
    pub is_error: bool,
}

/// Identity this client presents during protocol initialization
#[derive(Debug, Clone, PartialEq)]
pub struct ClientIdentity {
    pub name: String,
    pub version: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// What the server told us about itself during initialization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerSummary {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
}
