//! Interactive client for a remote MCP tool server
//!
//! Keeps one streamable HTTP connection usable across transient failures
//! and runs each request under a hard time limit.

pub mod cli;
pub mod config;
pub mod logging;
pub mod mcp;
pub mod output;
pub mod session;
