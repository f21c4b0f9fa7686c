//! Executor seam for one unit of interactive work
//!
//! The session loop does not know how a request is turned into remote tool
//! calls. It hands the dialog to an [`Executor`] built for the current tool
//! set, and rebuilds the executor whenever the tool set changes.
//!
//! Each request carries a [`RequestWindow`]. The executor is expected to
//! give up by the window's deadline; the session enforces a later, hard
//! guard in case it does not.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;

use super::dialog::{last_user_message, Message};
use crate::mcp::{ConnectError, Supervisor, ToolSet, TransportError};

/// Why a unit of work did not produce a reply
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The work's own deadline passed and it unwound
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// Anything else, as free text
    #[error("{0}")]
    Failed(String),
}

/// Time limits for one request, fixed when it is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestWindow {
    pub started: Instant,
    /// Deadline handed to the executor
    pub timeout: Duration,
    /// Absolute ceiling enforced by the session
    pub guard: Duration,
}

impl RequestWindow {
    pub fn new(timeout: Duration, guard: Duration) -> Self {
        Self {
            started: Instant::now(),
            timeout,
            guard,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.started + self.timeout
    }

    pub fn guard_deadline(&self) -> Instant {
        self.started + self.guard
    }
}

/// Runs one request against the remote tools
#[async_trait]
pub trait Executor: Send + Sync {
    /// Produce a reply for the last user message, finishing by
    /// `window.deadline()`.
    async fn execute(&self, dialog: Vec<Message>, window: RequestWindow)
        -> Result<String, ExecError>;
}

/// Builds an executor bound to a specific tool set
pub trait ExecutorFactory: Send + Sync {
    fn build(&self, tools: ToolSet) -> Result<Arc<dyn Executor>, ExecError>;
}

// =============================================================================
// Direct tool invocation
// =============================================================================

/// Split `<tool> [json]` into a tool name and optional arguments
pub fn parse_invocation(input: &str) -> Result<(String, Option<Value>), ExecError> {
    let input = input.trim();
    let (name, rest) = match input.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (input, ""),
    };

    if name.is_empty() {
        return Err(ExecError::Failed("empty request".into()));
    }

    let arguments = if rest.is_empty() {
        None
    } else {
        let value: Value = serde_json::from_str(rest)
            .map_err(|e| ExecError::Failed(format!("arguments are not valid JSON: {}", e)))?;
        if !value.is_object() {
            return Err(ExecError::Failed("arguments must be a JSON object".into()));
        }
        Some(value)
    };

    Ok((name.to_string(), arguments))
}

/// Treats the last user message as `<tool> [json-args]` and calls that tool
pub struct ToolCallExecutor {
    supervisor: Arc<Supervisor>,
    tools: ToolSet,
}

impl ToolCallExecutor {
    pub fn new(supervisor: Arc<Supervisor>, tools: ToolSet) -> Self {
        Self { supervisor, tools }
    }
}

#[async_trait]
impl Executor for ToolCallExecutor {
    async fn execute(
        &self,
        dialog: Vec<Message>,
        window: RequestWindow,
    ) -> Result<String, ExecError> {
        let input = last_user_message(&dialog)
            .ok_or_else(|| ExecError::Failed("no request to run".into()))?;
        let (name, arguments) = parse_invocation(input)?;

        if !self.tools.contains(&name) {
            return Err(ExecError::Failed(format!(
                "unknown tool '{}' (type 'tools' to list available tools)",
                name
            )));
        }

        tracing::info!("Executing tool: {} with args: {:?}", name, arguments);

        let call = async {
            let handle = self.supervisor.acquire().await?;
            let output = handle.call_tool(&name, arguments).await?;
            Ok::<_, ExecError>(output)
        };
        let output = tokio::time::timeout_at(window.deadline(), call)
            .await
            .map_err(|_| ExecError::DeadlineExceeded(window.timeout))??;

        if output.is_error {
            return Err(ExecError::Failed(output.text));
        }
        Ok(output.text)
    }
}

pub struct ToolCallExecutorFactory {
    supervisor: Arc<Supervisor>,
}

impl ToolCallExecutorFactory {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self { supervisor }
    }
}

impl ExecutorFactory for ToolCallExecutorFactory {
    fn build(&self, tools: ToolSet) -> Result<Arc<dyn Executor>, ExecError> {
        Ok(Arc::new(ToolCallExecutor::new(self.supervisor.clone(), tools)))
    }
}
