//! Tool-set refresher
//!
//! Enumerates the remote tools through the supervisor's current handle.
//! Failure to enumerate is treated as evidence the handle is unhealthy and
//! reported back to the supervisor; retrying is the supervisor's job.

use std::time::Duration;

use super::error::{RefreshError, TransportError};
use super::supervisor::Supervisor;
use super::types::ToolSet;

/// Default deadline for one enumeration call
pub const DEFAULT_ENUMERATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ToolSetRefresher {
    timeout: Duration,
}

impl Default for ToolSetRefresher {
    fn default() -> Self {
        Self::new(DEFAULT_ENUMERATION_TIMEOUT)
    }
}

impl ToolSetRefresher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Fetch the complete current tool set.
    ///
    /// Connects first if the supervisor has no healthy handle.
    pub async fn refresh(&self, supervisor: &Supervisor) -> Result<ToolSet, RefreshError> {
        let handle = supervisor.acquire().await?;

        let listed = tokio::time::timeout(self.timeout, handle.list_tools()).await;
        let error = match listed {
            Ok(Ok(tools)) => {
                tracing::info!("Fetched {} MCP tools", tools.len());
                return Ok(ToolSet::new(tools));
            }
            Ok(Err(e)) => e,
            Err(_) => TransportError::timeout("list_tools", self.timeout),
        };

        supervisor.report_failure(&error).await;
        Err(RefreshError::Enumeration(error))
    }
}
