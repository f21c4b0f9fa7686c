//! Failure classification for finished requests
//!
//! Structured error kinds decide first. Errors that only arrive as text go
//! through a keyword check kept for compatibility with servers that report
//! transport trouble inside ordinary error messages.

use super::executor::ExecError;

/// Case-sensitive fragments that mark free-text errors as transport failures
pub const TRANSPORT_KEYWORDS: [&str; 4] = ["connection", "timeout", "EOF", "Invalid session ID"];

/// Whether a failed request says anything about connection health
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The connection is suspect; report it and reconnect
    Transport,
    /// The remote operation ran and failed normally
    Business,
}

/// Keyword check over free-text error messages
pub fn mentions_transport_failure(text: &str) -> bool {
    TRANSPORT_KEYWORDS.iter().any(|k| text.contains(k))
}

impl ExecError {
    pub fn class(&self) -> FailureClass {
        let transport = match self {
            ExecError::Transport(e) if e.is_transport() => true,
            ExecError::Transport(e) => mentions_transport_failure(&e.to_string()),
            ExecError::Connect(_) | ExecError::DeadlineExceeded(_) => true,
            ExecError::Failed(text) => mentions_transport_failure(text),
        };

        if transport {
            FailureClass::Transport
        } else {
            FailureClass::Business
        }
    }
}
