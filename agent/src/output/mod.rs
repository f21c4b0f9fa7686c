//! User-visible output
//!
//! Everything the interactive surface shows goes through an [`OutputWriter`]
//! as an [`OutputEvent`]. Diagnostics go to `tracing` instead, so failures
//! reach the user as status lines and never as raw error dumps.

use std::time::Duration;

mod plain;
mod terminal;

pub use plain::PlainOutput;
pub use terminal::TerminalOutput;

// ============================================================================
// Output Events
// ============================================================================

/// Events that can be displayed to the user
#[derive(Debug, Clone)]
pub enum OutputEvent {
    /// Reply or other primary content
    Text(String),

    /// One entry of a tool listing
    ToolEntry { name: String, description: String },

    /// A direct tool call finished
    ToolComplete {
        name: String,
        result: String,
        duration: Duration,
        is_error: bool,
    },

    /// Status message (informational)
    Status(String),

    /// Error message
    Error(String),

    /// Warning message
    Warning(String),

    /// System message (dimmed, for internal info)
    System(String),

    /// New line / separator
    NewLine,
}

// ============================================================================
// Output Writer Trait
// ============================================================================

/// Trait for writing output events
pub trait OutputWriter: Send + Sync {
    fn write(&self, event: OutputEvent);

    /// Flush any buffered output
    fn flush(&self);
}

/// Create a default output writer based on environment.
///
/// `verbose` prints tool results in full instead of a preview.
pub fn default_output(verbose: bool) -> Box<dyn OutputWriter> {
    if atty::is(atty::Stream::Stdout) {
        Box::new(TerminalOutput::new().with_verbose(verbose))
    } else {
        Box::new(PlainOutput::new().with_verbose(verbose))
    }
}

/// Shorten `text` to at most `max` characters, marking the cut
pub(crate) fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
