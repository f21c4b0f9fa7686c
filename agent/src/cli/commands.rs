//! Built-in REPL commands
//!
//! Anything that is not one of these words is sent to the session as a
//! request. A leading slash is accepted (`/tools` == `tools`).

/// A line typed at the prompt
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Quit,
    Help,
    /// List the active tool set
    Tools,
    /// Re-enumerate tools, reconnecting if needed
    Refresh,
    /// Connection state
    Status,
    /// Forget conversation history
    Clear,
    /// Work for the session
    Request(String),
}

impl ReplCommand {
    /// Parse one trimmed, non-empty line
    pub fn parse(line: &str) -> Self {
        let word = line.strip_prefix('/').unwrap_or(line);
        match word {
            "quit" | "exit" => Self::Quit,
            "help" => Self::Help,
            "tools" => Self::Tools,
            "refresh" | "reconnect" => Self::Refresh,
            "status" => Self::Status,
            "clear" => Self::Clear,
            _ => Self::Request(line.to_string()),
        }
    }
}

pub const HELP: &[(&str, &str)] = &[
    ("<tool> [json]", "Call a remote tool, e.g. list_pods {\"namespace\":\"default\"}"),
    ("tools", "List available tools"),
    ("refresh, reconnect", "Reload tools from the server, reconnecting if needed"),
    ("status", "Show connection state"),
    ("clear", "Clear conversation history"),
    ("help", "Show this help"),
    ("quit, exit", "Leave"),
];
