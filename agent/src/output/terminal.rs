//! Terminal output with colors and formatting
//!
//! Uses ANSI escape codes for colors and styling.

use std::io::{self, Write};

use super::{preview, OutputEvent, OutputWriter};

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const GRAY: &str = "\x1b[90m";

/// Terminal output writer with colors and formatting
pub struct TerminalOutput {
    use_colors: bool,
    verbose: bool,
}

impl Default for TerminalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalOutput {
    pub fn new() -> Self {
        Self {
            use_colors: true,
            verbose: false,
        }
    }

    pub fn without_colors() -> Self {
        Self {
            use_colors: false,
            verbose: false,
        }
    }

    /// Show full tool results instead of a preview
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn color(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{}{}{}", code, text, RESET)
        } else {
            text.to_string()
        }
    }

    fn styled(&self, codes: &[&str], text: &str) -> String {
        if self.use_colors {
            let prefix: String = codes.iter().copied().collect();
            format!("{}{}{}", prefix, text, RESET)
        } else {
            text.to_string()
        }
    }

    fn render(&self, event: OutputEvent) -> String {
        match event {
            OutputEvent::Text(text) => text,

            OutputEvent::ToolEntry { name, description } => {
                let name = self.styled(&[BOLD, CYAN], &name);
                if description.is_empty() {
                    format!("  {}", name)
                } else {
                    format!("  {} {}", name, self.color(GRAY, &preview(&description, 80)))
                }
            }

            OutputEvent::ToolComplete {
                name,
                result,
                duration,
                is_error,
            } => {
                let status = if is_error {
                    self.color(RED, "✗")
                } else {
                    self.color(GREEN, "✓")
                };
                let time = self.color(GRAY, &format!("({}ms)", duration.as_millis()));
                let body = if self.verbose { result } else { preview(&result, 100) };
                let body = if is_error {
                    self.color(RED, &body)
                } else {
                    body
                };
                format!("  {} {} {}\n{}", status, name, time, body)
            }

            OutputEvent::Status(msg) => self.color(GRAY, &format!("  {}", msg)),

            OutputEvent::Error(msg) => format!(
                "{} {}",
                self.styled(&[BOLD, RED], "Error:"),
                self.color(RED, &msg)
            ),

            OutputEvent::Warning(msg) => format!(
                "{} {}",
                self.styled(&[BOLD, YELLOW], "Warning:"),
                self.color(YELLOW, &msg)
            ),

            OutputEvent::System(msg) => self.color(GRAY, &msg),

            OutputEvent::NewLine => String::new(),
        }
    }
}

impl OutputWriter for TerminalOutput {
    fn write(&self, event: OutputEvent) {
        // Content to stdout, everything else to stderr
        let to_stdout = matches!(
            event,
            OutputEvent::Text(_) | OutputEvent::ToolComplete { .. } | OutputEvent::NewLine
        );
        let line = self.render(event);
        if to_stdout {
            println!("{}", line);
        } else {
            eprintln!("{}", line);
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
    }
}
