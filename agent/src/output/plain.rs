//! Plain text output for pipes and CI environments

use std::io::{self, Write};

use super::{preview, OutputEvent, OutputWriter};

/// Plain text output writer (no colors)
#[derive(Default)]
pub struct PlainOutput {
    verbose: bool,
}

impl PlainOutput {
    pub fn new() -> Self {
        Self { verbose: false }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl OutputWriter for PlainOutput {
    fn write(&self, event: OutputEvent) {
        match event {
            OutputEvent::Text(text) => {
                println!("{}", text);
            }

            OutputEvent::ToolEntry { name, description } => {
                if description.is_empty() {
                    println!("{}", name);
                } else {
                    println!("{}\t{}", name, description);
                }
            }

            OutputEvent::ToolComplete {
                name,
                result,
                duration,
                is_error,
            } => {
                let status = if is_error { "FAIL" } else { "OK" };
                eprintln!("{} {} ({}ms)", status, name, duration.as_millis());
                if self.verbose {
                    println!("{}", result);
                } else {
                    println!("{}", preview(&result, 100));
                }
            }

            OutputEvent::Status(msg) => {
                eprintln!("  {}", msg);
            }

            OutputEvent::Error(msg) => {
                eprintln!("Error: {}", msg);
            }

            OutputEvent::Warning(msg) => {
                eprintln!("Warning: {}", msg);
            }

            OutputEvent::System(msg) => {
                eprintln!("{}", msg);
            }

            OutputEvent::NewLine => {
                println!();
            }
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_output_creation() {
        let output = PlainOutput::new();
        assert!(!output.verbose);

        let output = PlainOutput::new().with_verbose(true);
        assert!(output.verbose);
    }
}
