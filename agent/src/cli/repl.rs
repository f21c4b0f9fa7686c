//! REPL (Read-Eval-Print Loop) for interactive sessions
//!
//! Reads lines, runs built-in commands locally and hands everything else to
//! the [`Session`]. Every outcome becomes a status line telling the user
//! whether to wait, retry, or go look at the remote system.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::commands::{ReplCommand, HELP};
use crate::output::{OutputEvent, OutputWriter};
use crate::session::{Session, TurnOutcome};

/// Interactive REPL
pub struct Repl<'a> {
    session: &'a mut Session,
    output: &'a dyn OutputWriter,
    show_prompt: bool,
}

impl<'a> Repl<'a> {
    pub fn new(session: &'a mut Session, output: &'a dyn OutputWriter) -> Self {
        Self {
            session,
            output,
            show_prompt: true,
        }
    }

    /// Disable the `> ` prompt (non-interactive input)
    pub fn without_prompt(mut self) -> Self {
        self.show_prompt = false;
        self
    }

    /// Run until `quit` or end of input
    pub async fn run<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        self.output.write(OutputEvent::System(format!(
            "Connected to {} ({} tools). Type 'help' for commands, 'quit' to exit.",
            self.session.supervisor().endpoint(),
            self.session.tools().len()
        )));
        self.output.write(OutputEvent::NewLine);

        let mut lines = input.lines();

        loop {
            if let Some(retry) = self.due_retry() {
                self.output.write(OutputEvent::Status(format!(
                    "Connection restored, retrying: {}",
                    retry
                )));
                self.handle_request(&retry).await;
                continue;
            }

            if self.show_prompt {
                print!("> ");
                let _ = std::io::stdout().flush();
            }

            let retry_pending = self.session.retry_pending();
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = self.session.updated(), if retry_pending => continue,
            };

            let Some(line) = line else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match ReplCommand::parse(line) {
                ReplCommand::Quit => break,
                ReplCommand::Help => self.show_help(),
                ReplCommand::Tools => self.show_tools(),
                ReplCommand::Refresh => self.refresh().await,
                ReplCommand::Status => self.show_status().await,
                ReplCommand::Clear => {
                    self.session.clear_history();
                    self.output.write(OutputEvent::Status("History cleared".into()));
                }
                ReplCommand::Request(text) => self.handle_request(&text).await,
            }
        }

        self.output.flush();
        Ok(())
    }

    /// Pick up republished tools and hand back an input owed a retry
    fn due_retry(&mut self) -> Option<String> {
        if let Err(e) = self.session.apply_updates() {
            self.output
                .write(OutputEvent::Warning(format!("Could not adopt new tools: {}", e)));
        }
        self.session.take_retry()
    }

    async fn handle_request(&mut self, input: &str) {
        let outcome = self.session.submit(input).await;
        render_outcome(self.output, &outcome);
    }

    async fn refresh(&mut self) {
        self.output.write(OutputEvent::Status("Refreshing tools...".into()));
        match self.session.refresh_tools().await {
            Ok(count) => self
                .output
                .write(OutputEvent::Status(format!("{} tools available", count))),
            Err(e) => {
                self.output.write(OutputEvent::Error(e.to_string()));
                self.output.write(OutputEvent::Status(
                    "Please check the remote system, then try 'reconnect' again.".into(),
                ));
            }
        }
    }

    fn show_help(&self) {
        for (command, description) in HELP {
            self.output
                .write(OutputEvent::System(format!("  {:<20} {}", command, description)));
        }
    }

    fn show_tools(&self) {
        if self.session.tools().is_empty() {
            self.output.write(OutputEvent::Status("No tools available".into()));
            return;
        }
        for tool in self.session.tools() {
            self.output.write(OutputEvent::ToolEntry {
                name: tool.name.clone(),
                description: tool.summary().to_string(),
            });
        }
    }

    async fn show_status(&self) {
        let status = self.session.supervisor().status().await;
        let state = if status.connected {
            "connected"
        } else {
            "disconnected"
        };
        self.output
            .write(OutputEvent::Status(format!("{}: {}", status.endpoint, state)));
        if let Some(server) = &status.server {
            self.output.write(OutputEvent::Status(format!(
                "server {} {} (protocol {})",
                server.name, server.version, server.protocol_version
            )));
        }
        self.output.write(OutputEvent::Status(format!(
            "{} tools, {} connects, {} failures reported",
            self.session.tools().len(),
            status.connects,
            status.failures_reported
        )));
        if let Some(err) = &status.last_error {
            self.output
                .write(OutputEvent::Status(format!("last error: {}", err)));
        }
    }
}

/// Turn a request outcome into user-facing lines
pub fn render_outcome(output: &dyn OutputWriter, outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Completed(reply) => {
            output.write(OutputEvent::NewLine);
            output.write(OutputEvent::Text(reply.clone()));
            output.write(OutputEvent::NewLine);
        }
        TurnOutcome::Failed(msg) => {
            output.write(OutputEvent::Error(msg.clone()));
        }
        TurnOutcome::Reconnecting(msg) => {
            output.write(OutputEvent::Warning(format!("Connection problem: {}", msg)));
            output.write(OutputEvent::Status(
                "Reconnecting automatically; your last input will be retried.".into(),
            ));
        }
        TurnOutcome::TimedOut(after) => {
            output.write(OutputEvent::Warning(format!(
                "Request timed out after {}s",
                after.as_secs()
            )));
            output.write(OutputEvent::Status(
                "The connection will be re-established. Please retry your last input.".into(),
            ));
        }
        TurnOutcome::Unavailable(msg) => {
            output.write(OutputEvent::Error(format!("Remote tools unavailable: {}", msg)));
            output.write(OutputEvent::Status(
                "Please check the remote system manually, then type 'reconnect'.".into(),
            ));
        }
    }
}
