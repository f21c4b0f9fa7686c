//! CLI module
//!
//! - `args`: clap definitions
//! - `commands`: built-in words understood at the prompt
//! - `repl`: the interactive loop over a [`crate::session::Session`]

pub mod args;
pub mod commands;
pub mod repl;

pub use args::{Cli, Commands};
pub use commands::ReplCommand;
pub use repl::{render_outcome, Repl};
