//! CLI argument definitions
//!
//! Contains the main CLI struct and Commands enum for clap parsing.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "remote-agent")]
#[command(about = "Interactive client for a remote MCP tool server", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// MCP server endpoint (default: from .agent.toml)
    #[arg(long, env = "MCP_SERVER_URL", global = true)]
    pub endpoint: Option<String>,

    /// API key sent to the server as a bearer token
    #[arg(long, env = "MCP_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Config file to use instead of searching for .agent.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace). Default is warn.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Interactive session (default)
    Chat,
    /// List the tools the server exposes
    Tools,
    /// Call a tool directly
    Call {
        /// Tool name
        tool: String,
        /// Arguments as JSON
        #[arg(long, short)]
        args: Option<String>,
    },
}

impl Cli {
    /// Subcommand to run, `chat` when none was given
    pub fn command(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Chat)
    }
}
