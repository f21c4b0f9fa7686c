//! Configuration loading

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::mcp::{ClientIdentity, ConnectPolicy};
use crate::session::SessionConfig;

/// Name of the config file searched for
pub const CONFIG_FILE: &str = ".agent.toml";

/// Find a config file by walking up from `start`, then checking global config.
///
/// Search order:
/// 1. `start` and its parent directories (walking up to root)
/// 2. Global config at ~/.config/remote-agent/
fn find_config_file_from(start: &Path, filename: &str) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let candidate = current.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("remote-agent").join(filename);
        if global_path.exists() {
            return Some(global_path);
        }
    }

    None
}

// ============================================================================
// Agent Configuration (.agent.toml)
// ============================================================================

/// Top-level configuration (from .agent.toml)
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentFileConfig {
    #[serde(default)]
    pub remote: RemoteSection,
    #[serde(default)]
    pub connect: ConnectSection,
    #[serde(default)]
    pub session: SessionSection,
}

/// Remote server section
#[derive(Debug, Default, Deserialize)]
pub struct RemoteSection {
    /// Streamable HTTP endpoint of the MCP server; `$VAR` references expand
    pub endpoint: Option<String>,
    /// Sent as a bearer token; `$VAR` references expand
    pub api_key: Option<String>,
    pub client_name: Option<String>,
    pub client_version: Option<String>,
}

/// Connect protocol section
#[derive(Debug, Deserialize)]
pub struct ConnectSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_secs: u64,
    #[serde(default = "default_backoff")]
    pub backoff_secs: u64,
    #[serde(default = "default_initialize_timeout")]
    pub initialize_timeout_secs: u64,
}

/// Session loop section
#[derive(Debug, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_guard_timeout")]
    pub guard_timeout_secs: u64,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_enumeration_timeout")]
    pub enumeration_timeout_secs: u64,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    pub system_prompt: Option<String>,
}

// Default value functions
fn default_max_attempts() -> u32 {
    5
}

fn default_attempt_timeout() -> u64 {
    5
}

fn default_backoff() -> u64 {
    2
}

fn default_initialize_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    45
}

fn default_guard_timeout() -> u64 {
    50
}

fn default_refresh_interval() -> u64 {
    600
}

fn default_enumeration_timeout() -> u64 {
    10
}

fn default_reconnect_delay() -> u64 {
    2
}

fn default_max_history() -> usize {
    30
}

impl Default for ConnectSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            attempt_timeout_secs: default_attempt_timeout(),
            backoff_secs: default_backoff(),
            initialize_timeout_secs: default_initialize_timeout(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            guard_timeout_secs: default_guard_timeout(),
            refresh_interval_secs: default_refresh_interval(),
            enumeration_timeout_secs: default_enumeration_timeout(),
            reconnect_delay_secs: default_reconnect_delay(),
            max_history: default_max_history(),
            system_prompt: None,
        }
    }
}

impl AgentFileConfig {
    /// Load config from .agent.toml
    ///
    /// Search order:
    /// 1. Walk up directory tree from cwd looking for .agent.toml
    /// 2. Check ~/.config/remote-agent/.agent.toml (global fallback)
    /// 3. Fall back to defaults
    pub fn load() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        if let Some(config_path) = find_config_file_from(&cwd, CONFIG_FILE) {
            tracing::debug!("Loading config from: {}", config_path.display());
            return Self::load_from_path(&config_path);
        }

        tracing::debug!("No {} found, using defaults", CONFIG_FILE);
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: AgentFileConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the connection or session misbehave
    pub fn validate(&self) -> Result<()> {
        if self.connect.max_attempts == 0 {
            bail!("connect.max_attempts must be at least 1");
        }
        if self.session.guard_timeout_secs <= self.session.request_timeout_secs {
            bail!(
                "session.guard_timeout_secs ({}) must be greater than session.request_timeout_secs ({})",
                self.session.guard_timeout_secs,
                self.session.request_timeout_secs
            );
        }
        Ok(())
    }

    /// Endpoint to connect to; an explicit override wins over the file
    pub fn resolve_endpoint(&self, cli_override: Option<&str>) -> Result<String> {
        let raw = match cli_override.or(self.remote.endpoint.as_deref()) {
            Some(raw) if !raw.trim().is_empty() => raw.trim(),
            _ => bail!(
                "No MCP server endpoint configured. Set MCP_SERVER_URL, pass --endpoint, \
                 or add [remote] endpoint to {}",
                CONFIG_FILE
            ),
        };

        let expanded = shellexpand::env(raw)
            .with_context(|| format!("Failed to expand endpoint '{}'", raw))?;
        Ok(expanded.into_owned())
    }

    /// API key for the server, if any; an explicit override wins over the file
    pub fn resolve_api_key(&self, cli_override: Option<&str>) -> Result<Option<String>> {
        let raw = match cli_override.or(self.remote.api_key.as_deref()) {
            Some(raw) if !raw.trim().is_empty() => raw.trim(),
            _ => return Ok(None),
        };

        let expanded =
            shellexpand::env(raw).context("Failed to expand [remote] api_key")?;
        if expanded.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(expanded.into_owned()))
    }

    pub fn identity(&self) -> ClientIdentity {
        let defaults = ClientIdentity::default();
        ClientIdentity {
            name: self.remote.client_name.clone().unwrap_or(defaults.name),
            version: self.remote.client_version.clone().unwrap_or(defaults.version),
        }
    }

    pub fn connect_policy(&self) -> ConnectPolicy {
        ConnectPolicy {
            max_attempts: self.connect.max_attempts,
            attempt_timeout: Duration::from_secs(self.connect.attempt_timeout_secs),
            backoff: Duration::from_secs(self.connect.backoff_secs),
            initialize_timeout: Duration::from_secs(self.connect.initialize_timeout_secs),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            request_timeout: Duration::from_secs(self.session.request_timeout_secs),
            guard_timeout: Duration::from_secs(self.session.guard_timeout_secs),
            refresh_interval: Duration::from_secs(self.session.refresh_interval_secs),
            max_history: self.session.max_history,
            system_prompt: self.session.system_prompt.clone(),
        }
    }

    pub fn enumeration_timeout(&self) -> Duration {
        Duration::from_secs(self.session.enumeration_timeout_secs)
    }

    /// Pause before the background listener reconnects
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.session.reconnect_delay_secs)
    }
}
