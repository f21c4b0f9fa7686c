use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::watch;
use tokio::time::Instant;

use remote_agent::cli::{Cli, Commands, Repl};
use remote_agent::config::AgentFileConfig;
use remote_agent::logging::init_tracing;
use remote_agent::mcp::{
    parse_endpoint, RemoteTransportFactory, Supervisor, ToolSet, ToolSetRefresher,
    TransportError,
};
use remote_agent::output::{default_output, OutputEvent, OutputWriter};
use remote_agent::session::{spawn_reconnect_listener, Session, ToolCallExecutorFactory};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = default_output(cli.verbose > 0);

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli, output.as_ref()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(output.as_ref(), &e);
            ExitCode::FAILURE
        }
    }
}

/// Single place where a fatal error reaches the user
fn report_error(output: &dyn OutputWriter, err: &anyhow::Error) {
    let text = format!("{:#}", err);
    output.write(OutputEvent::Error(text.clone()));
    if let Some(hint) = auth_hint(&text) {
        output.write(OutputEvent::Status(hint.to_string()));
    }
    output.flush();
}

fn auth_hint(text: &str) -> Option<&'static str> {
    if text.contains("401") || text.contains("Unauthorized") {
        Some("The server rejected this client. Check the API key (--api-key, MCP_API_KEY or [remote] api_key).")
    } else {
        None
    }
}

async fn run(cli: Cli, output: &dyn OutputWriter) -> Result<()> {
    let config = match &cli.config {
        Some(path) => AgentFileConfig::load_from_path(path)?,
        None => AgentFileConfig::load()?,
    };

    let endpoint = config.resolve_endpoint(cli.endpoint.as_deref())?;
    parse_endpoint(&endpoint)?;

    let api_key = config.resolve_api_key(cli.api_key.as_deref())?;
    if api_key.is_none() {
        tracing::debug!("No API key configured, connecting unauthenticated");
    }

    let identity = config.identity();
    let factory = RemoteTransportFactory::new(identity.clone()).with_api_key(api_key);
    let supervisor = Arc::new(Supervisor::new(
        endpoint,
        Arc::new(factory),
        config.connect_policy(),
        identity,
    ));
    let refresher = ToolSetRefresher::new(config.enumeration_timeout());

    let result = match cli.command() {
        Commands::Chat => run_chat(&config, supervisor.clone(), refresher, output).await,
        Commands::Tools => run_tools(&supervisor, &refresher, output).await,
        Commands::Call { tool, args } => {
            run_call(&config, &supervisor, tool, args.as_deref(), output).await
        }
    };

    supervisor.shutdown().await;
    result
}

async fn run_chat(
    config: &AgentFileConfig,
    supervisor: Arc<Supervisor>,
    refresher: ToolSetRefresher,
    output: &dyn OutputWriter,
) -> Result<()> {
    output.write(OutputEvent::Status(format!(
        "Connecting to {}...",
        supervisor.endpoint()
    )));

    let (publish, updates) = watch::channel(ToolSet::default());
    let signal = supervisor
        .reconnect_signal()
        .context("Reconnect signal already in use")?;

    let mut session = Session::start(
        supervisor.clone(),
        refresher.clone(),
        Arc::new(ToolCallExecutorFactory::new(supervisor.clone())),
        config.session_config(),
        updates,
    )
    .await
    .context("Failed to load tools from the MCP server")?;

    let listener = spawn_reconnect_listener(
        supervisor,
        refresher,
        signal,
        publish,
        config.reconnect_delay(),
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let mut repl = Repl::new(&mut session, output);
    if !atty::is(atty::Stream::Stdin) {
        repl = repl.without_prompt();
    }
    let result = repl.run(stdin).await;

    listener.stop().await;
    result
}

async fn run_tools(
    supervisor: &Supervisor,
    refresher: &ToolSetRefresher,
    output: &dyn OutputWriter,
) -> Result<()> {
    let tools = refresher
        .refresh(supervisor)
        .await
        .context("Failed to list tools")?;

    if tools.is_empty() {
        output.write(OutputEvent::Status("No tools found.".into()));
        return Ok(());
    }

    output.write(OutputEvent::System(format!(
        "{} tools at {}",
        tools.len(),
        supervisor.endpoint()
    )));
    for tool in &tools {
        output.write(OutputEvent::ToolEntry {
            name: tool.name.clone(),
            description: tool.summary().to_string(),
        });
    }
    output.flush();
    Ok(())
}

async fn run_call(
    config: &AgentFileConfig,
    supervisor: &Supervisor,
    tool: &str,
    args: Option<&str>,
    output: &dyn OutputWriter,
) -> Result<()> {
    let arguments = match args {
        Some(json) => Some(
            serde_json::from_str(json).with_context(|| format!("Invalid --args JSON: {}", json))?,
        ),
        None => None,
    };

    let handle = supervisor.acquire().await?;

    let timeout = config.session_config().request_timeout;
    let started = Instant::now();
    let result = match tokio::time::timeout(timeout, handle.call_tool(tool, arguments)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::timeout("call_tool", timeout)),
    };

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            if e.is_transport() {
                supervisor.report_failure(&e).await;
            }
            return Err(e).with_context(|| format!("Tool '{}' failed", tool));
        }
    };

    output.write(OutputEvent::ToolComplete {
        name: tool.to_string(),
        result: result.text,
        duration: started.elapsed(),
        is_error: result.is_error,
    });
    output.flush();

    if result.is_error {
        anyhow::bail!("Tool '{}' reported an error", tool);
    }
    Ok(())
}
