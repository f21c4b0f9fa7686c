//! Tracing setup
//!
//! Logs go to stderr so they never interleave with replies on stdout.
//! `RUST_LOG` takes precedence over the verbosity flag; `LOG_FORMAT=json`
//! switches to structured JSON lines.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default level for this crate given the number of `-v` flags
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize the global subscriber. Call once, before anything logs.
pub fn init_tracing(verbosity: u8) -> anyhow::Result<()> {
    let directive = format!("remote_agent={}", level_for_verbosity(verbosity));
    let filter = match std::env::var("RUST_LOG") {
        Ok(value) if !value.is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::new("warn").add_directive(directive.parse()?),
    };

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(atty::is(atty::Stream::Stderr)),
            )
            .try_init()?;
    }

    Ok(())
}
