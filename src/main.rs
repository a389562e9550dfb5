//! padlink: GamePad link client
//!
//! This is the main entry point for the padlink binary. It handles CLI argument
//! parsing, configuration loading, telemetry initialization, and dispatches the
//! subcommand.
//!
//! # I/O Architecture
//!
//! - **Audit logging**: Goes to syslog (not stdout/stderr)
//! - **Debug logging**: `tracing` output on stderr, filtered by `-v`
//! - **Results**: Printed to stdout by the subcommand

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use padlink::{
    cancel::CancelToken,
    cli::Cli,
    cli_handler::{CommandContext, handle_command},
    config::{ConfigLoader, LinkSettings},
    telemetry::AuditLogger,
};
use tracing::{debug, warn};

fn main() -> Result<()> {
    // Parse CLI arguments first (before any other initialization)
    let cli = Cli::parse();

    // Load configuration with hierarchy merging; it may set the log level
    let config = ConfigLoader::new()
        .load(cli.config.as_deref())
        .context("Failed to load configuration")?;

    init_tracing(cli.verbose, &config.general.log_level)?;

    debug!("Parsed CLI arguments: {:?}", cli);
    debug!("Loaded configuration: {:?}", config);

    let settings = LinkSettings::from_config(&config).context("Invalid configuration")?;

    // Audit events are best-effort when no syslog daemon is reachable
    let audit = match AuditLogger::new() {
        Ok(logger) => logger,
        Err(e) => {
            warn!("Audit logging disabled: {}", e);
            AuditLogger::new_null()
        }
    };

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        handler_token.raise();
    })
    .context("Failed to install Ctrl-C handler")?;

    let ctx = CommandContext {
        settings,
        audit: Arc::new(audit),
        cancel,
    };
    handle_command(cli.command, &ctx)
}

/// Initialize the tracing subscriber for debug/development logging.
///
/// This is separate from the audit telemetry which goes to syslog.
///
/// # Verbosity Levels
/// - 0 (default): `RUST_LOG`, else the configured level, else warnings
/// - 1 (-v): Info level
/// - 2 (-vv): Debug level
/// - 3+ (-vvv): Trace level
fn init_tracing(verbose: u8, configured: &str) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if configured.is_empty() { "warn" } else { configured })
        }),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
