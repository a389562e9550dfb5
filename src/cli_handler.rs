//! Subcommand handling for padlink.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use crate::cancel::CancelToken;
use crate::cli::Commands;
use crate::config::LinkSettings;
use crate::error::LinkError;
use crate::orchestrator::Orchestrator;
use crate::supplicant::config_file::pinned_bssid;
use crate::telemetry::AuditLogger;
use crate::transport::{
    BridgedTransport, Channel, DirectTransport, PacketHandler, Session, Transport,
};

/// What every subcommand runs with.
pub struct CommandContext {
    /// Resolved settings.
    pub settings: LinkSettings,
    /// Audit sink shared with sessions.
    pub audit: Arc<AuditLogger>,
    /// Raised by Ctrl-C.
    pub cancel: CancelToken,
}

/// Handle a parsed subcommand.
pub fn handle_command(command: Commands, ctx: &CommandContext) -> Result<()> {
    match command {
        Commands::Pair { interface, pin } => pair(ctx, &interface, pin),
        Commands::Connect { interface } => connect(ctx, &interface),
        Commands::Bridge { helper } => {
            let transport = BridgedTransport::new(ctx.settings.bridge(helper));
            let tally = run_session(ctx, Box::new(transport))
                .or_else(cancelled_ok)
                .with_context(|| format!("Bridged session via {} failed", helper))?;
            tally.report();
            Ok(())
        }
        Commands::Status => {
            status(&ctx.settings);
            Ok(())
        }
    }
}

fn orchestrator(ctx: &CommandContext) -> Orchestrator {
    Orchestrator::new(ctx.settings.clone()).with_audit(Arc::clone(&ctx.audit))
}

fn pair(ctx: &CommandContext, interface: &str, pin: u16) -> Result<()> {
    match orchestrator(ctx).pair(interface, pin, &ctx.cancel) {
        Ok(artifact) => {
            println!(
                "Paired with {}; connect config written to {}",
                artifact.bssid,
                artifact.connect_config_path.display()
            );
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            println!("Pairing cancelled");
            Ok(())
        }
        Err(e) => Err(e).context(format!("Pairing on {} failed", interface)),
    }
}

fn connect(ctx: &CommandContext, interface: &str) -> Result<()> {
    let console = ctx.settings.console;
    let tally = orchestrator(ctx)
        .connect(interface, &ctx.cancel, |_| {
            run_session(ctx, Box::new(DirectTransport::new(console)))
        })
        .or_else(cancelled_ok)
        .with_context(|| format!("Connecting on {} failed", interface))?;

    tally.report();
    Ok(())
}

/// Open a session over `transport` and hold it until Ctrl-C.
fn run_session(ctx: &CommandContext, transport: Box<dyn Transport>) -> Result<Arc<PacketTally>, LinkError> {
    let tally = Arc::new(PacketTally::default());
    let session = Session::open_with_audit(
        transport,
        Arc::clone(&tally) as Arc<dyn PacketHandler>,
        &ctx.cancel,
        Some(Arc::clone(&ctx.audit)),
    )?;

    info!("Session open, press Ctrl-C to stop");
    session.run_until_cancelled(&ctx.cancel);
    Ok(tally)
}

/// Cancellation by Ctrl-C ends a command normally.
fn cancelled_ok(e: LinkError) -> Result<Arc<PacketTally>, LinkError> {
    if e.is_cancelled() {
        info!("Cancelled before the session opened");
        Ok(Arc::new(PacketTally::default()))
    } else {
        Err(e)
    }
}

fn status(settings: &LinkSettings) {
    let connect_config = settings.connect_config_path();
    match fs::read_to_string(&connect_config) {
        Ok(contents) => println!(
            "Paired:      yes ({}, {})",
            pinned_bssid(&contents).unwrap_or("no BSSID"),
            connect_config.display()
        ),
        Err(_) => println!("Paired:      no ({} missing)", connect_config.display()),
    }
    println!("Control dir: {}", settings.ctrl_dir.display());
    println!("Console:     {}", settings.console);

    let programs = [
        ("supplicant", settings.supplicant.as_path()),
        ("dhcp client", settings.dhcp.program.as_path()),
        ("nmcli", Path::new("nmcli")),
        ("ip", Path::new("ip")),
        ("killall", Path::new("killall")),
    ];
    for (label, program) in programs {
        match resolve_program(program) {
            Some(found) => println!("{:<12} {}", format!("{}:", label), found),
            None => println!("{:<12} not found ({})", format!("{}:", label), program.display()),
        }
    }
}

/// Absolute paths must exist; bare names are looked up on `PATH`.
fn resolve_program(program: &Path) -> Option<String> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.display().to_string());
    }
    which::which(program).ok().map(|p| p.display().to_string())
}

/// Counts datagrams per channel.
#[derive(Debug, Default)]
pub struct PacketTally {
    counts: [AtomicU64; 5],
    bytes: [AtomicU64; 5],
}

impl PacketTally {
    fn slot(channel: Channel) -> usize {
        Channel::OPEN_ORDER
            .iter()
            .position(|c| *c == channel)
            .unwrap_or_default()
    }

    /// Datagrams received on `channel`.
    pub fn packets(&self, channel: Channel) -> u64 {
        self.counts[Self::slot(channel)].load(Ordering::Relaxed)
    }

    fn report(&self) {
        for channel in Channel::RECEIVING {
            let slot = Self::slot(channel);
            println!(
                "{:<8} {} packets, {} bytes",
                channel.name(),
                self.counts[slot].load(Ordering::Relaxed),
                self.bytes[slot].load(Ordering::Relaxed)
            );
        }
    }
}

impl PacketHandler for PacketTally {
    fn on_packet(&self, channel: Channel, payload: &[u8]) {
        let slot = Self::slot(channel);
        self.counts[slot].fetch_add(1, Ordering::Relaxed);
        self.bytes[slot].fetch_add(payload.len() as u64, Ordering::Relaxed);
    }
}
