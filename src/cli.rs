//! Command-line interface definitions for padlink.
//!
//! Uses clap's derive API for type-safe argument parsing.

use clap::{Parser, Subcommand};
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// GamePad link client.
///
/// Pairs a wireless interface with a console over WPS, brings the link up
/// and runs the five-channel UDP session until interrupted.
#[derive(Parser, Debug)]
#[command(name = "padlink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to additional config file.
    ///
    /// This config file is merged on top of system and user configs,
    /// giving it the highest priority.
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity.
    ///
    /// Can be specified multiple times:
    /// -v    = info level
    /// -vv   = debug level
    /// -vvv  = trace level
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Subcommands for padlink.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pair with a console using the PIN shown on its screen.
    ///
    /// Scans until a console accepts the PIN, then stores a connect
    /// configuration for later `connect` runs.
    Pair {
        /// Wireless interface to pair on.
        #[arg(short = 'i', long = "interface", value_name = "IFACE")]
        interface: String,

        /// 4-digit code shown by the console.
        #[arg(short = 'p', long = "pin", value_name = "NNNN", value_parser = parse_pin)]
        pin: u16,
    },

    /// Connect to the paired console and run a session until Ctrl-C.
    Connect {
        /// Wireless interface to connect on.
        #[arg(short = 'i', long = "interface", value_name = "IFACE")]
        interface: String,
    },

    /// Run a session through a bridge helper that owns the link.
    Bridge {
        /// Address of the bridge helper.
        #[arg(long = "helper", value_name = "ADDR")]
        helper: Ipv4Addr,
    },

    /// Show pairing state and whether required programs are installed.
    Status,
}

/// Accept exactly four decimal digits.
fn parse_pin(value: &str) -> Result<u16, String> {
    if value.len() != 4 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{}' is not a 4-digit PIN", value));
    }
    value.parse().map_err(|e| format!("{}", e))
}
