//! External program execution.
//!
//! The supplicant, the DHCP client, `ip`, `nmcli` and `killall` are all driven
//! through [`ProcessRunner`]. Long-lived children are wrapped in
//! [`ManagedProcess`], which terminates them when dropped.

mod error;
mod handle;
mod runner;

pub use error::ProcessError;
pub use handle::{ManagedProcess, MarkerWait};
pub use runner::{
    ChildProcess, CommandSpec, LineRead, OutputStream, ProcessOutput, ProcessRunner, SystemRunner,
};

#[cfg(test)]
pub(crate) mod testing;
