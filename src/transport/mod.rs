//! Multi-channel UDP transport to the console.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐            ┌─────────────┐
//! │ Session                              │    UDP     │   Console   │
//! │  video   :50120 ── recv loop ──┐     │◀──────────▶│  (or bridge │
//! │  audio   :50121 ── recv loop ──┤     │            │   helper)   │
//! │  input   :50122 ── recv loop ──┼──▶ PacketHandler  └─────────────┘
//! │  command :50123 ── recv loop ──┘     │
//! │  message :50110   (send only)        │
//! └──────────────────────────────────────┘
//! ```
//!
//! Ports shift by the transport's offset; the console side of each channel
//! is 100 below the host side.

mod bridge;
mod channel;
mod direct;
mod error;
mod session;

use std::net::Ipv4Addr;

use crate::cancel::CancelToken;

pub use bridge::{BridgeSettings, BridgedTransport, ControlCode};
pub use channel::{is_stop_sentinel, Channel, ChannelSet, PortPlan, STOP_SENTINEL};
pub use direct::{DirectTransport, DEFAULT_CONSOLE_ADDRESS};
pub use error::TransportError;
pub use session::{ChannelSender, PacketHandler, Session};

/// How a session reaches the console.
///
/// [`Session`] calls [`prepare`](Self::prepare) before binding channels and
/// [`finish`](Self::finish) after its receive loops have exited. The
/// transport itself is dropped after the channels.
pub trait Transport: Send {
    /// Short name for logs and audit events.
    fn name(&self) -> &'static str;

    /// Port plan for the channels.
    fn ports(&self) -> PortPlan;

    /// Where channel traffic is sent.
    fn console_address(&self) -> Ipv4Addr;

    /// Make the transport ready for channels to be bound.
    fn prepare(&mut self, cancel: &CancelToken) -> Result<(), TransportError>;

    /// Release anything `prepare` acquired on the far side.
    fn finish(&mut self);
}
