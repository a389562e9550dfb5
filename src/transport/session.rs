//! Multi-channel UDP session.
//!
//! A [`Session`] binds one UDP socket per [`Channel`] and runs a receive
//! thread for each receiving channel. Payloads go to a [`PacketHandler`].
//! Closing sends the stop sentinel to the blocking loops over loopback, joins
//! every thread, then releases sockets in reverse open order.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use super::Transport;
use super::channel::{is_stop_sentinel, Channel, ChannelSet, PortPlan, STOP_SENTINEL};
use super::error::TransportError;
use crate::cancel::CancelToken;
use crate::telemetry::{AuditEvent, AuditLogger};

/// Maximum UDP datagram size.
const MAX_DATAGRAM_SIZE: usize = 65536;

/// Receive timeout on the INPUT socket, whose loop gets no stop sentinel and
/// has to notice the stopping flag on its own.
const RECV_POLL: Duration = Duration::from_millis(200);

/// How often [`Session::run_until_cancelled`] checks the token.
const CANCEL_POLL: Duration = Duration::from_millis(250);

/// Receives payloads from the session's receive loops.
///
/// Called concurrently from one thread per receiving channel.
pub trait PacketHandler: Send + Sync + 'static {
    /// Handle one datagram.
    fn on_packet(&self, channel: Channel, payload: &[u8]);
}

impl<F> PacketHandler for F
where
    F: Fn(Channel, &[u8]) + Send + Sync + 'static,
{
    fn on_packet(&self, channel: Channel, payload: &[u8]) {
        self(channel, payload)
    }
}

/// Cloneable send handle that does not keep the session's sockets alive.
#[derive(Clone)]
pub struct ChannelSender {
    sockets: Vec<(Channel, Weak<UdpSocket>)>,
    console: Ipv4Addr,
    ports: PortPlan,
}

impl ChannelSender {
    /// Send `payload` to the console's port for `channel`.
    pub fn send(&self, channel: Channel, payload: &[u8]) -> Result<(), TransportError> {
        let socket = self
            .sockets
            .iter()
            .find(|(c, _)| *c == channel)
            .and_then(|(_, s)| s.upgrade())
            .ok_or(TransportError::Closed(channel))?;

        let dest = SocketAddrV4::new(self.console, self.ports.remote_port(channel));
        socket
            .send_to(payload, dest)
            .map_err(|source| TransportError::Send { channel, source })?;
        Ok(())
    }
}

/// An open five-channel session.
pub struct Session {
    transport: Option<Box<dyn Transport>>,
    channels: Option<ChannelSet<Arc<UdpSocket>>>,
    loops: Vec<(Channel, JoinHandle<()>)>,
    stopping: Arc<AtomicBool>,
    sender: ChannelSender,
    started: Instant,
    audit: Option<Arc<AuditLogger>>,
    closed: bool,
}

impl Session {
    /// Prepare `transport`, bind all channels and start the receive loops.
    ///
    /// If any channel fails to bind, the channels already bound are closed in
    /// reverse order and the transport is finished before returning. A port
    /// plan that does not fit in the port range fails before anything is
    /// prepared or bound.
    pub fn open(
        transport: Box<dyn Transport>,
        handler: Arc<dyn PacketHandler>,
        cancel: &CancelToken,
    ) -> Result<Self, TransportError> {
        Self::open_with_audit(transport, handler, cancel, None)
    }

    /// [`open`](Self::open) with session start/end audit events.
    pub fn open_with_audit(
        mut transport: Box<dyn Transport>,
        handler: Arc<dyn PacketHandler>,
        cancel: &CancelToken,
        audit: Option<Arc<AuditLogger>>,
    ) -> Result<Self, TransportError> {
        let ports = transport.ports();
        if let Some(channel) = ports.overflowing_channel() {
            return Err(TransportError::PortRange {
                channel,
                offset: ports.offset,
            });
        }

        transport.prepare(cancel)?;

        let channels = match ChannelSet::open_with(|channel| bind_channel(channel, ports.local_port(channel))) {
            Ok(channels) => channels,
            Err(e) => {
                transport.finish();
                return Err(e);
            }
        };

        let sender = ChannelSender {
            sockets: channels
                .iter()
                .map(|(c, s)| (c, Arc::downgrade(s)))
                .collect(),
            console: transport.console_address(),
            ports,
        };

        info!(
            "Opened {} session: console {}, ports offset {}",
            transport.name(),
            sender.console,
            ports.offset
        );
        if let Some(ref audit) = audit {
            audit.log(AuditEvent::SessionStart {
                transport: transport.name().to_string(),
                port_offset: ports.offset,
            });
        }

        let mut session = Self {
            transport: Some(transport),
            channels: Some(channels),
            loops: Vec::with_capacity(Channel::RECEIVING.len()),
            stopping: Arc::new(AtomicBool::new(false)),
            sender,
            started: Instant::now(),
            audit,
            closed: false,
        };

        for channel in Channel::RECEIVING {
            if let Err(e) = session.start_loop(channel, Arc::clone(&handler)) {
                session.close();
                return Err(e);
            }
        }

        Ok(session)
    }

    fn start_loop(&mut self, channel: Channel, handler: Arc<dyn PacketHandler>) -> Result<(), TransportError> {
        let socket = self
            .channels
            .as_ref()
            .and_then(|set| set.get(channel))
            .map(Arc::clone)
            .ok_or(TransportError::Closed(channel))?;
        let stopping = Arc::clone(&self.stopping);

        let handle = thread::Builder::new()
            .name(format!("padlink-{}", channel))
            .spawn(move || receive_loop(channel, socket, handler, stopping))
            .map_err(|source| TransportError::Thread { channel, source })?;

        self.loops.push((channel, handle));
        Ok(())
    }

    /// Best-effort send to the console's port for `channel`.
    pub fn send(&self, channel: Channel, payload: &[u8]) -> Result<(), TransportError> {
        self.sender.send(channel, payload)
    }

    /// Send handle usable from handlers and other threads.
    pub fn sender(&self) -> ChannelSender {
        self.sender.clone()
    }

    /// Host port bound for `channel`.
    pub fn local_port(&self, channel: Channel) -> u16 {
        self.sender.ports.local_port(channel)
    }

    /// Block until `cancel` is raised, then close.
    pub fn run_until_cancelled(mut self, cancel: &CancelToken) {
        while !cancel.is_raised() {
            thread::sleep(CANCEL_POLL);
        }
        self.close();
    }

    /// Stop all receive loops and release every socket. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stopping.store(true, Ordering::SeqCst);

        self.send_stop_sentinels();

        for (channel, handle) in self.loops.drain(..) {
            if handle.join().is_err() {
                warn!("{} receive loop panicked", channel);
            }
        }

        if let Some(ref mut transport) = self.transport {
            transport.finish();
        }

        drop(self.channels.take());

        if let Some(transport) = self.transport.take() {
            let name = transport.name();
            drop(transport);

            let duration_sec = self.started.elapsed().as_secs();
            info!("Closed {} session after {}s", name, duration_sec);
            if let Some(ref audit) = self.audit {
                audit.log(AuditEvent::SessionEnd {
                    transport: name.to_string(),
                    duration_sec,
                });
            }
        }
    }

    fn send_stop_sentinels(&self) {
        let Some(message) = self.channels.as_ref().and_then(|set| set.get(Channel::Message)) else {
            return;
        };

        for channel in Channel::SENTINEL_TARGETS {
            let target = SocketAddrV4::new(Ipv4Addr::LOCALHOST, self.local_port(channel));
            if let Err(e) = message.send_to(&STOP_SENTINEL, target) {
                warn!("Failed to send stop sentinel to {} loop: {}", channel, e);
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

fn bind_channel(channel: Channel, port: u16) -> Result<Arc<UdpSocket>, TransportError> {
    let bind_err = |source| TransportError::Bind { channel, port, source };

    let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).map_err(bind_err)?;
    if channel == Channel::Input {
        socket.set_read_timeout(Some(RECV_POLL)).map_err(bind_err)?;
    }

    debug!("Bound {} channel on port {}", channel, port);
    Ok(Arc::new(socket))
}

fn receive_loop(
    channel: Channel,
    socket: Arc<UdpSocket>,
    handler: Arc<dyn PacketHandler>,
    stopping: Arc<AtomicBool>,
) {
    debug!("{} receive loop started", channel);
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    while !stopping.load(Ordering::SeqCst) {
        let len = match socket.recv_from(&mut buf) {
            Ok((len, _src)) => len,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(e) => {
                if !stopping.load(Ordering::SeqCst) {
                    warn!("{} receive failed: {}", channel, e);
                }
                break;
            }
        };

        let payload = &buf[..len];
        if is_stop_sentinel(payload) {
            debug!("{} loop received stop sentinel", channel);
            break;
        }

        trace!("{}: {} bytes", channel, len);
        handler.on_packet(channel, payload);
    }

    debug!("{} receive loop exited", channel);
}
