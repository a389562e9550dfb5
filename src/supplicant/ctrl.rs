//! Supplicant control socket client.
//!
//! The supplicant listens on a Unix datagram socket at `<ctrl dir>/<iface>`.
//! A client binds its own datagram socket, sends one command per datagram and
//! reads one reply per datagram. After `ATTACH`, unsolicited `<N>`-prefixed
//! event datagrams are interleaved with replies.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tracing::{debug, trace};

use super::error::CtrlError;

/// Largest reply read from the control socket.
const MAX_REPLY_SIZE: usize = 16 * 1024;

/// How long a command waits for its reply.
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

static CLIENT_COUNTER: AtomicU32 = AtomicU32::new(0);

/// A command/reply session with the supplicant.
pub trait ControlChannel: Send {
    /// Send `command` and return its reply.
    fn request(&mut self, command: &str) -> Result<String, CtrlError>;

    /// Subscribe to unsolicited events.
    fn attach(&mut self) -> Result<(), CtrlError>;

    /// Unsubscribe from unsolicited events.
    fn detach(&mut self) -> Result<(), CtrlError>;

    /// Whether an event is waiting to be read. Does not block.
    fn pending(&mut self) -> Result<bool, CtrlError>;

    /// Read the next event, blocking if none is queued.
    fn recv(&mut self) -> Result<String, CtrlError>;
}

/// Opens control channels by socket path.
pub trait ControlConnector: Send + Sync {
    /// Connect to the control socket at `path`.
    ///
    /// Returns [`CtrlError::Unavailable`] while the socket does not exist.
    fn open(&self, path: &Path) -> Result<Box<dyn ControlChannel>, CtrlError>;
}

/// Connector for real supplicant sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixConnector;

impl ControlConnector for UnixConnector {
    fn open(&self, path: &Path) -> Result<Box<dyn ControlChannel>, CtrlError> {
        Ok(Box::new(UnixControlChannel::open(path)?))
    }
}

/// Control channel over a Unix datagram socket.
#[derive(Debug)]
pub struct UnixControlChannel {
    socket: UnixDatagram,
    local_path: PathBuf,
    backlog: VecDeque<String>,
    attached: bool,
}

impl UnixControlChannel {
    /// Bind a client socket and connect it to `path`.
    pub fn open(path: &Path) -> Result<Self, CtrlError> {
        let local_path = std::env::temp_dir().join(format!(
            "padlink_ctrl_{}-{}",
            std::process::id(),
            CLIENT_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_file(&local_path);

        let socket = UnixDatagram::bind(&local_path).map_err(|e| CtrlError::io("bind", e))?;

        if let Err(e) = socket.connect(path) {
            let _ = std::fs::remove_file(&local_path);
            return Err(match e.kind() {
                ErrorKind::NotFound | ErrorKind::ConnectionRefused => CtrlError::Unavailable {
                    path: path.to_path_buf(),
                },
                _ => CtrlError::io("connect", e),
            });
        }

        if let Err(e) = socket.set_read_timeout(Some(REPLY_TIMEOUT)) {
            let _ = std::fs::remove_file(&local_path);
            return Err(CtrlError::io("configure", e));
        }

        debug!("Opened control socket {:?}", path);
        Ok(Self {
            socket,
            local_path,
            backlog: VecDeque::new(),
            attached: false,
        })
    }

    fn recv_datagram(&self, command: &str) -> Result<String, CtrlError> {
        let mut buf = vec![0u8; MAX_REPLY_SIZE];
        match self.socket.recv(&mut buf) {
            Ok(n) => Ok(String::from_utf8_lossy(&buf[..n]).into_owned()),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Err(CtrlError::Timeout {
                    command: command.to_string(),
                })
            }
            Err(e) => Err(CtrlError::io("recv", e)),
        }
    }

    fn expect_ok(&mut self, command: &str) -> Result<(), CtrlError> {
        let reply = self.request(command)?;
        if reply.trim_end() == "OK" {
            Ok(())
        } else {
            Err(CtrlError::Rejected {
                command: command.to_string(),
                reply: reply.trim_end().to_string(),
            })
        }
    }
}

impl ControlChannel for UnixControlChannel {
    fn request(&mut self, command: &str) -> Result<String, CtrlError> {
        trace!("ctrl > {}", command);
        self.socket
            .send(command.as_bytes())
            .map_err(|e| CtrlError::io("send", e))?;

        loop {
            let reply = self.recv_datagram(command)?;
            if self.attached && reply.starts_with('<') {
                trace!("ctrl event queued: {}", reply.trim_end());
                self.backlog.push_back(reply);
                continue;
            }
            trace!("ctrl < {}", reply.trim_end());
            return Ok(reply);
        }
    }

    fn attach(&mut self) -> Result<(), CtrlError> {
        self.expect_ok("ATTACH")?;
        self.attached = true;
        Ok(())
    }

    fn detach(&mut self) -> Result<(), CtrlError> {
        self.expect_ok("DETACH")?;
        self.attached = false;
        Ok(())
    }

    fn pending(&mut self) -> Result<bool, CtrlError> {
        if !self.backlog.is_empty() {
            return Ok(true);
        }

        self.socket
            .set_nonblocking(true)
            .map_err(|e| CtrlError::io("configure", e))?;
        let polled = self.recv_datagram("<pending>");
        self.socket
            .set_nonblocking(false)
            .map_err(|e| CtrlError::io("configure", e))?;

        match polled {
            Ok(event) => {
                self.backlog.push_back(event);
                Ok(true)
            }
            Err(CtrlError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn recv(&mut self) -> Result<String, CtrlError> {
        match self.backlog.pop_front() {
            Some(event) => Ok(event),
            None => self.recv_datagram("<event>"),
        }
    }
}

impl Drop for UnixControlChannel {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.local_path);
    }
}
