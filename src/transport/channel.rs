//! Channel identities, port layout and the stop sentinel.

use std::fmt;

use tracing::trace;

/// Offset applied to every base port when running behind the bridge helper.
pub const BRIDGED_PORT_OFFSET: u16 = 200;

/// Distance between a host port and the matching console port.
const CONSOLE_PORT_DISTANCE: u16 = 100;

/// Payload that tells a receive loop to exit: `0xCAFEBABE` in host byte order.
pub const STOP_SENTINEL: [u8; 4] = 0xCAFE_BABE_u32.to_ne_bytes();

/// Whether a datagram is exactly the stop sentinel.
pub fn is_stop_sentinel(payload: &[u8]) -> bool {
    payload == STOP_SENTINEL
}

/// One of the five logical streams between host and console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Video frames from the console.
    Video,
    /// Audio from the console.
    Audio,
    /// Input reports to the console.
    Input,
    /// Out-of-band messages; send-only on the host side.
    Message,
    /// Command requests and replies.
    Command,
}

impl Channel {
    /// Order in which channels are opened. Teardown runs in reverse.
    pub const OPEN_ORDER: [Channel; 5] = [
        Channel::Video,
        Channel::Message,
        Channel::Input,
        Channel::Audio,
        Channel::Command,
    ];

    /// Channels that get a receive loop.
    pub const RECEIVING: [Channel; 4] = [
        Channel::Video,
        Channel::Audio,
        Channel::Input,
        Channel::Command,
    ];

    /// Channels woken with the stop sentinel on close.
    pub const SENTINEL_TARGETS: [Channel; 3] = [Channel::Video, Channel::Audio, Channel::Command];

    /// Host port before any instance offset.
    pub const fn base_port(self) -> u16 {
        match self {
            Channel::Message => 50110,
            Channel::Video => 50120,
            Channel::Audio => 50121,
            Channel::Input => 50122,
            Channel::Command => 50123,
        }
    }

    /// Lowercase name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Channel::Video => "video",
            Channel::Audio => "audio",
            Channel::Input => "input",
            Channel::Message => "message",
            Channel::Command => "command",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Port assignment for one transport instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPlan {
    /// Added to every base port.
    pub offset: u16,
}

impl PortPlan {
    /// Ports used when talking to the console directly.
    pub const DIRECT: PortPlan = PortPlan { offset: 0 };

    /// Ports used behind the bridge helper.
    pub const BRIDGED: PortPlan = PortPlan {
        offset: BRIDGED_PORT_OFFSET,
    };

    /// Plan with an arbitrary offset.
    pub const fn with_offset(offset: u16) -> Self {
        Self { offset }
    }

    /// Host port the channel binds.
    ///
    /// Saturates at 65535; check [`overflowing_channel`](Self::overflowing_channel)
    /// before binding.
    pub const fn local_port(&self, channel: Channel) -> u16 {
        channel.base_port().saturating_add(self.offset)
    }

    /// Host port the channel binds, or `None` if the offset overflows it.
    pub const fn checked_local_port(&self, channel: Channel) -> Option<u16> {
        channel.base_port().checked_add(self.offset)
    }

    /// First channel, in open order, whose port does not fit in a `u16`.
    pub fn overflowing_channel(&self) -> Option<Channel> {
        Channel::OPEN_ORDER
            .into_iter()
            .find(|channel| self.checked_local_port(*channel).is_none())
    }

    /// Console port the channel sends to.
    pub const fn remote_port(&self, channel: Channel) -> u16 {
        self.local_port(channel) - CONSOLE_PORT_DISTANCE
    }
}

impl Default for PortPlan {
    fn default() -> Self {
        Self::DIRECT
    }
}

/// The opened endpoints of a session, one per channel, in open order.
///
/// Dropping the set releases endpoints in reverse open order. A failed
/// [`open_with`](Self::open_with) drops what it already opened the same way.
pub struct ChannelSet<E> {
    opened: Vec<(Channel, E)>,
}

impl<E> ChannelSet<E> {
    /// Open every channel in [`Channel::OPEN_ORDER`] with `open`, stopping
    /// at the first failure.
    pub fn open_with<F, Err>(mut open: F) -> Result<Self, Err>
    where
        F: FnMut(Channel) -> Result<E, Err>,
    {
        let mut set = Self {
            opened: Vec::with_capacity(Channel::OPEN_ORDER.len()),
        };
        for channel in Channel::OPEN_ORDER {
            let endpoint = open(channel)?;
            set.opened.push((channel, endpoint));
        }
        Ok(set)
    }

    /// Endpoint for `channel`.
    pub fn get(&self, channel: Channel) -> Option<&E> {
        self.opened
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, e)| e)
    }

    /// Endpoints in open order.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, &E)> {
        self.opened.iter().map(|(c, e)| (*c, e))
    }
}

impl<E> Drop for ChannelSet<E> {
    fn drop(&mut self) {
        while let Some((channel, endpoint)) = self.opened.pop() {
            trace!("Closing {} channel", channel);
            drop(endpoint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorded {
        channel: Channel,
        log: Arc<Mutex<Vec<Channel>>>,
    }

    impl Drop for Recorded {
        fn drop(&mut self) {
            self.log.lock().unwrap().push(self.channel);
        }
    }

    #[test]
    fn test_port_layout() {
        assert_eq!(PortPlan::DIRECT.local_port(Channel::Message), 50110);
        assert_eq!(PortPlan::DIRECT.local_port(Channel::Video), 50120);
        assert_eq!(PortPlan::DIRECT.local_port(Channel::Audio), 50121);
        assert_eq!(PortPlan::DIRECT.local_port(Channel::Input), 50122);
        assert_eq!(PortPlan::DIRECT.local_port(Channel::Command), 50123);

        assert_eq!(PortPlan::DIRECT.remote_port(Channel::Video), 50020);
        assert_eq!(PortPlan::BRIDGED.local_port(Channel::Video), 50320);
        assert_eq!(PortPlan::BRIDGED.remote_port(Channel::Command), 50223);
    }

    #[test]
    fn test_offset_past_port_range() {
        assert_eq!(PortPlan::BRIDGED.overflowing_channel(), None);
        assert_eq!(PortPlan::with_offset(15412).overflowing_channel(), None);

        // 50123 + 15413 = 65536
        let plan = PortPlan::with_offset(15413);
        assert_eq!(plan.overflowing_channel(), Some(Channel::Command));
        assert_eq!(plan.checked_local_port(Channel::Command), None);
        assert_eq!(plan.checked_local_port(Channel::Input), Some(65535));

        let plan = PortPlan::with_offset(20000);
        assert_eq!(plan.overflowing_channel(), Some(Channel::Message));
        assert_eq!(plan.local_port(Channel::Video), u16::MAX);
    }

    #[test]
    fn test_stop_sentinel() {
        assert_eq!(STOP_SENTINEL, 0xCAFEBABE_u32.to_ne_bytes());
        assert!(is_stop_sentinel(&STOP_SENTINEL));
        assert!(!is_stop_sentinel(&0xCAFEBABE_u32.swap_bytes().to_ne_bytes()));
        assert!(!is_stop_sentinel(&[0xCA, 0xFE, 0xBA]));
        let mut longer = STOP_SENTINEL.to_vec();
        longer.push(0);
        assert!(!is_stop_sentinel(&longer));
    }

    #[test]
    fn test_receiving_channels_exclude_message() {
        assert!(!Channel::RECEIVING.contains(&Channel::Message));
        assert_eq!(Channel::RECEIVING.len(), 4);
    }

    #[test]
    fn test_drop_order_is_reverse_open_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let set = ChannelSet::open_with(|channel| {
            Ok::<_, ()>(Recorded {
                channel,
                log: Arc::clone(&log),
            })
        })
        .unwrap();

        assert_eq!(
            set.iter().map(|(c, _)| c).collect::<Vec<_>>(),
            Channel::OPEN_ORDER.to_vec()
        );
        drop(set);

        let mut expected = Channel::OPEN_ORDER.to_vec();
        expected.reverse();
        assert_eq!(*log.lock().unwrap(), expected);
    }

    #[test]
    fn test_partial_open_unwinds_in_reverse() {
        // Fail at each position k and check exactly 1..k-1 were closed, last first
        for fail_at in 0..Channel::OPEN_ORDER.len() {
            let log = Arc::new(Mutex::new(Vec::new()));
            let failing = Channel::OPEN_ORDER[fail_at];

            let result = ChannelSet::open_with(|channel| {
                if channel == failing {
                    return Err(channel);
                }
                Ok(Recorded {
                    channel,
                    log: Arc::clone(&log),
                })
            });

            assert_eq!(result.err(), Some(failing));
            let mut expected = Channel::OPEN_ORDER[..fail_at].to_vec();
            expected.reverse();
            assert_eq!(*log.lock().unwrap(), expected);
        }
    }
}
