//! Transport abstraction for bootcable communication
//!
//! The protocol engine only needs synchronous bulk writes and reads with a
//! per-call timeout, plus a way to wait out the firmware's settle delay.

use std::fmt;
use std::time::Duration;

use crate::error::LinkError;
use crate::protocol::{EP_BULK_OUT, EP_COMMAND, EP_STATUS_IN};

/// Logical channel of the bootcable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Host to device control messages
    Command,
    /// Device to host status words
    StatusIn,
    /// Host to device payload data
    BulkOut,
}

impl Channel {
    /// USB endpoint address backing this channel
    pub const fn endpoint(self) -> u8 {
        match self {
            Channel::Command => EP_COMMAND,
            Channel::StatusIn => EP_STATUS_IN,
            Channel::BulkOut => EP_BULK_OUT,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Command => "command",
            Channel::StatusIn => "status-in",
            Channel::BulkOut => "bulk-out",
        };
        write!(f, "{} (EP 0x{:02X})", name, self.endpoint())
    }
}

/// Bulk transport to one bootcable
///
/// Both transfer calls return the number of bytes actually moved. A count
/// different from the request is not an error at this layer; the protocol
/// engine decides what a short transfer means.
pub trait Transport {
    /// Write `data` to an OUT channel
    fn write(
        &mut self,
        channel: Channel,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, LinkError>;

    /// Read up to `buf.len()` bytes from an IN channel
    fn read(
        &mut self,
        channel: Channel,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, LinkError>;

    /// Wait for the device to settle after a command
    fn settle(&mut self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(
        &mut self,
        channel: Channel,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, LinkError> {
        (**self).write(channel, data, timeout)
    }

    fn read(
        &mut self,
        channel: Channel,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, LinkError> {
        (**self).read(channel, buf, timeout)
    }

    fn settle(&mut self, delay: Duration) {
        (**self).settle(delay)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(
        &mut self,
        channel: Channel,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, LinkError> {
        (**self).write(channel, data, timeout)
    }

    fn read(
        &mut self,
        channel: Channel,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, LinkError> {
        (**self).read(channel, buf, timeout)
    }

    fn settle(&mut self, delay: Duration) {
        (**self).settle(delay)
    }
}
