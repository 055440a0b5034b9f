//! Error types for optusb-core

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::negotiation::Step;
use crate::protocol::{CableStatus, MAGIC, MAX_IMAGE_SIZE, STATUS_SENTINEL};

/// Result type for bootcable operations
pub type Result<T> = core::result::Result<T, Error>;

/// Failure reported by a [`Transport`](crate::Transport) implementation
///
/// Carries the USB library's own description (stall, timeout, disconnect).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct LinkError(pub String);

impl LinkError {
    /// Create a link error from any message
    pub fn new(msg: impl Into<String>) -> Self {
        LinkError(msg.into())
    }
}

/// Sub-transfer of the protocol a transport error happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// 2-byte status query on the command channel
    StatusQuery,
    /// 4-byte response to a status query
    StatusResponse,
    /// 6-byte status set on the command channel
    StatusSet,
    /// 4-byte acknowledgement of a status set
    StatusAck,
    /// Write command announcing the 1-word length
    LengthCommand,
    /// 4-byte image length on the bulk channel
    LengthPayload,
    /// Write command announcing the data word count
    DataCommand,
    /// Padded image data on the bulk channel
    DataPayload,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::StatusQuery => "status query transmission",
            Phase::StatusResponse => "status response read",
            Phase::StatusSet => "status set transmission",
            Phase::StatusAck => "status acknowledgement read",
            Phase::LengthCommand => "1st command transmission",
            Phase::LengthPayload => "file size transmission",
            Phase::DataCommand => "2nd command transmission",
            Phase::DataPayload => "file data transmission",
        };
        f.write_str(s)
    }
}

/// What went wrong within a single sub-transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The transport moved fewer (or more) bytes than the frame requires
    Short { expected: usize, actual: usize },
    /// The transport itself failed
    Link(LinkError),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Short { expected, actual } => {
                write!(f, "transferred {} of {} bytes", actual, expected)
            }
            Fault::Link(e) => write!(f, "{}", e),
        }
    }
}

/// A sub-transfer that did not move exactly the expected byte count
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{phase} error: {fault}")]
pub struct TransportError {
    /// Which sub-transfer failed
    pub phase: Phase,
    /// How it failed
    pub fault: Fault,
}

/// Why a negotiation step refused to continue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The underlying exchange failed
    Transport(TransportError),
    /// Probe slot returned the firmware sentinel
    Sentinel,
    /// Negotiation slot did not echo the magic number
    MagicMismatch { found: u32 },
    /// Power or ready bit missing from the status word
    NotReady { status: u32 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Transport(e) => write!(f, "{}", e),
            Rejection::Sentinel => {
                write!(f, "device reported status 0x{:08X}", STATUS_SENTINEL)
            }
            Rejection::MagicMismatch { found } => write!(
                f,
                "expected magic 0x{:08X}, device answered 0x{:08X}",
                MAGIC, found
            ),
            Rejection::NotReady { status } => {
                let flags = CableStatus::from_bits_retain(*status);
                write!(
                    f,
                    "status 0x{:08X}: power {}, {}",
                    status,
                    if flags.contains(CableStatus::POWER_ON) {
                        "on"
                    } else {
                        "off"
                    },
                    if flags.contains(CableStatus::READY) {
                        "ready"
                    } else {
                        "not ready"
                    }
                )
            }
        }
    }
}

/// Errors from loading an image file
#[derive(Debug, Error)]
pub enum ImageError {
    /// The file could not be opened
    #[error("file open failure: {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the file failed
    #[error("file read error: {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Zero-byte image
    #[error("file read error: image is empty")]
    Empty,

    /// Image does not fit the cable's buffer
    #[error("image is {len} bytes, larger than the {max} byte buffer", max = MAX_IMAGE_SIZE)]
    TooLarge { len: usize },
}

/// Bootcable protocol errors
#[derive(Debug, Error)]
pub enum Error {
    /// A status exchange did not move the expected bytes
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A handshake step failed; nothing was transferred
    #[error("negotiation failed at {step}: {rejection}")]
    Negotiation { step: Step, rejection: Rejection },

    /// A sub-transfer of the image upload failed
    #[error("transmission failed: {0}")]
    Transfer(#[source] TransportError),

    /// The image could not be loaded
    #[error(transparent)]
    Image(#[from] ImageError),
}

impl Error {
    /// The sub-transfer a transport-level failure belongs to, if any
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Error::Transport(e) | Error::Transfer(e) => Some(e.phase),
            Error::Negotiation {
                rejection: Rejection::Transport(e),
                ..
            } => Some(e.phase),
            _ => None,
        }
    }
}
