//! Bootcable protocol constants and frame encoders
//!
//! The cable exposes three bulk endpoints on interface 0. Control messages
//! go out on the command endpoint, 4-byte status words come back on the
//! status endpoint and payload data goes out on the bulk output endpoint.
//! Every multi-byte field on the wire is little-endian.

use std::time::Duration;

use bitflags::bitflags;

// ===========================================================================
// USB Device Identifiers
// ===========================================================================

/// optimize USB Vendor ID
pub const OPTUSB_VID: u16 = 0x0BFE;

/// USB-GBA bootcable Product ID
pub const OPTUSB_PID: u16 = 0x3000;

/// Interface claimed before any protocol traffic
pub const OPTUSB_INTERFACE: u8 = 0;

// ===========================================================================
// Endpoints
// ===========================================================================

/// Command endpoint (bulk OUT)
pub const EP_COMMAND: u8 = 0x01;

/// Status input endpoint (bulk IN)
pub const EP_STATUS_IN: u8 = 0x82;

/// Payload output endpoint (bulk OUT)
pub const EP_BULK_OUT: u8 = 0x02;

// ===========================================================================
// Commands
// ===========================================================================

/// Write data: followed by a 16-bit word count
pub const CMD_WRITE: u8 = 2;

/// Read or set a status slot
pub const CMD_STATUS: u8 = 3;

/// Set bit OR'd into the slot byte of a status-set message
pub const STATUS_SET: u8 = 0x80;

// ===========================================================================
// Status slots and negotiation codes
// ===========================================================================

/// Slot carrying the power/ready status word
pub const SLOT_STATUS: u8 = 0;

/// Slot probed before and after negotiation
pub const SLOT_PROBE: u8 = 1;

/// Slot used for the magic exchange
pub const SLOT_NEGOTIATE: u8 = 2;

/// Magic number written to and echoed back from the negotiation slot
pub const MAGIC: u32 = 0xFEDC_BA98;

/// Value on the probe slot that means the cable is not usable.
///
/// Firmware-defined; kept as an opaque constant.
pub const STATUS_SENTINEL: u32 = 0x1234_5678;

// ===========================================================================
// Timing and sizes
// ===========================================================================

/// Pause after every command write before its response is valid
pub const SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Timeout for every bulk transfer
pub const TRANSFER_TIMEOUT: Duration = Duration::from_millis(1000);

/// Largest program image the cable accepts (256 KiB)
pub const MAX_IMAGE_SIZE: usize = 256 * 1024;

/// The cable's receive buffer is addressed in 4-byte words
pub const WORD_SIZE: usize = 4;

/// Length of a status response
pub const STATUS_RESPONSE_LEN: usize = 4;

bitflags! {
    /// Status word reported on slot 0
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CableStatus: u32 {
        /// Target (GBA) is powered
        const POWER_ON = 1 << 0;
        /// Target is ready to receive a program
        const READY    = 1 << 1;
    }
}

impl CableStatus {
    /// Both power and ready bits are set
    pub fn is_loadable(self) -> bool {
        self.contains(CableStatus::POWER_ON | CableStatus::READY)
    }
}

/// Encode a status-query message: `{STATUS, slot}`
pub fn status_query(slot: u8) -> [u8; 2] {
    [CMD_STATUS, slot]
}

/// Encode a status-set message: `{STATUS, slot | 0x80, value (LE)}`
pub fn status_set(slot: u8, value: u32) -> [u8; 6] {
    let v = value.to_le_bytes();
    [CMD_STATUS, slot | STATUS_SET, v[0], v[1], v[2], v[3]]
}

/// Encode a write command announcing `words` 4-byte words.
///
/// The count field is 16 bits wide; a full 65536-word buffer wraps to 0.
pub fn write_command(words: usize) -> [u8; 3] {
    let w = (words as u16).to_le_bytes();
    [CMD_WRITE, w[0], w[1]]
}

/// Decode a status response
pub fn decode_status(bytes: [u8; STATUS_RESPONSE_LEN]) -> u32 {
    u32::from_le_bytes(bytes)
}

/// Number of words needed to hold `len` bytes
pub fn word_count(len: usize) -> usize {
    len.div_ceil(WORD_SIZE)
}
