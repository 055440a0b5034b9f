//! optusb-dummy - In-memory bootcable emulator
//!
//! This crate provides a [`Transport`] that behaves like the bootcable
//! firmware as seen from the host. It answers status queries, tracks the
//! write-command state machine and keeps every image it receives, so the
//! whole load sequence can run without hardware.

use std::collections::VecDeque;
use std::time::Duration;

use optusb_core::protocol::{
    CableStatus, CMD_STATUS, CMD_WRITE, SLOT_NEGOTIATE, SLOT_PROBE, SLOT_STATUS,
    STATUS_RESPONSE_LEN, STATUS_SENTINEL, STATUS_SET, WORD_SIZE,
};
use optusb_core::{Channel, LinkError, Transport};

/// Configuration for the emulated cable
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Target is powered
    pub powered: bool,
    /// Target is ready to receive
    pub ready: bool,
    /// Value reported on the probe slot
    pub probe_value: u32,
    /// Echo values written to the negotiation slot
    pub echo_magic: bool,
    /// Become ready again after a completed transfer
    pub rearm: bool,
    /// Accept one byte less than offered on the Nth write (0-based) to a channel
    pub short_write: Option<(Channel, usize)>,
    /// Return a truncated status word on the Nth status read (0-based)
    pub short_read: Option<usize>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            powered: true,
            ready: true,
            probe_value: 0,
            echo_magic: true,
            rearm: false,
            short_write: None,
            short_read: None,
        }
    }
}

/// Where the firmware is in a program upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxState {
    /// Waiting for a write command
    Idle,
    /// 1-word write announced; next bulk frame is the byte length
    Length,
    /// Length known; waiting for the data write command
    Announced { len: usize },
    /// Data write command seen; next bulk frame is the payload
    Data { len: usize, words: usize },
}

/// Emulated bootcable
pub struct DummyCable {
    config: DummyConfig,
    slots: [u32; 3],
    status: CableStatus,
    responses: VecDeque<[u8; STATUS_RESPONSE_LEN]>,
    rx: RxState,
    images: Vec<Vec<u8>>,
    frames: Vec<(Channel, Vec<u8>)>,
    settles: Vec<Duration>,
    writes_per_channel: [usize; 3],
    status_reads: usize,
}

impl DummyCable {
    /// Create a cable with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let mut status = CableStatus::empty();
        status.set(CableStatus::POWER_ON, config.powered);
        status.set(CableStatus::READY, config.ready);
        let mut slots = [0u32; 3];
        slots[SLOT_PROBE as usize] = config.probe_value;
        Self {
            config,
            slots,
            status,
            responses: VecDeque::new(),
            rx: RxState::Idle,
            images: Vec::new(),
            frames: Vec::new(),
            settles: Vec::new(),
            writes_per_channel: [0; 3],
            status_reads: 0,
        }
    }

    /// Create a powered, ready cable
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Current status word
    pub fn status(&self) -> CableStatus {
        self.status
    }

    /// Change the status word, e.g. to simulate the target powering off
    pub fn set_status(&mut self, status: CableStatus) {
        self.status = status;
    }

    /// Every image received so far, oldest first
    pub fn images(&self) -> &[Vec<u8>] {
        &self.images
    }

    /// Every frame the host wrote, in order
    pub fn frames(&self) -> &[(Channel, Vec<u8>)] {
        &self.frames
    }

    /// Every settle delay the host waited
    pub fn settles(&self) -> &[Duration] {
        &self.settles
    }

    /// Status words queued but not yet read by the host
    pub fn pending_responses(&self) -> usize {
        self.responses.len()
    }

    fn channel_index(channel: Channel) -> usize {
        match channel {
            Channel::Command => 0,
            Channel::StatusIn => 1,
            Channel::BulkOut => 2,
        }
    }

    fn respond(&mut self, value: u32) {
        self.responses.push_back(value.to_le_bytes());
    }

    fn handle_command(&mut self, data: &[u8]) -> Result<(), LinkError> {
        match data {
            [CMD_STATUS, slot] => {
                let value = match *slot {
                    SLOT_STATUS => self.status.bits(),
                    SLOT_PROBE => self.slots[SLOT_PROBE as usize],
                    SLOT_NEGOTIATE if self.config.echo_magic => self.slots[SLOT_NEGOTIATE as usize],
                    SLOT_NEGOTIATE => 0,
                    other => return Err(stall(format!("unknown status slot {}", other))),
                };
                log::trace!("dummy: status slot {} -> 0x{:08X}", slot, value);
                self.respond(value);
                Ok(())
            }
            [CMD_STATUS, flagged, v0, v1, v2, v3] if flagged & STATUS_SET != 0 => {
                let slot = (flagged & !STATUS_SET) as usize;
                if slot >= self.slots.len() {
                    return Err(stall(format!("unknown status slot {}", slot)));
                }
                let value = u32::from_le_bytes([*v0, *v1, *v2, *v3]);
                log::trace!("dummy: status slot {} <- 0x{:08X}", slot, value);
                self.slots[slot] = value;
                self.respond(value);
                Ok(())
            }
            [CMD_WRITE, lo, hi] => {
                let mut words = u16::from_le_bytes([*lo, *hi]) as usize;
                if words == 0 {
                    // A full buffer wraps the 16-bit count
                    words = 0x10000;
                }
                self.rx = match self.rx {
                    RxState::Idle if words == 1 => RxState::Length,
                    RxState::Announced { len } => RxState::Data { len, words },
                    state => {
                        return Err(stall(format!(
                            "write of {} words unexpected in state {:?}",
                            words, state
                        )))
                    }
                };
                Ok(())
            }
            _ => Err(stall(format!("malformed command {:02X?}", data))),
        }
    }

    fn handle_bulk(&mut self, data: &[u8]) -> Result<(), LinkError> {
        match self.rx {
            RxState::Length => {
                let bytes: [u8; 4] = data
                    .try_into()
                    .map_err(|_| stall(format!("length frame of {} bytes", data.len())))?;
                let len = u32::from_le_bytes(bytes) as usize;
                log::trace!("dummy: announced program length {}", len);
                self.rx = RxState::Announced { len };
                Ok(())
            }
            RxState::Data { len, words } => {
                if len.div_ceil(WORD_SIZE) != words || data.len() != words * WORD_SIZE {
                    self.rx = RxState::Idle;
                    return Err(stall(format!(
                        "data frame of {} bytes for {} words / {} byte program",
                        data.len(),
                        words,
                        len
                    )));
                }
                log::debug!("dummy: received {} byte program", len);
                self.images.push(data[..len].to_vec());
                self.rx = RxState::Idle;
                if !self.config.rearm {
                    self.status.remove(CableStatus::READY);
                }
                Ok(())
            }
            state => Err(stall(format!("bulk data unexpected in state {:?}", state))),
        }
    }
}

fn stall(msg: String) -> LinkError {
    LinkError::new(format!("endpoint stalled: {}", msg))
}

impl Transport for DummyCable {
    fn write(
        &mut self,
        channel: Channel,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, LinkError> {
        let index = Self::channel_index(channel);
        let nth = self.writes_per_channel[index];
        self.writes_per_channel[index] += 1;
        self.frames.push((channel, data.to_vec()));

        if self.config.short_write == Some((channel, nth)) {
            // Partial frames are dropped by the firmware
            return Ok(data.len().saturating_sub(1));
        }

        match channel {
            Channel::Command => self.handle_command(data)?,
            Channel::BulkOut => self.handle_bulk(data)?,
            Channel::StatusIn => return Err(LinkError::new("status endpoint is IN only")),
        }
        Ok(data.len())
    }

    fn read(
        &mut self,
        channel: Channel,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, LinkError> {
        if channel != Channel::StatusIn {
            return Err(LinkError::new(format!("{} is not an IN channel", channel)));
        }
        let nth = self.status_reads;
        self.status_reads += 1;

        let word = self
            .responses
            .pop_front()
            .ok_or_else(|| LinkError::new("read timed out"))?;
        let len = if self.config.short_read == Some(nth) {
            2
        } else {
            STATUS_RESPONSE_LEN
        };
        let n = len.min(buf.len());
        buf[..n].copy_from_slice(&word[..n]);
        Ok(n)
    }

    fn settle(&mut self, delay: Duration) {
        self.settles.push(delay);
    }
}
