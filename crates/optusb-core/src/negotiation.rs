//! Negotiation engine
//!
//! Before the cable accepts a program, host and firmware run a fixed
//! six-step handshake over the status slots:
//!
//! 1. query slot 1, which must not hold the sentinel
//! 2. set slot 2 to the magic number
//! 3. query slot 2, which must echo the magic number
//! 4. clear slot 2
//! 5. query slot 0, which must report power on and ready
//! 6. query slot 1 again right before the transfer
//!
//! Every command write is followed by the settle delay before its
//! response is read. Nothing is retried: the first failing step ends the
//! run.

use std::fmt;

use crate::error::{Error, Fault, Phase, Rejection, Result, TransportError};
use crate::image::ProgramImage;
use crate::progress::{NoProgress, Progress};
use crate::protocol::{
    self, CableStatus, MAGIC, SETTLE_DELAY, SLOT_NEGOTIATE, SLOT_PROBE, SLOT_STATUS,
    STATUS_RESPONSE_LEN, STATUS_SENTINEL, TRANSFER_TIMEOUT,
};
use crate::transport::{Channel, Transport};

/// Handshake step, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Query the probe slot before negotiating
    Probe,
    /// Write the magic number to the negotiation slot
    Announce,
    /// Read the magic number back
    Echo,
    /// Clear the negotiation slot
    Clear,
    /// Check power and ready bits
    Ready,
    /// Query the probe slot again before transferring
    Recheck,
}

impl Step {
    /// All steps in the order they run
    pub const ALL: [Step; 6] = [
        Step::Probe,
        Step::Announce,
        Step::Echo,
        Step::Clear,
        Step::Ready,
        Step::Recheck,
    ];

    /// Status slot the step talks to
    pub fn slot(self) -> u8 {
        match self {
            Step::Probe | Step::Recheck => SLOT_PROBE,
            Step::Announce | Step::Echo | Step::Clear => SLOT_NEGOTIATE,
            Step::Ready => SLOT_STATUS,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Probe => "initial status probe",
            Step::Announce => "magic announcement",
            Step::Echo => "magic echo",
            Step::Clear => "negotiation slot clear",
            Step::Ready => "power/ready check",
            Step::Recheck => "pre-transfer status probe",
        };
        write!(f, "{} (slot {})", s, self.slot())
    }
}

/// A session with one bootcable
///
/// Owns the transport for the whole run. Dropping the session drops the
/// transport, which releases the device.
pub struct Bootcable<T: Transport> {
    transport: T,
}

impl<T: Transport> Bootcable<T> {
    /// Start a session over an opened transport
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Borrow the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// End the session and hand back the transport
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Write a frame, requiring every byte to be accepted
    pub(crate) fn write_exact(
        &mut self,
        channel: Channel,
        data: &[u8],
        phase: Phase,
    ) -> core::result::Result<(), TransportError> {
        let written = self
            .transport
            .write(channel, data, TRANSFER_TIMEOUT)
            .map_err(|e| TransportError {
                phase,
                fault: Fault::Link(e),
            })?;
        log::trace!("{}: wrote {}/{} bytes", channel, written, data.len());

        if written != data.len() {
            return Err(TransportError {
                phase,
                fault: Fault::Short {
                    expected: data.len(),
                    actual: written,
                },
            });
        }
        Ok(())
    }

    /// Read a frame, requiring exactly `buf.len()` bytes
    pub(crate) fn read_exact(
        &mut self,
        channel: Channel,
        buf: &mut [u8],
        phase: Phase,
    ) -> core::result::Result<(), TransportError> {
        let read = self
            .transport
            .read(channel, buf, TRANSFER_TIMEOUT)
            .map_err(|e| TransportError {
                phase,
                fault: Fault::Link(e),
            })?;
        log::trace!("{}: read {}/{} bytes", channel, read, buf.len());

        if read != buf.len() {
            return Err(TransportError {
                phase,
                fault: Fault::Short {
                    expected: buf.len(),
                    actual: read,
                },
            });
        }
        Ok(())
    }

    pub(crate) fn settle(&mut self) {
        self.transport.settle(SETTLE_DELAY);
    }

    /// Query a status slot
    ///
    /// Sends `{STATUS, slot}`, waits for the device to settle and reads the
    /// 4-byte little-endian status word.
    pub fn read_status(&mut self, slot: u8) -> Result<u32> {
        Ok(self.query(slot)?)
    }

    /// Set a status slot
    ///
    /// Sends `{STATUS, slot | 0x80, value}`, waits for the device to settle
    /// and consumes the 4-byte acknowledgement so the status channel stays
    /// in step. The acknowledgement is returned but carries no meaning the
    /// handshake relies on.
    pub fn write_status(&mut self, slot: u8, value: u32) -> Result<u32> {
        Ok(self.set(slot, value)?)
    }

    /// Run the handshake
    ///
    /// On success the returned token is the only way to start the transfer.
    pub fn negotiate(&mut self) -> Result<Negotiated<'_, T>> {
        self.negotiate_with(&mut NoProgress)
    }

    /// Run the handshake, reporting each step
    pub fn negotiate_with(&mut self, progress: &mut dyn Progress) -> Result<Negotiated<'_, T>> {
        for step in Step::ALL {
            progress.negotiating(step);
            self.run_step(step)
                .map_err(|rejection| Error::Negotiation { step, rejection })?;
        }

        log::info!("Bootcable negotiation complete");
        progress.negotiated();
        Ok(Negotiated { cable: self })
    }

    /// Negotiate and send an image in one go
    pub fn load(&mut self, image: &ProgramImage) -> Result<()> {
        self.load_with(image, &mut NoProgress)
    }

    /// Negotiate and send an image, reporting progress
    pub fn load_with(&mut self, image: &ProgramImage, progress: &mut dyn Progress) -> Result<()> {
        self.negotiate_with(progress)?.send_with(image, progress)
    }

    fn run_step(&mut self, step: Step) -> core::result::Result<(), Rejection> {
        log::debug!("Negotiation step: {}", step);
        let slot = step.slot();

        match step {
            Step::Probe | Step::Recheck => {
                let value = self.query(slot).map_err(Rejection::Transport)?;
                if value == STATUS_SENTINEL {
                    return Err(Rejection::Sentinel);
                }
            }
            Step::Announce => {
                self.set(slot, MAGIC).map_err(Rejection::Transport)?;
            }
            Step::Echo => {
                let found = self.query(slot).map_err(Rejection::Transport)?;
                if found != MAGIC {
                    return Err(Rejection::MagicMismatch { found });
                }
            }
            Step::Clear => {
                self.set(slot, 0).map_err(Rejection::Transport)?;
            }
            Step::Ready => {
                let status = self.query(slot).map_err(Rejection::Transport)?;
                if !CableStatus::from_bits_retain(status).is_loadable() {
                    return Err(Rejection::NotReady { status });
                }
            }
        }
        Ok(())
    }

    fn query(&mut self, slot: u8) -> core::result::Result<u32, TransportError> {
        self.write_exact(
            Channel::Command,
            &protocol::status_query(slot),
            Phase::StatusQuery,
        )?;
        self.settle();

        let mut res = [0u8; STATUS_RESPONSE_LEN];
        self.read_exact(Channel::StatusIn, &mut res, Phase::StatusResponse)?;
        let value = protocol::decode_status(res);
        log::debug!("Status slot {} = 0x{:08X}", slot, value);
        Ok(value)
    }

    fn set(&mut self, slot: u8, value: u32) -> core::result::Result<u32, TransportError> {
        self.write_exact(
            Channel::Command,
            &protocol::status_set(slot, value),
            Phase::StatusSet,
        )?;
        self.settle();

        let mut ack = [0u8; STATUS_RESPONSE_LEN];
        self.read_exact(Channel::StatusIn, &mut ack, Phase::StatusAck)?;
        let ack = protocol::decode_status(ack);
        log::debug!(
            "Set status slot {} = 0x{:08X} (ack 0x{:08X})",
            slot,
            value,
            ack
        );
        Ok(ack)
    }
}

/// Proof that the handshake succeeded
///
/// Consumed by [`Negotiated::send`], so each negotiation allows exactly one
/// transfer.
#[must_use = "a negotiated cable does nothing until an image is sent"]
pub struct Negotiated<'a, T: Transport> {
    pub(crate) cable: &'a mut Bootcable<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CMD_STATUS;
    use crate::script::{Event, Reply, Script};

    #[test]
    fn test_read_status_frames() {
        for slot in 0..=2u8 {
            let mut cable = Bootcable::new(Script::new([Reply::Word(0x1122_3344)]));
            assert_eq!(cable.read_status(slot).unwrap(), 0x1122_3344);
            assert_eq!(
                cable.transport().events,
                vec![
                    Event::Write(Channel::Command, vec![CMD_STATUS, slot]),
                    Event::Settle(SETTLE_DELAY),
                    Event::Read(Channel::StatusIn, 4),
                ]
            );
        }
    }

    #[test]
    fn test_read_status_is_little_endian() {
        let mut cable = Bootcable::new(Script::new([Reply::Bytes(vec![0x98, 0xBA, 0xDC, 0xFE])]));
        assert_eq!(cable.read_status(2).unwrap(), MAGIC);
    }

    #[test]
    fn test_read_status_short_read() {
        let mut cable = Bootcable::new(Script::new([Reply::Bytes(vec![1, 2])]));
        match cable.read_status(0) {
            Err(Error::Transport(e)) => {
                assert_eq!(e.phase, Phase::StatusResponse);
                assert_eq!(
                    e.fault,
                    Fault::Short {
                        expected: 4,
                        actual: 2
                    }
                );
            }
            other => panic!("unexpected result: {:?}", other),
        }
        // No retry
        assert_eq!(cable.transport().writes().len(), 1);
    }

    #[test]
    fn test_read_status_short_write_skips_read() {
        let mut script = Script::new([Reply::Word(0)]);
        script.short_write = Some(0);
        let mut cable = Bootcable::new(script);
        match cable.read_status(1) {
            Err(Error::Transport(e)) => assert_eq!(e.phase, Phase::StatusQuery),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!cable
            .transport()
            .events
            .iter()
            .any(|e| matches!(e, Event::Read(..))));
    }

    #[test]
    fn test_write_status_frames() {
        let mut cable = Bootcable::new(Script::new([Reply::Word(0xDEAD_BEEF)]));
        assert_eq!(cable.write_status(2, MAGIC).unwrap(), 0xDEAD_BEEF);
        assert_eq!(
            cable.transport().events,
            vec![
                Event::Write(
                    Channel::Command,
                    vec![CMD_STATUS, 0x82, 0x98, 0xBA, 0xDC, 0xFE]
                ),
                Event::Settle(SETTLE_DELAY),
                Event::Read(Channel::StatusIn, 4),
            ]
        );
    }

    #[test]
    fn test_write_status_link_failure() {
        let mut cable = Bootcable::new(Script::new([Reply::Fail("timed out")]));
        match cable.write_status(2, 0) {
            Err(Error::Transport(e)) => {
                assert_eq!(e.phase, Phase::StatusAck);
                assert_eq!(e.fault, Fault::Link(crate::LinkError::new("timed out")));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_negotiate_sequence() {
        let mut cable = Bootcable::new(Script::happy());
        let _ = cable.negotiate().unwrap();

        let writes = cable.transport().writes();
        assert_eq!(
            writes,
            vec![
                (Channel::Command, vec![CMD_STATUS, 1]),
                (Channel::Command, vec![CMD_STATUS, 0x82, 0x98, 0xBA, 0xDC, 0xFE]),
                (Channel::Command, vec![CMD_STATUS, 2]),
                (Channel::Command, vec![CMD_STATUS, 0x82, 0, 0, 0, 0]),
                (Channel::Command, vec![CMD_STATUS, 0]),
                (Channel::Command, vec![CMD_STATUS, 1]),
            ]
        );
        assert_eq!(cable.transport().settles(), 6);
    }

    #[test]
    fn test_negotiate_sentinel() {
        let mut cable = Bootcable::new(Script::new([Reply::Word(STATUS_SENTINEL)]));
        match cable.negotiate() {
            Err(Error::Negotiation { step, rejection }) => {
                assert_eq!(step, Step::Probe);
                assert_eq!(rejection, Rejection::Sentinel);
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("negotiation should fail"),
        }
        assert_eq!(cable.transport().writes().len(), 1);
    }

    #[test]
    fn test_negotiate_magic_mismatch() {
        let mut cable = Bootcable::new(Script::new([
            Reply::Word(0),
            Reply::Word(MAGIC),
            Reply::Word(STATUS_SENTINEL),
        ]));
        match cable.negotiate() {
            Err(Error::Negotiation { step, rejection }) => {
                assert_eq!(step, Step::Echo);
                assert_eq!(
                    rejection,
                    Rejection::MagicMismatch {
                        found: STATUS_SENTINEL
                    }
                );
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("negotiation should fail"),
        }
        // Nothing after the echo read
        assert_eq!(cable.transport().writes().len(), 3);
    }

    #[test]
    fn test_negotiate_not_ready() {
        for (status, ok) in [(0x00, false), (0x01, false), (0x02, false), (0x03, true)] {
            let mut cable = Bootcable::new(Script::new([
                Reply::Word(0),
                Reply::Word(MAGIC),
                Reply::Word(MAGIC),
                Reply::Word(0),
                Reply::Word(status),
                Reply::Word(0),
            ]));
            match cable.negotiate() {
                Ok(_) => assert!(ok, "status 0x{:02X} should be rejected", status),
                Err(Error::Negotiation { step, rejection }) => {
                    assert!(!ok, "status 0x{:02X} should pass", status);
                    assert_eq!(step, Step::Ready);
                    assert_eq!(rejection, Rejection::NotReady { status });
                }
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
    }

    #[test]
    fn test_negotiate_recheck_sentinel() {
        let mut cable = Bootcable::new(Script::new([
            Reply::Word(0),
            Reply::Word(MAGIC),
            Reply::Word(MAGIC),
            Reply::Word(0),
            Reply::Word(0x03),
            Reply::Word(STATUS_SENTINEL),
        ]));
        match cable.negotiate() {
            Err(Error::Negotiation { step, .. }) => assert_eq!(step, Step::Recheck),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("negotiation should fail"),
        }
    }

    #[test]
    fn test_negotiate_announce_failure_stops() {
        let mut script = Script::happy();
        script.failed_write = Some(1);
        let mut cable = Bootcable::new(script);
        match cable.negotiate() {
            Err(Error::Negotiation {
                step,
                rejection: Rejection::Transport(e),
            }) => {
                assert_eq!(step, Step::Announce);
                assert_eq!(e.phase, Phase::StatusSet);
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("negotiation should fail"),
        }
        assert_eq!(cable.transport().writes().len(), 2);
    }

    #[test]
    fn test_progress_sees_every_step() {
        #[derive(Default)]
        struct Steps(Vec<Step>, bool);
        impl Progress for Steps {
            fn negotiating(&mut self, step: Step) {
                self.0.push(step);
            }
            fn negotiated(&mut self) {
                self.1 = true;
            }
        }

        let mut steps = Steps::default();
        let mut cable = Bootcable::new(Script::happy());
        let _ = cable.negotiate_with(&mut steps).unwrap();
        assert_eq!(steps.0, Step::ALL.to_vec());
        assert!(steps.1);
    }
}
