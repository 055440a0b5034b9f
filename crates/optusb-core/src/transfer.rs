//! Transfer engine
//!
//! The cable's receive buffer is word addressed. An upload is therefore
//! two write commands: the first announces a single word and is followed
//! by the image length in bytes, the second announces the padded word
//! count and is followed by the image plus zero padding. The device sends
//! no acknowledgement; the upload counts as done once the transport has
//! accepted every byte.

use crate::error::{Error, Phase, Result};
use crate::image::ProgramImage;
use crate::negotiation::Negotiated;
use crate::progress::{NoProgress, Progress};
use crate::protocol::{self, WORD_SIZE};
use crate::transport::{Channel, Transport};

impl<T: Transport> Negotiated<'_, T> {
    /// Upload the image
    pub fn send(self, image: &ProgramImage) -> Result<()> {
        self.send_with(image, &mut NoProgress)
    }

    /// Upload the image, reporting progress
    pub fn send_with(self, image: &ProgramImage, progress: &mut dyn Progress) -> Result<()> {
        let cable = self.cable;
        let len = image.len();
        let words = image.word_count();

        log::debug!("Sending program length: {} bytes", len);
        cable
            .write_exact(
                Channel::Command,
                &protocol::write_command(1),
                Phase::LengthCommand,
            )
            .map_err(Error::Transfer)?;
        cable.settle();

        cable
            .write_exact(
                Channel::BulkOut,
                &(len as u32).to_le_bytes(),
                Phase::LengthPayload,
            )
            .map_err(Error::Transfer)?;
        cable.settle();

        log::debug!("Sending program data: {} words", words);
        if words > u16::MAX as usize {
            log::debug!("Word count {} exceeds the 16-bit field, sent as 0x0000", words);
        }
        cable
            .write_exact(
                Channel::Command,
                &protocol::write_command(words),
                Phase::DataCommand,
            )
            .map_err(Error::Transfer)?;
        cable.settle();

        let payload = image.padded();
        debug_assert_eq!(payload.len(), words * WORD_SIZE);
        progress.sending(payload.len());
        cable
            .write_exact(Channel::BulkOut, &payload, Phase::DataPayload)
            .map_err(Error::Transfer)?;

        log::info!("Transferred {} bytes ({} words)", len, words);
        progress.sent();
        Ok(())
    }
}
