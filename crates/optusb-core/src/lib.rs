//! optusb-core - Protocol engine for the optimize USB bootcable
//!
//! The bootcable pushes a multiboot program image into the memory of the
//! target it is plugged into. Before any data moves, host and cable agree
//! on readiness through a fixed sequence of status messages exchanged on
//! the command and status channels. The image is then streamed as a byte
//! length announcement followed by the word-padded payload.
//!
//! This crate holds the protocol logic only. The USB side is abstracted by
//! the [`Transport`] trait; `optusb-nusb` provides the real implementation
//! and `optusb-dummy` an in-memory emulation of the cable firmware.
//!
//! # Example
//!
//! ```no_run
//! use optusb_core::{Bootcable, ProgramImage, Transport};
//!
//! fn flash<T: Transport>(transport: T) -> optusb_core::Result<()> {
//!     let image = ProgramImage::from_file("game.mb")?;
//!     let mut cable = Bootcable::new(transport);
//!     cable.negotiate()?.send(&image)
//! }
//! ```

mod error;
mod image;
mod negotiation;
mod progress;
pub mod protocol;
mod transfer;
mod transport;

#[cfg(test)]
mod script;

pub use error::{Error, Fault, ImageError, LinkError, Phase, Rejection, Result, TransportError};
pub use image::ProgramImage;
pub use negotiation::{Bootcable, Negotiated, Step};
pub use progress::{NoProgress, Progress};
pub use protocol::CableStatus;
pub use transport::{Channel, Transport};
