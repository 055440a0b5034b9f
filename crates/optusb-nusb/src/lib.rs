//! optusb-nusb - USB transport for the optimize bootcable
//!
//! This crate locates the cable by its vendor and product ID, claims
//! interface 0 and exposes the three bulk endpoints through the
//! [`Transport`](optusb_core::Transport) trait.
//!
//! # Example
//!
//! ```no_run
//! use optusb_core::{Bootcable, ProgramImage};
//! use optusb_nusb::UsbCable;
//!
//! let image = ProgramImage::from_file("game.mb")?;
//! let mut cable = Bootcable::new(UsbCable::open()?);
//! cable.load(&image)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod device;
mod error;

pub use device::{CableInfo, UsbCable};
pub use error::{Result, UsbError};
