//! Top-level error type for the optusb binary

use optusb_core::ImageError;
use optusb_nusb::UsbError;
use thiserror::Error;

/// Every way a run can fail; all of them exit with status 1
#[derive(Debug, Error)]
pub enum AppError {
    /// No program image given
    #[error("Usage: optusb mb-file-name")]
    Usage,

    /// The image file could not be loaded
    #[error(transparent)]
    Resource(#[from] ImageError),

    /// The cable could not be found or opened
    #[error(transparent)]
    Device(UsbError),

    /// Interface 0 or its endpoints could not be claimed
    #[error(transparent)]
    Claim(UsbError),

    /// The handshake failed
    #[error(transparent)]
    Negotiation(optusb_core::Error),

    /// The upload failed after a successful handshake
    #[error(transparent)]
    Transfer(optusb_core::Error),
}

impl AppError {
    /// One-line summary of the failing phase
    pub fn status(&self) -> &'static str {
        match self {
            AppError::Usage => "Usage error!",
            AppError::Resource(_) => "File error!",
            AppError::Device(UsbError::DeviceNotFound) => "Bootcable not found!",
            AppError::Device(_) => "Device open error!",
            AppError::Claim(_) => "Interface activation error!",
            AppError::Negotiation(_) => "Negotiation error!",
            AppError::Transfer(_) => "Transmission error!",
        }
    }
}

impl From<UsbError> for AppError {
    fn from(e: UsbError) -> Self {
        match e {
            UsbError::ClaimFailed(_) | UsbError::EndpointFailed { .. } => AppError::Claim(e),
            _ => AppError::Device(e),
        }
    }
}

impl From<optusb_core::Error> for AppError {
    fn from(e: optusb_core::Error) -> Self {
        match e {
            optusb_core::Error::Image(e) => AppError::Resource(e),
            optusb_core::Error::Transfer(_) => AppError::Transfer(e),
            _ => AppError::Negotiation(e),
        }
    }
}
