//! Error types for the USB transport

use thiserror::Error;

/// Result type for opening and enumerating cables
pub type Result<T> = std::result::Result<T, UsbError>;

/// Errors that can occur before protocol traffic starts
#[derive(Debug, Error)]
pub enum UsbError {
    /// USB device enumeration failed
    #[error("Failed to enumerate USB devices: {0}")]
    EnumerationFailed(String),

    /// No matching cable is connected
    #[error("OPTIMIZE GBA-USB-bootcable is not found (VID:0bfe PID:3000)")]
    DeviceNotFound,

    /// The device could not be opened
    #[error("Failed to open bootcable: {0}")]
    OpenFailed(String),

    /// Interface 0 could not be claimed
    #[error("Interface activation error: {0}")]
    ClaimFailed(String),

    /// A bulk endpoint could not be opened on the claimed interface
    #[error("Failed to open endpoint 0x{address:02X}: {message}")]
    EndpointFailed { address: u8, message: String },
}
