//! Bootcable device implementation
//!
//! `UsbCable` owns the opened device, the claimed interface and its three
//! bulk endpoints. All transfers are blocking with the caller's timeout.
//! Dropping the cable cancels anything still queued and releases the
//! interface.

use std::time::Duration;

use nusb::transfer::{Buffer, Bulk, In, Out};
use nusb::{Endpoint, Interface, MaybeFuture};
use optusb_core::protocol::{
    EP_BULK_OUT, EP_COMMAND, EP_STATUS_IN, OPTUSB_INTERFACE, OPTUSB_PID, OPTUSB_VID,
};
use optusb_core::{Channel, LinkError, Transport};

use crate::error::{Result, UsbError};

/// An opened bootcable
pub struct UsbCable {
    /// Claimed interface 0, held for the lifetime of the cable
    _interface: Interface,
    /// Command endpoint (0x01)
    command_ep: Endpoint<Bulk, Out>,
    /// Status input endpoint (0x82)
    status_ep: Endpoint<Bulk, In>,
    /// Payload endpoint (0x02)
    data_ep: Endpoint<Bulk, Out>,
    bus: u8,
    address: u8,
}

impl UsbCable {
    /// Open the first connected bootcable
    pub fn open() -> Result<Self> {
        Self::open_nth(0)
    }

    /// Open the nth connected bootcable (0-indexed)
    pub fn open_nth(index: usize) -> Result<Self> {
        let devices = Self::find_devices()?;

        if devices.len() > 1 {
            log::warn!(
                "{} bootcables connected, using #{}",
                devices.len(),
                index
            );
        }

        let device_info = devices.get(index).ok_or(UsbError::DeviceNotFound)?;
        let bus = device_info.busnum();
        let address = device_info.device_address();

        log::info!("Opening bootcable at bus {} address {}", bus, address);

        let device = device_info
            .open()
            .wait()
            .map_err(|e| UsbError::OpenFailed(e.to_string()))?;

        // Configuration is already set by the OS; only the interface is claimed
        let interface = device
            .claim_interface(OPTUSB_INTERFACE)
            .wait()
            .map_err(|e| UsbError::ClaimFailed(e.to_string()))?;

        let command_ep = interface
            .endpoint::<Bulk, Out>(EP_COMMAND)
            .map_err(|e| endpoint_failed(EP_COMMAND, e))?;
        let status_ep = interface
            .endpoint::<Bulk, In>(EP_STATUS_IN)
            .map_err(|e| endpoint_failed(EP_STATUS_IN, e))?;
        let data_ep = interface
            .endpoint::<Bulk, Out>(EP_BULK_OUT)
            .map_err(|e| endpoint_failed(EP_BULK_OUT, e))?;

        log::debug!("Claimed interface {}", OPTUSB_INTERFACE);

        Ok(Self {
            _interface: interface,
            command_ep,
            status_ep,
            data_ep,
            bus,
            address,
        })
    }

    /// List all connected bootcables
    pub fn list_devices() -> Result<Vec<CableInfo>> {
        Ok(Self::find_devices()?
            .iter()
            .map(|d| CableInfo {
                bus: d.busnum(),
                address: d.device_address(),
                serial: d.serial_number().map(|s| s.to_string()),
            })
            .collect())
    }

    fn find_devices() -> Result<Vec<nusb::DeviceInfo>> {
        Ok(nusb::list_devices()
            .wait()
            .map_err(|e| UsbError::EnumerationFailed(e.to_string()))?
            .filter(|d| d.vendor_id() == OPTUSB_VID && d.product_id() == OPTUSB_PID)
            .collect())
    }

    /// Bus number the cable is attached to
    pub fn bus(&self) -> u8 {
        self.bus
    }

    /// Device address on the bus
    pub fn address(&self) -> u8 {
        self.address
    }

    fn out_endpoint(&mut self, channel: Channel) -> std::result::Result<&mut Endpoint<Bulk, Out>, LinkError> {
        match channel {
            Channel::Command => Ok(&mut self.command_ep),
            Channel::BulkOut => Ok(&mut self.data_ep),
            Channel::StatusIn => Err(LinkError::new(format!("{} is not an OUT channel", channel))),
        }
    }
}

fn endpoint_failed(address: u8, e: nusb::Error) -> UsbError {
    UsbError::EndpointFailed {
        address,
        message: e.to_string(),
    }
}

impl Transport for UsbCable {
    fn write(
        &mut self,
        channel: Channel,
        data: &[u8],
        timeout: Duration,
    ) -> std::result::Result<usize, LinkError> {
        let ep = self.out_endpoint(channel)?;

        let mut buf = Buffer::new(data.len());
        buf.extend_from_slice(data);

        let completion = ep.transfer_blocking(buf, timeout);
        completion
            .status
            .map_err(|e| LinkError::new(format!("USB write on {} failed: {}", channel, e)))?;

        log::trace!("USB write {} bytes on {}", completion.actual_len, channel);
        Ok(completion.actual_len)
    }

    fn read(
        &mut self,
        channel: Channel,
        buf: &mut [u8],
        timeout: Duration,
    ) -> std::result::Result<usize, LinkError> {
        if channel != Channel::StatusIn {
            return Err(LinkError::new(format!("{} is not an IN channel", channel)));
        }

        // Request length must be a multiple of max packet size
        let max_packet_size = self.status_ep.max_packet_size();
        let request_len = buf.len().div_ceil(max_packet_size) * max_packet_size;
        let mut in_buf = Buffer::new(request_len);
        in_buf.set_requested_len(request_len);

        let completion = self.status_ep.transfer_blocking(in_buf, timeout);
        completion
            .status
            .map_err(|e| LinkError::new(format!("USB read on {} failed: {}", channel, e)))?;

        let received = completion.actual_len;
        if received > buf.len() {
            return Err(LinkError::new(format!(
                "USB read on {} overflowed: {} bytes for a {} byte buffer",
                channel,
                received,
                buf.len()
            )));
        }
        buf[..received].copy_from_slice(&completion.buffer[..received]);

        log::trace!("USB read {} bytes on {}", received, channel);
        Ok(received)
    }
}

impl Drop for UsbCable {
    fn drop(&mut self) {
        self.command_ep.cancel_all();
        self.status_ep.cancel_all();
        self.data_ep.cancel_all();
        log::debug!(
            "Releasing bootcable at bus {} address {}",
            self.bus,
            self.address
        );
    }
}

/// Information about a connected bootcable
#[derive(Debug, Clone)]
pub struct CableInfo {
    /// USB bus number
    pub bus: u8,
    /// USB device address
    pub address: u8,
    /// Device serial number (if available)
    pub serial: Option<String>,
}

impl std::fmt::Display for CableInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bootcable at bus {} address {}", self.bus, self.address)?;
        if let Some(ref serial) = self.serial {
            write!(f, " serial={}", serial)?;
        }
        Ok(())
    }
}
