//! HID transport for low-level hardware communication
//!
//! Provides blocking HID I/O with the LINK hub.

use hidapi::{HidApi, HidDevice};
use linkhub_core::config::DeviceConfig;
use linkhub_core::{LinkHubError, Result};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Usage of the vendor interface the protocol runs on
const VENDOR_USAGE: u16 = 0x0001;

/// Packet lengths the transport accepts and returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub write_length: usize,
    pub read_length: usize,
}

/// Trait for HID transport abstraction
///
/// This trait enables testing of `LinkProtocol` without real hardware
/// by allowing mock implementations.
pub trait HidTransport {
    /// Write a packet, zero-padded to `length` bytes
    fn write(&mut self, packet: &[u8], length: usize) -> Result<()>;

    /// Read one reply of up to `length` bytes
    ///
    /// Byte 0 of the returned buffer is the report id, so reply offsets
    /// line up with the offsets of the packet that was written.
    fn read(&mut self, length: usize) -> Result<Vec<u8>>;

    /// Drop any replies still queued by the device
    fn clear_read_buffer(&mut self);

    /// Block for a firmware settling delay
    fn pause(&mut self, ms: u64);

    /// Packet lengths for this transport
    fn capabilities(&self) -> Capabilities;
}

/// HID driver for hardware communication
pub struct HidDriver {
    device: HidDevice,
    capabilities: Capabilities,
    read_timeout_ms: i32,
    debug_hid: bool,
}

impl HidDriver {
    /// Wrap an already opened device
    pub fn new(device: HidDevice, config: &DeviceConfig) -> Self {
        if config.debug_hid {
            debug!("HID debug logging enabled");
        }

        Self {
            device,
            capabilities: Capabilities {
                write_length: config.write_length,
                read_length: config.read_length,
            },
            read_timeout_ms: config.read_timeout_ms,
            debug_hid: config.debug_hid,
        }
    }

    /// Locate and open the hub described by `config`
    pub fn open(config: &DeviceConfig) -> Result<Self> {
        let api = HidApi::new().map_err(|e| {
            error!("Failed to initialise HID API: {}", e);
            LinkHubError::Transport(format!("Failed to initialise HID API: {}", e))
        })?;

        let device = find_link_hub(&api, config)?;
        Ok(Self::new(device, config))
    }
}

impl HidTransport for HidDriver {
    fn write(&mut self, packet: &[u8], length: usize) -> Result<()> {
        let mut buffer = vec![0u8; length.max(packet.len())];
        buffer[..packet.len()].copy_from_slice(packet);
        buffer.truncate(length);

        if self.debug_hid {
            debug!("TX: {:02X?}", &buffer[..packet.len().min(length)]);
        }

        self.device.write(&buffer).map_err(|e| {
            error!("HID write failed: {}", e);
            LinkHubError::Transport(format!("Write failed: {}", e))
        })?;

        Ok(())
    }

    fn read(&mut self, length: usize) -> Result<Vec<u8>> {
        // hidapi strips the report id; put it back so offsets match the packet
        let mut buffer = vec![0u8; length.max(1)];
        let received = self
            .device
            .read_timeout(&mut buffer[1..], self.read_timeout_ms)
            .map_err(|e| {
                error!("HID read failed: {}", e);
                LinkHubError::Transport(format!("Read failed: {}", e))
            })?;

        if received == 0 {
            warn!("HID read timed out after {} ms", self.read_timeout_ms);
            return Ok(Vec::new());
        }

        buffer.truncate(received + 1);

        if self.debug_hid {
            debug!("RX: {:02X?}", buffer);
        }

        Ok(buffer)
    }

    fn clear_read_buffer(&mut self) {
        let mut scratch = vec![0u8; self.capabilities.read_length.max(1)];
        loop {
            match self.device.read_timeout(&mut scratch, 0) {
                Ok(0) => break,
                Ok(count) => {
                    if self.debug_hid {
                        debug!("Discarded {} stale bytes", count);
                    }
                }
                Err(e) => {
                    warn!("Failed to clear read buffer: {}", e);
                    break;
                }
            }
        }
    }

    fn pause(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}

/// Find and open the hub's vendor interface by VID/PID/usage page
pub fn find_link_hub(api: &HidApi, config: &DeviceConfig) -> Result<HidDevice> {
    debug!(
        "Searching for LINK hub (VID:0x{:04X}, PID:0x{:04X}, usage page 0x{:04X})",
        config.vendor_id, config.product_id, config.usage_page
    );

    let mut candidates: Vec<_> = api
        .device_list()
        .filter(|info| {
            info.vendor_id() == config.vendor_id
                && info.product_id() == config.product_id
                && info.usage_page() == config.usage_page
        })
        .collect();

    // Prefer the interface carrying the vendor usage
    candidates.sort_by_key(|info| (info.usage() != VENDOR_USAGE, info.interface_number()));

    let Some(info) = candidates.first() else {
        error!("LINK hub not found");
        return Err(LinkHubError::DeviceNotFound);
    };

    debug!(
        "Found LINK hub at {:?} (interface {}, usage 0x{:04X})",
        info.path(),
        info.interface_number(),
        info.usage()
    );

    info.open_device(api).map_err(|e| {
        error!("Failed to open LINK hub: {}", e);
        LinkHubError::Transport(format!("Failed to open device: {}", e))
    })
}
