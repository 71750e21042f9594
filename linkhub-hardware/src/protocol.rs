//! LINK protocol engine
//!
//! Builds command packets, manages the handle/endpoint/property semantics
//! and interprets replies. Every operation is a blocking write + read round
//! trip on the transport.
//!
//! Packet layout: `[0x00, 0x00, device_id, command, ...]`. Replies carry the
//! status byte at offset 4 and payload from offset 5.

use crate::transport::{Capabilities, HidTransport};
use linkhub_core::codec::{read_u16_le, read_u32_le, write_u16_le, write_u24_le, write_u32_le};
use linkhub_core::types::data_type;
use linkhub_core::{Command, DeviceError, Endpoint, Handle, LinkHubError, Mode, Property, Result};
use tracing::{debug, error, info, warn};

/// Fallback packet lengths when the transport reports zero
const DEFAULT_WRITE_LENGTH: usize = 513;
const DEFAULT_READ_LENGTH: usize = 512;

/// Header bytes ahead of the first lighting chunk
const LIGHTING_HEADER: usize = 9;
/// Header bytes ahead of every streamed lighting chunk
const STREAM_HEADER: usize = 5;

/// Reply offsets
const STATUS_OFFSET: usize = 4;
const PAYLOAD_OFFSET: usize = 5;
const COUNT_OFFSET: usize = 7;
const RECORDS_OFFSET: usize = 8;

/// Highest property id probed by [`LinkProtocol::dump_supported_properties`]
const MAX_PROPERTY_ID: u8 = 0x64;
/// Highest endpoint id probed by [`LinkProtocol::dump_supported_endpoints`]
const MAX_ENDPOINT_ID: u8 = 0x80;

/// Duty target for one fan slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanDuty {
    pub slot: u8,
    /// Percentage 0-100
    pub duty: u8,
}

/// Identity properties of the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInformation {
    pub vendor_id: Option<u32>,
    pub product_id: Option<u32>,
    pub firmware: Option<String>,
}

/// Protocol engine
///
/// Generic over the transport type, allowing real hardware (`HidDriver`)
/// or mock transports for testing.
pub struct LinkProtocol<T: HidTransport> {
    transport: T,
    buffers: Option<Capabilities>,
}

impl<T: HidTransport> LinkProtocol<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            buffers: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Query packet lengths from the transport once and cache them
    pub fn buffer_lengths(&mut self) -> Capabilities {
        if let Some(buffers) = self.buffers {
            return buffers;
        }

        debug!("Setting up device buffer lengths...");
        let reported = self.transport.capabilities();
        let buffers = Capabilities {
            write_length: if reported.write_length != 0 {
                reported.write_length
            } else {
                DEFAULT_WRITE_LENGTH
            },
            read_length: if reported.read_length != 0 {
                reported.read_length
            } else {
                DEFAULT_READ_LENGTH
            },
        };
        debug!(
            "Write length set to {}, read length set to {}",
            buffers.write_length, buffers.read_length
        );

        self.buffers = Some(buffers);
        buffers
    }

    fn write_length(&mut self) -> usize {
        self.buffer_lengths().write_length
    }

    fn read_length(&mut self) -> usize {
        self.buffer_lengths().read_length
    }

    fn send(&mut self, packet: &[u8]) -> Result<()> {
        let length = self.write_length();
        self.transport.write(packet, length)
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        let length = self.read_length();
        let reply = self.transport.read(length)?;
        if reply.is_empty() {
            return Err(LinkHubError::TransportEmpty);
        }
        Ok(reply)
    }

    /// Write then read, with an optional settle pause between
    fn round_trip(&mut self, packet: &[u8], settle: bool) -> Result<Vec<u8>> {
        self.send(packet)?;
        if settle {
            self.transport.pause(1);
        }
        self.receive()
    }

    fn header(device_id: u8, command: Command) -> Vec<u8> {
        vec![0x00, 0x00, device_id, command as u8]
    }

    /// Turn a reply's status byte into a result
    fn check_status(reply: &[u8]) -> Result<()> {
        let status = reply.get(STATUS_OFFSET).copied().unwrap_or(0);
        match DeviceError::from_status(status) {
            None => Ok(()),
            Some(err) => Err(err.into()),
        }
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Read a property and return the raw reply
    pub fn read_property(&mut self, property: Property, device_id: u8) -> Result<Vec<u8>> {
        let mut packet = Self::header(device_id, Command::GetProperty);
        packet.extend_from_slice(&write_u16_le(property.code() as u16));

        self.transport.clear_read_buffer();
        let reply = match self.round_trip(&packet, true) {
            Err(LinkHubError::TransportEmpty) => {
                debug!("No reply for property {}", property);
                return Err(LinkHubError::NotSupported(property.to_string()));
            }
            other => other?,
        };

        if let Err(e) = Self::check_status(&reply) {
            debug!("Failed to read property {}: {}", property, e);
            return Err(e);
        }
        Ok(reply)
    }

    /// Fetch the 3-byte value of a property, `None` if unavailable
    pub fn fetch_property(&mut self, property: Property, device_id: u8) -> Option<u32> {
        match self.read_property(property, device_id) {
            Ok(reply) => {
                let end = reply.len().min(PAYLOAD_OFFSET + 3);
                let value = reply.get(PAYLOAD_OFFSET..end).unwrap_or(&[]);
                Some(read_u32_le(value))
            }
            Err(_) => None,
        }
    }

    /// Set a property to a 3-byte value
    pub fn set_property(&mut self, property: Property, value: u32, device_id: u8) -> Result<()> {
        let mut packet = Self::header(device_id, Command::SetProperty);
        packet.push(property.code());
        packet.push(0x00);
        packet.extend_from_slice(&write_u24_le(value));

        self.transport.clear_read_buffer();
        self.transport.pause(1);

        let reply = self.round_trip(&packet, false)?;

        match Self::check_status(&reply) {
            Ok(()) => Ok(()),
            Err(LinkHubError::Device(DeviceError::InvalidValue)) => {
                warn!("Failed to set property {}: {} is an invalid value", property, value);
                Err(DeviceError::InvalidValue.into())
            }
            Err(LinkHubError::Device(DeviceError::OperationFailed)) => {
                warn!("Failed to set property {}: is it supported?", property);
                Err(DeviceError::OperationFailed.into())
            }
            Err(LinkHubError::Device(DeviceError::ReadOnly)) => {
                warn!("Failed to set property {}: the device reports it read only", property);
                Err(DeviceError::ReadOnly.into())
            }
            Err(e) => {
                warn!("Failed to set property {}: {}", property, e);
                Err(e)
            }
        }
    }

    /// Set a property only if it differs, then confirm
    ///
    /// Issues at most one set.
    pub fn check_and_set_property(&mut self, property: Property, value: u32, device_id: u8) -> bool {
        let current = self.fetch_property(property, device_id);
        if current == Some(value) {
            return true;
        }

        info!(
            "Device {} is currently {:?}, desired value is {}. Setting property",
            property.name(),
            current,
            value
        );

        if let Err(e) = self.set_property(property, value, device_id) {
            debug!("Set of {} reported {}", property.name(), e);
        }

        let updated = self.fetch_property(property, device_id);
        info!("Device {} is now {:?}", property.name(), updated);

        updated == Some(value)
    }

    pub fn is_property_supported(&mut self, property: Property, device_id: u8) -> bool {
        self.fetch_property(property, device_id).is_some()
    }

    /// Probe property ids 0..0x64 and return the supported ones
    pub fn dump_supported_properties(&mut self, device_id: u8) -> Vec<Property> {
        debug!("Checking for properties supported by this device...");
        let supported: Vec<Property> = (0..MAX_PROPERTY_ID)
            .map(Property::from_code)
            .filter(|&property| self.is_property_supported(property, device_id))
            .collect();

        for property in &supported {
            info!("Supports property {}", property);
        }
        supported
    }

    // ------------------------------------------------------------------
    // Handles
    // ------------------------------------------------------------------

    /// Open an endpoint on a handle
    ///
    /// Fails if the handle already has an endpoint open.
    pub fn open_handle(&mut self, handle: Handle, endpoint: Endpoint, device_id: u8) -> Result<()> {
        let mut packet = Self::header(device_id, Command::OpenEndpoint);
        packet.push(handle.code());
        packet.push(endpoint.code());

        self.transport.clear_read_buffer();
        let result = self
            .round_trip(&packet, true)
            .and_then(|reply| Self::check_status(&reply));

        if let Err(e) = &result {
            warn!(
                "Failed to open endpoint {} on handle {}: {}. Is it supported and closed?",
                endpoint, handle, e
            );
        }
        result
    }

    pub fn close_handle(&mut self, handle: Handle, device_id: u8) -> Result<()> {
        let mut packet = Self::header(device_id, Command::CloseHandle);
        packet.push(0x01);
        packet.push(handle.code());

        self.transport.clear_read_buffer();
        let result = self
            .round_trip(&packet, true)
            .and_then(|reply| Self::check_status(&reply));

        if let Err(e) = &result {
            debug!("Failed to close handle {}: {}", handle, e);
        }
        result
    }

    /// Ask the device whether a handle is open. Never cached.
    pub fn is_handle_open(&mut self, handle: Handle, device_id: u8) -> bool {
        let mut packet = Self::header(device_id, Command::CheckHandle);
        packet.push(handle.code());
        packet.push(0x00);

        self.transport.clear_read_buffer();
        match self.round_trip(&packet, false) {
            Ok(reply) => reply.get(STATUS_OFFSET) != Some(&DeviceError::OperationFailed.code()),
            // Without an answer, assume open so the caller closes it
            Err(_) => true,
        }
    }

    pub fn close_handle_if_open(&mut self, handle: Handle, device_id: u8) {
        if self.is_handle_open(handle, device_id) {
            debug!("{} handle is open. Closing...", handle.name());
            let _ = self.close_handle(handle, device_id);
        }
    }

    // ------------------------------------------------------------------
    // Endpoints
    // ------------------------------------------------------------------

    /// Open, read and close an endpoint
    ///
    /// Returns the full reply, or an empty buffer if the endpoint could not
    /// be opened or read. The handle is closed on every path.
    pub fn read_from_endpoint(&mut self, handle: Handle, endpoint: Endpoint, device_id: u8) -> Vec<u8> {
        if self.is_handle_open(handle, device_id) {
            debug!("Handle {} is already open. Attempting to close...", handle);
            let _ = self.close_handle(handle, device_id);
        }

        if self.open_handle(handle, endpoint, device_id).is_err() {
            let _ = self.close_handle(handle, device_id);
            warn!("Aborting read of endpoint {}", endpoint);
            return Vec::new();
        }

        self.transport.pause(1);
        self.transport.clear_read_buffer();

        let mut packet = Self::header(device_id, Command::ReadEndpoint);
        packet.push(handle.code());

        let data = match self.round_trip(&packet, true) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Failed to read endpoint {}: {}", endpoint, e);
                Vec::new()
            }
        };

        let _ = self.close_handle(handle, device_id);
        data
    }

    /// Open, write and close an endpoint
    ///
    /// The payload is framed with its 4-byte little-endian length.
    pub fn write_to_endpoint(
        &mut self,
        handle: Handle,
        endpoint: Endpoint,
        data: &[u8],
        device_id: u8,
    ) -> Result<()> {
        if self.is_handle_open(handle, device_id) {
            debug!("Handle {} is already open. Attempting to close...", handle);
            let _ = self.close_handle(handle, device_id);
        }

        if let Err(e) = self.open_handle(handle, endpoint, device_id) {
            warn!("Aborting write to endpoint {}", endpoint);
            return Err(e);
        }

        let mut packet = Self::header(device_id, Command::WriteEndpoint);
        packet.push(handle.code());
        packet.extend_from_slice(&write_u32_le(data.len() as u32));
        packet.extend_from_slice(data);

        self.transport.clear_read_buffer();
        self.transport.pause(1);

        let result = self
            .round_trip(&packet, true)
            .and_then(|reply| Self::check_status(&reply));

        if let Err(e) = &result {
            warn!("Failed to write to handle {}: {}", handle, e);
        }

        let _ = self.close_handle(handle, device_id);
        result
    }

    /// Open the background handle on an endpoint to see if it exists
    pub fn is_endpoint_supported(&mut self, endpoint: Endpoint, device_id: u8) -> bool {
        self.close_handle_if_open(Handle::Background, device_id);

        let supported = self
            .open_handle(Handle::Background, endpoint, device_id)
            .is_ok();

        if supported {
            let _ = self.close_handle(Handle::Background, device_id);
        }
        supported
    }

    /// Probe endpoint ids 0..0x80 and return the supported ones
    pub fn dump_supported_endpoints(&mut self, device_id: u8) -> Vec<Endpoint> {
        debug!("Checking for endpoints supported by this device...");
        let supported: Vec<Endpoint> = (0..MAX_ENDPOINT_ID)
            .map(Endpoint::from_code)
            .filter(|&endpoint| self.is_endpoint_supported(endpoint, device_id))
            .collect();

        for endpoint in &supported {
            info!("Supports endpoint {}", endpoint);
        }
        supported
    }

    // ------------------------------------------------------------------
    // Lighting
    // ------------------------------------------------------------------

    /// Send one RGB frame to the lighting controller endpoint
    ///
    /// The lighting handle stays open between frames.
    pub fn send_rgb_data(&mut self, rgb: &[u8], device_id: u8) -> Result<()> {
        let mut data = Vec::with_capacity(rgb.len() + 2);
        data.push(data_type::LIGHTING_CONTROLLER);
        data.push(0x00);
        data.extend_from_slice(rgb);

        if !self.is_handle_open(Handle::Lighting, device_id) {
            // Failure is already logged; the writes below will be rejected
            let _ = self.open_handle(Handle::Lighting, Endpoint::LIGHTING_CONTROLLER, device_id);
        }

        let write_length = self.write_length();
        let first_size = write_length.saturating_sub(LIGHTING_HEADER).min(data.len());
        let stream_size = write_length.saturating_sub(STREAM_HEADER).max(1);

        let (first, mut rest) = data.split_at(first_size);
        self.write_lighting(data.len(), first, device_id)?;

        while !rest.is_empty() {
            let (chunk, remaining) = rest.split_at(stream_size.min(rest.len()));
            self.stream_lighting(chunk, device_id)?;
            rest = remaining;
        }

        Ok(())
    }

    fn write_lighting(&mut self, total: usize, chunk: &[u8], device_id: u8) -> Result<()> {
        let mut packet = Self::header(device_id, Command::WriteEndpoint);
        packet.push(Handle::Lighting.code());
        packet.extend_from_slice(&write_u32_le(total as u32));
        packet.extend_from_slice(chunk);

        self.send(&packet)?;
        self.transport.pause(1);
        Ok(())
    }

    fn stream_lighting(&mut self, chunk: &[u8], device_id: u8) -> Result<()> {
        let mut packet = Self::header(device_id, Command::StreamEndpoint);
        packet.push(Handle::Lighting.code());
        packet.extend_from_slice(chunk);

        self.send(&packet)?;
        self.transport.pause(1);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mode and liveness
    // ------------------------------------------------------------------

    pub fn fetch_mode(&mut self, device_id: u8) -> Option<Mode> {
        self.fetch_property(Property::MODE, device_id)
            .and_then(Mode::from_code)
    }

    /// Switch the device mode, closing every handle first
    ///
    /// Returns false only when the mode read back afterwards is not a
    /// known mode.
    pub fn set_mode(&mut self, mode: Mode, device_id: u8) -> bool {
        if self.fetch_property(Property::MODE, device_id) == Some(mode.code()) {
            return true;
        }

        self.transport.pause(10);
        for handle in Handle::ALL {
            self.close_handle_if_open(handle, device_id);
            self.transport.pause(10);
        }

        info!("Setting device mode to {}", mode.name());
        if let Err(e) = self.set_property(Property::MODE, mode.code(), device_id) {
            warn!("Mode change to {} reported {}", mode.name(), e);
        }

        match self.fetch_mode(device_id) {
            Some(current) => {
                info!("Mode is now {}", current.name());
                true
            }
            None => {
                error!("Device reported an unknown mode after switching to {}", mode.name());
                false
            }
        }
    }

    /// Read back software mode, setting it up to `tries` times
    pub fn force_software_mode(&mut self, device_id: u8, tries: u32) -> bool {
        for attempt in 1..=tries {
            if self.fetch_mode(device_id) == Some(Mode::Software) {
                return true;
            }

            debug!("Forcing software mode, attempt {}/{}", attempt, tries);
            self.set_mode(Mode::Software, device_id);
            self.transport.pause(100);

            if self.fetch_mode(device_id) == Some(Mode::Software) {
                return true;
            }
        }

        false
    }

    /// Ping the device; true when the reply echoes the ping opcode
    pub fn ping_device(&mut self, device_id: u8) -> bool {
        let packet = Self::header(device_id, Command::PingDevice);
        match self.round_trip(&packet, false) {
            Ok(reply) => reply.get(PAYLOAD_OFFSET) == Some(&(Command::PingDevice as u8)),
            Err(e) => {
                debug!("Ping failed: {}", e);
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Firmware version as `major.minor.patch`
    pub fn fetch_firmware(&mut self, device_id: u8) -> Option<String> {
        let reply = self.read_property(Property::FIRMWARE, device_id).ok()?;
        let version = reply.get(PAYLOAD_OFFSET..PAYLOAD_OFFSET + 3)?;
        let firmware = format!("{}.{}.{}", version[0], version[1], version[2]);
        info!("Firmware version: {}", firmware);
        Some(firmware)
    }

    pub fn fetch_device_information(&mut self, device_id: u8) -> DeviceInformation {
        let vendor_id = self.fetch_property(Property::VENDOR_ID, device_id);
        let product_id = self.fetch_property(Property::PRODUCT_ID, device_id);
        if let (Some(vid), Some(pid)) = (vendor_id, product_id) {
            info!("VID: 0x{:04X}, PID: 0x{:04X}", vid, pid);
        }
        let firmware = self.fetch_firmware(device_id);

        DeviceInformation {
            vendor_id,
            product_id,
            firmware,
        }
    }

    // ------------------------------------------------------------------
    // Sensors and fans
    // ------------------------------------------------------------------

    /// Validate the type tag of an endpoint reply and return its count
    fn tagged_count(data: &[u8], expected: u8, context: &'static str) -> Result<usize> {
        if data.is_empty() {
            return Err(LinkHubError::TransportEmpty);
        }

        let found = data.get(PAYLOAD_OFFSET).copied().unwrap_or(0);
        if found != expected {
            return Err(LinkHubError::ParseMismatch {
                context,
                expected,
                found,
            });
        }
        let subtype = data.get(PAYLOAD_OFFSET + 1).copied().unwrap_or(0);
        if subtype != 0 {
            return Err(LinkHubError::ParseMismatch {
                context,
                expected: 0,
                found: subtype,
            });
        }

        Ok(data.get(COUNT_OFFSET).copied().unwrap_or(0) as usize)
    }

    /// Value bytes of the `index`th 3-byte record
    fn record_value(data: &[u8], index: usize) -> u16 {
        let start = RECORDS_OFFSET + index * 3 + 1;
        let end = (start + 2).min(data.len());
        read_u16_le(data.get(start..end).unwrap_or(&[]))
    }

    /// RPM of every fan slot, in slot order
    pub fn fetch_fan_rpm(&mut self, device_id: u8) -> Vec<u16> {
        let data = self.read_from_endpoint(Handle::Background, Endpoint::FAN_RPM, device_id);

        match Self::tagged_count(&data, data_type::FAN_RPM, "fan rpm") {
            Ok(count) => (0..count).map(|i| Self::record_value(&data, i)).collect(),
            Err(e) => {
                warn!("Failed to read fan RPMs: {}", e);
                Vec::new()
            }
        }
    }

    /// Raw state byte of every fan slot
    pub fn fetch_fan_states(&mut self, device_id: u8) -> Vec<u8> {
        let data = self.read_from_endpoint(Handle::Background, Endpoint::FAN_STATES, device_id);

        match Self::tagged_count(&data, data_type::FAN_STATES, "fan states") {
            Ok(count) => {
                let end = (RECORDS_OFFSET + count).min(data.len());
                data.get(RECORDS_OFFSET..end).unwrap_or(&[]).to_vec()
            }
            Err(e) => {
                warn!("Failed to read fan states: {}", e);
                Vec::new()
            }
        }
    }

    /// Temperature of every probe slot in degrees Celsius
    pub fn fetch_temperatures(&mut self, device_id: u8) -> Vec<f64> {
        self.transport.pause(1);
        let data = self.read_from_endpoint(Handle::Background, Endpoint::TEMPERATURE_DATA, device_id);

        match Self::tagged_count(&data, data_type::TEMPERATURE_PROBES, "temperature probes") {
            Ok(count) => {
                debug!("Device reported {} temperature probes", count);
                (0..count)
                    .map(|i| f64::from(Self::record_value(&data, i)) / 10.0)
                    .collect()
            }
            Err(e) => {
                warn!("Failed to read temperature data: {}", e);
                Vec::new()
            }
        }
    }

    /// Write duty targets to the fan speeds endpoint
    pub fn set_fan_speeds(&mut self, targets: &[FanDuty], device_id: u8) -> Result<()> {
        let mut payload = vec![data_type::FAN_DUTY, 0x00, targets.len() as u8];
        for target in targets {
            payload.extend_from_slice(&[target.slot, 0x00, target.duty, 0x00]);
        }

        self.write_to_endpoint(Handle::Background, Endpoint::FAN_SPEEDS, &payload, device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{rpm_payload, temperature_payload, FakeHub};
    use std::collections::VecDeque;

    /// Transport that answers every read from a script
    struct MockTransport {
        responses: VecDeque<Vec<u8>>,
        sent: Vec<Vec<u8>>,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                responses: VecDeque::new(),
                sent: Vec::new(),
            }
        }

        fn queue_response(&mut self, response: Vec<u8>) {
            self.responses.push_back(response);
        }
    }

    impl HidTransport for MockTransport {
        fn write(&mut self, packet: &[u8], _length: usize) -> Result<()> {
            self.sent.push(packet.to_vec());
            Ok(())
        }

        fn read(&mut self, _length: usize) -> Result<Vec<u8>> {
            Ok(self.responses.pop_front().unwrap_or_default())
        }

        fn clear_read_buffer(&mut self) {}

        fn pause(&mut self, _ms: u64) {}

        fn capabilities(&self) -> Capabilities {
            Capabilities {
                write_length: 64,
                read_length: 64,
            }
        }
    }

    #[test]
    fn test_packet_layouts() {
        let mut protocol = LinkProtocol::new(FakeHub::new());
        protocol.fetch_property(Property::MODE, 1);
        let _ = protocol.set_property(Property::MODE, 2, 1);
        let _ = protocol.open_handle(Handle::Background, Endpoint::LIGHTING_CONTROLLER, 1);
        let _ = protocol.close_handle(Handle::Background, 1);
        protocol.is_handle_open(Handle::Auxiliary, 1);
        protocol.ping_device(1);

        let written = &protocol.transport().written;
        assert_eq!(written[0], vec![0x00, 0x00, 0x01, 0x02, 0x03, 0x00]);
        assert_eq!(
            written[1],
            vec![0x00, 0x00, 0x01, 0x01, 0x03, 0x00, 0x02, 0x00, 0x00]
        );
        assert_eq!(written[2], vec![0x00, 0x00, 0x01, 0x0D, 0x01, 0x22]);
        assert_eq!(written[3], vec![0x00, 0x00, 0x01, 0x05, 0x01, 0x01]);
        assert_eq!(written[4], vec![0x00, 0x00, 0x01, 0x09, 0x02, 0x00]);
        assert_eq!(written[5], vec![0x00, 0x00, 0x01, 0x12]);
    }

    #[test]
    fn test_set_then_fetch_roundtrip() {
        let mut protocol = LinkProtocol::new(FakeHub::new());
        for value in [Mode::Software.code(), 0x0001_02FF, 0] {
            assert!(protocol.set_property(Property::MODE, value, 0).is_ok());
            assert_eq!(protocol.fetch_property(Property::MODE, 0), Some(value));
        }
    }

    #[test]
    fn test_fetch_unsupported_property() {
        let mut protocol = LinkProtocol::new(FakeHub::new());
        assert_eq!(protocol.fetch_property(Property::BATTERY_LEVEL, 0), None);
        assert!(!protocol.is_property_supported(Property::BATTERY_LEVEL, 0));
        assert!(protocol.is_property_supported(Property::FIRMWARE, 0));
    }

    #[test]
    fn test_fetch_property_empty_reply() {
        let mut protocol = LinkProtocol::new(MockTransport::new());
        assert_eq!(protocol.fetch_property(Property::MODE, 0), None);
        assert!(matches!(
            protocol.read_property(Property::MODE, 0),
            Err(LinkHubError::NotSupported(name)) if name == "Mode (0x03)"
        ));
        assert!(!protocol.is_property_supported(Property::MODE, 0));
    }

    #[test]
    fn test_set_property_error_codes() {
        let mut hub = FakeHub::new();
        hub.read_only.insert(Property::VENDOR_ID.code());
        let mut protocol = LinkProtocol::new(hub);

        let result = protocol.set_property(Property::VENDOR_ID, 1, 0);
        assert!(matches!(
            result,
            Err(LinkHubError::Device(DeviceError::ReadOnly))
        ));

        let result = protocol.set_property(Property::BRIGHTNESS, 1, 0);
        assert!(matches!(
            result,
            Err(LinkHubError::Device(DeviceError::OperationFailed))
        ));
    }

    #[test]
    fn test_sentinel_status_is_success() {
        let mut mock = MockTransport::new();
        mock.queue_response(vec![0x00, 0x00, 0x01, 0x01, 13]);
        mock.queue_response(vec![0x00, 0x00, 0x01, 0x01, 55]);
        mock.queue_response(vec![0x00, 0x00, 0x01, 0x01, 42]);
        let mut protocol = LinkProtocol::new(mock);

        assert!(protocol.set_property(Property::BRIGHTNESS, 500, 1).is_ok());
        assert!(protocol.set_property(Property::BRIGHTNESS, 500, 1).is_ok());
        assert!(matches!(
            protocol.set_property(Property::BRIGHTNESS, 500, 1),
            Err(LinkHubError::Device(DeviceError::Unknown(42)))
        ));
    }

    #[test]
    fn test_check_and_set_is_idempotent() {
        let mut protocol = LinkProtocol::new(FakeHub::new());

        for _ in 0..5 {
            assert!(protocol.check_and_set_property(Property::MODE, 2, 0));
        }
        assert_eq!(protocol.transport().sets_of(Property::MODE), 1);
    }

    #[test]
    fn test_check_and_set_sets_once_when_value_never_sticks() {
        let mut hub = FakeHub::new();
        hub.sticky.insert(Property::MODE.code());
        let mut protocol = LinkProtocol::new(hub);

        assert!(!protocol.check_and_set_property(Property::MODE, 2, 0));
        assert_eq!(protocol.transport().sets_of(Property::MODE), 1);
    }

    #[test]
    fn test_read_from_endpoint_closes_handle() {
        let hub = FakeHub::new().with_endpoint(Endpoint::FAN_RPM, rpm_payload(&[1200]));
        let mut protocol = LinkProtocol::new(hub);

        for _ in 0..3 {
            let data = protocol.read_from_endpoint(Handle::Background, Endpoint::FAN_RPM, 1);
            assert_eq!(data[5], data_type::FAN_RPM);
            assert_eq!(protocol.transport().open[Handle::Background.code() as usize], None);
        }
    }

    #[test]
    fn test_read_from_endpoint_closes_stale_handle() {
        let mut hub = FakeHub::new().with_endpoint(Endpoint::FAN_RPM, rpm_payload(&[900]));
        hub.open[1] = Some(Endpoint::CHILD_DEVICES.code());
        let mut protocol = LinkProtocol::new(hub);

        let data = protocol.read_from_endpoint(Handle::Background, Endpoint::FAN_RPM, 1);
        assert!(!data.is_empty());
        assert_eq!(protocol.transport().open[1], None);
    }

    #[test]
    fn test_read_from_unsupported_endpoint_is_empty_and_closed() {
        let mut protocol = LinkProtocol::new(FakeHub::new());
        let data = protocol.read_from_endpoint(Handle::Background, Endpoint::ERROR_LOG, 1);

        assert!(data.is_empty());
        assert_eq!(protocol.transport().open[1], None);
        // Close is issued on the failure path as well
        let last = protocol.transport().written.last().unwrap().clone();
        assert_eq!(last, vec![0x00, 0x00, 0x01, 0x05, 0x01, 0x01]);
    }

    #[test]
    fn test_write_to_endpoint_frames_length() {
        let hub = FakeHub::new().with_endpoint(Endpoint::FAN_SPEEDS, Vec::new());
        let mut protocol = LinkProtocol::new(hub);

        let targets = [FanDuty { slot: 3, duty: 60 }, FanDuty { slot: 8, duty: 20 }];
        assert!(protocol.set_fan_speeds(&targets, 1).is_ok());

        let write = protocol
            .transport()
            .written
            .iter()
            .find(|p| p[3] == Command::WriteEndpoint as u8)
            .unwrap()
            .clone();
        assert_eq!(&write[..5], &[0x00, 0x00, 0x01, 0x06, 0x01]);
        assert_eq!(&write[5..9], &[11, 0, 0, 0]);
        assert_eq!(
            &write[9..],
            &[0x07, 0x00, 0x02, 3, 0, 60, 0, 8, 0, 20, 0]
        );
        assert_eq!(protocol.transport().open[1], None);
    }

    #[test]
    fn test_write_to_unsupported_endpoint_fails() {
        let mut protocol = LinkProtocol::new(FakeHub::new());
        let result = protocol.write_to_endpoint(Handle::Background, Endpoint::BUTTONS, &[1], 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_rgb_chunking() {
        let mut hub = FakeHub::new();
        hub.capabilities = Capabilities {
            write_length: 64,
            read_length: 64,
        };
        let mut protocol = LinkProtocol::new(hub);

        let rgb: Vec<u8> = (0..300).map(|i| (i % 251) as u8).collect();
        protocol.send_rgb_data(&rgb, 1).unwrap();

        let hub = protocol.transport();
        assert_eq!(hub.open[0], Some(Endpoint::LIGHTING_CONTROLLER.code()));

        let lighting: Vec<&Vec<u8>> = hub
            .written
            .iter()
            .filter(|p| p[3] == Command::WriteEndpoint as u8 && p[4] == 0x00)
            .collect();
        let streams: Vec<&Vec<u8>> = hub
            .written
            .iter()
            .filter(|p| p[3] == Command::StreamEndpoint as u8)
            .collect();

        assert_eq!(lighting.len(), 1);
        assert_eq!(lighting[0].len() - LIGHTING_HEADER, 64 - 9);
        assert_eq!(streams.len(), 5);
        for stream in &streams {
            assert!(stream.len() <= 64);
        }

        // Total length includes the two tag bytes
        assert_eq!(&lighting[0][5..9], &write_u32_le(302));

        let mut reassembled = lighting[0][LIGHTING_HEADER..].to_vec();
        for stream in &streams {
            reassembled.extend_from_slice(&stream[STREAM_HEADER..]);
        }
        assert_eq!(&reassembled[..2], &[data_type::LIGHTING_CONTROLLER, 0x00]);
        assert_eq!(&reassembled[2..], rgb.as_slice());
    }

    #[test]
    fn test_rgb_keeps_lighting_handle_open() {
        let mut protocol = LinkProtocol::new(FakeHub::new());
        protocol.send_rgb_data(&[0xFF; 30], 1).unwrap();
        protocol.send_rgb_data(&[0x00; 30], 1).unwrap();

        let opens = protocol
            .transport()
            .written
            .iter()
            .filter(|p| p[3] == Command::OpenEndpoint as u8)
            .count();
        assert_eq!(opens, 1);
    }

    #[test]
    fn test_set_mode_short_circuits() {
        let mut hub = FakeHub::new();
        hub.properties.insert(Property::MODE.code(), Mode::Software.code());
        let mut protocol = LinkProtocol::new(hub);

        assert!(protocol.set_mode(Mode::Software, 1));
        assert_eq!(protocol.transport().written.len(), 1);
    }

    #[test]
    fn test_set_mode_closes_all_handles() {
        let mut hub = FakeHub::new();
        hub.open = [Some(0x22), Some(0x17), Some(0x21)];
        let mut protocol = LinkProtocol::new(hub);

        assert!(protocol.set_mode(Mode::Software, 1));
        let hub = protocol.transport();
        assert_eq!(hub.open, [None, None, None]);
        assert_eq!(hub.properties[&Property::MODE.code()], Mode::Software.code());
        assert!(hub.pauses.iter().filter(|&&ms| ms == 10).count() >= 4);
    }

    #[test]
    fn test_set_mode_unknown_readback() {
        let mut hub = FakeHub::new();
        hub.properties.insert(Property::MODE.code(), 7);
        hub.sticky.insert(Property::MODE.code());
        let mut protocol = LinkProtocol::new(hub);

        assert!(!protocol.set_mode(Mode::Software, 1));
    }

    #[test]
    fn test_force_software_mode() {
        let mut protocol = LinkProtocol::new(FakeHub::new());
        assert!(protocol.force_software_mode(1, 5));
        assert_eq!(protocol.fetch_mode(1), Some(Mode::Software));
    }

    #[test]
    fn test_force_software_mode_gives_up() {
        let mut hub = FakeHub::new();
        hub.sticky.insert(Property::MODE.code());
        let mut protocol = LinkProtocol::new(hub);

        assert!(!protocol.force_software_mode(1, 5));
        assert_eq!(protocol.transport().sets_of(Property::MODE), 5);
    }

    #[test]
    fn test_ping() {
        let mut protocol = LinkProtocol::new(FakeHub::new());
        assert!(protocol.ping_device(1));

        let mut mock = MockTransport::new();
        mock.queue_response(vec![0x00, 0x00, 0x01, 0x12, 0x00, 0x00]);
        let mut protocol = LinkProtocol::new(mock);
        assert!(!protocol.ping_device(1));
        // No reply at all
        assert!(!protocol.ping_device(1));
    }

    #[test]
    fn test_fetch_fan_rpm() {
        let hub = FakeHub::new().with_endpoint(Endpoint::FAN_RPM, rpm_payload(&[0, 1450, 0, 2900]));
        let mut protocol = LinkProtocol::new(hub);

        assert_eq!(protocol.fetch_fan_rpm(1), vec![0, 1450, 0, 2900]);
    }

    #[test]
    fn test_fetch_fan_rpm_tag_mismatch() {
        let mut payload = rpm_payload(&[1000]);
        payload[1] = 0x01;
        let hub = FakeHub::new().with_endpoint(Endpoint::FAN_RPM, payload);
        let mut protocol = LinkProtocol::new(hub);

        assert!(protocol.fetch_fan_rpm(1).is_empty());
    }

    #[test]
    fn test_fetch_temperatures() {
        let payload = temperature_payload(&[300, 0, 350]);
        let hub = FakeHub::new().with_endpoint(Endpoint::TEMPERATURE_DATA, payload);
        let mut protocol = LinkProtocol::new(hub);

        assert_eq!(protocol.fetch_temperatures(1), vec![30.0, 0.0, 35.0]);
    }

    #[test]
    fn test_fetch_temperatures_wrong_type() {
        let hub = FakeHub::new().with_endpoint(Endpoint::TEMPERATURE_DATA, rpm_payload(&[300]));
        let mut protocol = LinkProtocol::new(hub);

        assert!(protocol.fetch_temperatures(1).is_empty());
    }

    #[test]
    fn test_fetch_fan_states() {
        let payload = vec![data_type::FAN_STATES, 0x00, 0x04, 0x07, 0x01, 0x04, 0x07];
        let hub = FakeHub::new().with_endpoint(Endpoint::FAN_STATES, payload);
        let mut protocol = LinkProtocol::new(hub);

        assert_eq!(protocol.fetch_fan_states(1), vec![0x07, 0x01, 0x04, 0x07]);
    }

    #[test]
    fn test_fetch_device_information() {
        let mut protocol = LinkProtocol::new(FakeHub::new());
        let info = protocol.fetch_device_information(1);

        assert_eq!(info.vendor_id, Some(0x1B1C));
        assert_eq!(info.product_id, Some(0x0C3F));
        assert_eq!(info.firmware.as_deref(), Some("1.3.46"));
    }

    #[test]
    fn test_dump_supported() {
        let hub = FakeHub::new().with_endpoint(Endpoint::CHILD_DEVICES, vec![]);
        let mut protocol = LinkProtocol::new(hub);

        let properties = protocol.dump_supported_properties(1);
        assert!(properties.contains(&Property::MODE));
        assert!(!properties.contains(&Property::DPI));

        let endpoints = protocol.dump_supported_endpoints(1);
        assert_eq!(
            endpoints,
            vec![Endpoint::LIGHTING_CONTROLLER, Endpoint::CHILD_DEVICES]
        );
        assert_eq!(protocol.transport().open, [None, None, None]);
    }

    #[test]
    fn test_buffer_lengths_cached() {
        let mut hub = FakeHub::new();
        hub.capabilities = Capabilities {
            write_length: 0,
            read_length: 0,
        };
        let mut protocol = LinkProtocol::new(hub);

        let lengths = protocol.buffer_lengths();
        assert_eq!(lengths.write_length, DEFAULT_WRITE_LENGTH);
        assert_eq!(lengths.read_length, DEFAULT_READ_LENGTH);

        protocol.transport_mut().capabilities.write_length = 64;
        assert_eq!(protocol.buffer_lengths().write_length, DEFAULT_WRITE_LENGTH);
    }
}
