//! Simulated hub for tests
//!
//! [`FakeHub`] keeps device state (properties, handle table, endpoint
//! payloads) and answers packets the way the firmware does, so engine and
//! session code can be exercised without hardware. Builders for endpoint
//! payloads live alongside it.

use crate::transport::{Capabilities, HidTransport};
use linkhub_core::codec::{read_u32_le, write_u16_le, write_u24_le};
use linkhub_core::types::data_type;
use linkhub_core::{Command, Endpoint, Handle, Mode, Property, Result};
use std::collections::{HashMap, HashSet, VecDeque};

/// In-memory hub that answers packets the way the firmware does
pub struct FakeHub {
    pub properties: HashMap<u8, u32>,
    pub read_only: HashSet<u8>,
    /// Properties whose sets are acknowledged but ignored
    pub sticky: HashSet<u8>,
    pub endpoints: HashMap<u8, Vec<u8>>,
    pub open: [Option<u8>; 3],
    pub replies: VecDeque<Vec<u8>>,
    pub written: Vec<Vec<u8>>,
    pub pauses: Vec<u64>,
    pub capabilities: Capabilities,
}

impl FakeHub {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(Property::MODE.code(), Mode::Hardware.code());
        properties.insert(Property::VENDOR_ID.code(), 0x1B1C);
        properties.insert(Property::PRODUCT_ID.code(), 0x0C3F);
        properties.insert(Property::FIRMWARE.code(), 0x2E_03_01);

        let mut endpoints = HashMap::new();
        endpoints.insert(Endpoint::LIGHTING_CONTROLLER.code(), Vec::new());

        Self {
            properties,
            read_only: HashSet::new(),
            sticky: HashSet::new(),
            endpoints,
            open: [None; 3],
            replies: VecDeque::new(),
            written: Vec::new(),
            pauses: Vec::new(),
            capabilities: Capabilities {
                write_length: 513,
                read_length: 512,
            },
        }
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint, payload: Vec<u8>) -> Self {
        self.endpoints.insert(endpoint.code(), payload);
        self
    }

    pub fn sets_of(&self, property: Property) -> usize {
        self.written
            .iter()
            .filter(|p| p[3] == Command::SetProperty as u8 && p[4] == property.code())
            .count()
    }

    fn reply(&mut self, packet: &[u8], status: u8, payload: &[u8]) {
        let mut reply = vec![0x00, 0x00, packet[2], packet[3], status];
        reply.extend_from_slice(payload);
        self.replies.push_back(reply);
    }
}

impl Default for FakeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl HidTransport for FakeHub {
    fn write(&mut self, packet: &[u8], _length: usize) -> Result<()> {
        self.written.push(packet.to_vec());
        let byte = |i: usize| packet.get(i).copied().unwrap_or(0);

        match byte(3) {
            0x02 => match self.properties.get(&byte(4)).copied() {
                Some(value) => self.reply(packet, 0, &write_u24_le(value)),
                None => self.reply(packet, 5, &[]),
            },
            0x01 => {
                let property = byte(4);
                if self.read_only.contains(&property) {
                    self.reply(packet, 9, &[]);
                } else if self.properties.contains_key(&property) {
                    if !self.sticky.contains(&property) {
                        let value = read_u32_le(&packet[6..9]);
                        self.properties.insert(property, value);
                    }
                    self.reply(packet, 0, &[]);
                } else {
                    self.reply(packet, 3, &[]);
                }
            }
            0x0D => {
                let handle = byte(4) as usize;
                let endpoint = byte(5);
                if self.open[handle].is_none() && self.endpoints.contains_key(&endpoint) {
                    self.open[handle] = Some(endpoint);
                    self.reply(packet, 0, &[]);
                } else {
                    self.reply(packet, 3, &[]);
                }
            }
            0x05 => {
                let handle = byte(5) as usize;
                let status = if self.open[handle].take().is_some() { 0 } else { 3 };
                self.reply(packet, status, &[]);
            }
            0x09 => {
                let status = if self.open[byte(4) as usize].is_some() { 0 } else { 3 };
                self.reply(packet, status, &[]);
            }
            0x08 => match self.open[byte(4) as usize] {
                Some(endpoint) => {
                    let payload = self.endpoints.get(&endpoint).cloned().unwrap_or_default();
                    self.reply(packet, 0, &payload);
                }
                None => self.reply(packet, 3, &[]),
            },
            0x06 if byte(4) != Handle::Lighting.code() => {
                let status = if self.open[byte(4) as usize].is_some() { 0 } else { 3 };
                self.reply(packet, status, &[]);
            }
            0x12 => self.reply(packet, 0, &[0x12]),
            // Lighting writes and streams are not acknowledged
            _ => {}
        }
        Ok(())
    }

    fn read(&mut self, _length: usize) -> Result<Vec<u8>> {
        Ok(self.replies.pop_front().unwrap_or_default())
    }

    fn clear_read_buffer(&mut self) {
        self.replies.clear();
    }

    fn pause(&mut self, ms: u64) {
        self.pauses.push(ms);
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}

/// Fan RPM endpoint payload
pub fn rpm_payload(values: &[u16]) -> Vec<u8> {
    let mut payload = vec![data_type::FAN_RPM, 0x00, values.len() as u8];
    for value in values {
        payload.push(0x00);
        payload.extend_from_slice(&write_u16_le(*value));
    }
    payload
}

/// Temperature endpoint payload, values in tenths of a degree
pub fn temperature_payload(tenths: &[u16]) -> Vec<u8> {
    let mut payload = vec![data_type::TEMPERATURE_PROBES, 0x00, tenths.len() as u8];
    for value in tenths {
        payload.push(if *value == 0 { 0x01 } else { 0x00 });
        payload.extend_from_slice(&write_u16_le(*value));
    }
    payload
}

/// One child table record: header, display text, then the serial
pub fn child_record(
    device_type: u8,
    cooler_type: u8,
    display: &str,
    serial: &str,
    len: usize,
) -> Vec<u8> {
    let mut record = vec![0x00, 0x00, device_type, cooler_type, 0x00, 0x00, 0x00, 0x00];
    record.extend_from_slice(display.as_bytes());
    record.resize(len - serial.len(), 0x00);
    record.extend_from_slice(serial.as_bytes());
    record
}

/// Child devices endpoint payload holding `records`
pub fn child_table_payload(records: &[Vec<u8>]) -> Vec<u8> {
    let mut payload = vec![0x21, 0x00, records.len() as u8];
    for record in records {
        payload.extend_from_slice(record);
    }
    payload.resize(payload.len() + 16, 0x00);
    payload
}
