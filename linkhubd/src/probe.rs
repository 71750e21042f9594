//! One-shot discovery report
//!
//! Takes the hub into software mode, reads identity, sensors and the child
//! table once, then hands it back to hardware mode.

use crate::session::Inventory;
use linkhub_core::{DeviceRecord, Mode, Property, StripChannel};
use linkhub_hardware::discovery::{read_child_table, read_strip_channels};
use linkhub_hardware::{classify, HidTransport, LinkProtocol, SlotPools};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::info;

/// A classified child device with its current readings
#[derive(Debug, Clone, Serialize)]
pub struct ProbedDevice {
    pub unique_id: String,
    pub name: String,
    pub device_type: u8,
    pub led_count: usize,
    pub rpm_slot: Option<usize>,
    pub probe_slot: Option<usize>,
    pub channel: Option<usize>,
    pub rpm: Option<u16>,
    pub temperature: Option<f64>,
}

impl ProbedDevice {
    fn from_record(record: &DeviceRecord, rpms: &[u16], temperatures: &[f64]) -> Self {
        Self {
            unique_id: record.unique_id.clone(),
            name: record.name.clone(),
            device_type: record.device_type,
            led_count: record.led_count(),
            rpm_slot: record.rpm_slot,
            probe_slot: record.probe_slot,
            channel: record.channel,
            rpm: record.rpm_slot.and_then(|slot| rpms.get(slot).copied()),
            temperature: record
                .probe_slot
                .and_then(|slot| temperatures.get(slot).copied()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub vendor_id: Option<u32>,
    pub product_id: Option<u32>,
    pub firmware: Option<String>,
    /// Mode the hub was in before probing
    pub mode: Option<Mode>,
    /// Whether the hub drives child devices
    pub controller: bool,
    pub fan_rpms: Vec<u16>,
    pub fan_states: Vec<u8>,
    pub temperatures: Vec<f64>,
    pub devices: Vec<ProbedDevice>,
    pub channels: Vec<StripChannel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<String>>,
}

/// Probe the hub once
///
/// With `dump` set, every property and endpoint id is also tried.
pub fn probe<T: HidTransport>(
    protocol: &mut LinkProtocol<T>,
    device_id: u8,
    dump: bool,
) -> ProbeReport {
    let mode = protocol.fetch_mode(device_id);
    protocol.set_mode(Mode::Software, device_id);

    let info = protocol.fetch_device_information(device_id);
    let controller = protocol.is_property_supported(Property::SUBDEVICE_BITMASK, device_id);

    let fan_rpms = protocol.fetch_fan_rpm(device_id);
    let fan_states = protocol.fetch_fan_states(device_id);
    let temperatures = protocol.fetch_temperatures(device_id);

    let mut inventory = Inventory::default();
    inventory.parse_fan_rpms(&fan_rpms, true);
    inventory.parse_temperatures(&temperatures, true);

    let channels = read_strip_channels(protocol, device_id);
    let devices = if controller {
        let table = read_child_table(protocol, device_id);
        let mut pools = SlotPools::new(&inventory.connected_fans, &inventory.connected_probes);
        let mut channel_ids: VecDeque<usize> = (0..channels.len()).collect();

        classify(table, &mut pools, &mut channel_ids)
            .iter()
            .map(|record| ProbedDevice::from_record(record, &fan_rpms, &temperatures))
            .collect()
    } else {
        Vec::new()
    };

    let (properties, endpoints) = if dump {
        let properties = protocol
            .dump_supported_properties(device_id)
            .iter()
            .map(ToString::to_string)
            .collect();
        let endpoints = protocol
            .dump_supported_endpoints(device_id)
            .iter()
            .map(ToString::to_string)
            .collect();
        (Some(properties), Some(endpoints))
    } else {
        (None, None)
    };

    protocol.set_mode(Mode::Hardware, device_id);
    info!("Probe found {} child devices", devices.len());

    ProbeReport {
        vendor_id: info.vendor_id,
        product_id: info.product_id,
        firmware: info.firmware,
        mode,
        controller,
        fan_rpms,
        fan_states,
        temperatures,
        devices,
        channels,
        properties,
        endpoints,
    }
}
