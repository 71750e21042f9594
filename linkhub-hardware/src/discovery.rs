//! Child device discovery
//!
//! Two raw scans run against endpoint buffers: the LED strip adapter scan
//! on the LINK 3-pin LED count endpoint, and the child table scan on the
//! child devices endpoint. [`classify`] turns the scanned descriptors into
//! registry records, handing out sensor slots in discovery order.

use crate::protocol::LinkProtocol;
use crate::transport::HidTransport;
use linkhub_core::{
    ChildDeviceDescriptor, DeviceKind, DeviceRecord, Endpoint, Handle, StripChannel,
};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// First byte of the strip adapter scan
const STRIP_SCAN_START: usize = 15;
/// Strip runs claiming more sections than this are firmware noise
const MAX_STRIP_SECTIONS: u8 = 4;
/// Cursor advance after an accepted strip run
const STRIP_ADVANCE: usize = 4;

/// First byte of the child table scan
const CHILD_SCAN_START: usize = 8;
const CHILD_SLICE_LEN: usize = 34;
const CHILD_ADVANCE: usize = 32;
/// LCD records carry a shorter serial
const LCD_SLICE_LEN: usize = 30;
const LCD_ADVANCE: usize = 28;

/// Result of a child table scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildTable {
    /// Every non-LCD record, in table order
    pub children: Vec<ChildDeviceDescriptor>,
    /// LCD cap waiting to be merged onto its pump
    pub pending_lcd: Option<ChildDeviceDescriptor>,
}

/// Sensor slots gathered on the first RPM and temperature passes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotPools {
    pub fans: VecDeque<usize>,
    pub probes: VecDeque<usize>,
}

impl SlotPools {
    pub fn new(fans: &[usize], probes: &[usize]) -> Self {
        Self {
            fans: fans.iter().copied().collect(),
            probes: probes.iter().copied().collect(),
        }
    }
}

/// Find LED strip runs in a LINK 3-pin LED count buffer
///
/// A run is `(sections, 0x00, leds)` with both counts non-zero. Runs
/// with more than four sections are skipped without consuming them.
pub fn scan_strip_channels(data: &[u8]) -> Vec<StripChannel> {
    let mut channels = Vec::new();
    let mut cursor = STRIP_SCAN_START;

    while cursor < data.len() {
        let sections = data[cursor];
        let gap = data.get(cursor + 1).copied();
        let leds = data.get(cursor + 2).copied().unwrap_or(0);

        if sections == 0 || gap != Some(0) || leds == 0 {
            cursor += 1;
            continue;
        }

        debug!(
            "Possible strip found with {} LEDs and {} sections",
            leds, sections
        );

        if sections > MAX_STRIP_SECTIONS {
            debug!("Strip claims {} sections. Skipping", sections);
            cursor += 1;
            continue;
        }

        channels.push(StripChannel {
            name: format!("Ls Link Adapter {}", channels.len() + 1),
            led_count: leds as usize,
        });
        cursor += STRIP_ADVANCE;
    }

    channels
}

fn is_child_record(data: &[u8], at: usize) -> bool {
    let byte = |offset: usize| data.get(at + offset).copied();

    byte(0) == Some(0)
        && byte(1) == Some(0)
        && matches!(byte(2), Some(kind) if kind != 0)
        && byte(4) == Some(0)
        && byte(5) == Some(0)
}

/// Find child records in a child devices buffer
pub fn scan_child_table(data: &[u8]) -> ChildTable {
    let mut table = ChildTable::default();
    let mut cursor = CHILD_SCAN_START;

    while cursor < data.len() {
        if !is_child_record(data, cursor) {
            cursor += 1;
            continue;
        }

        let device_type = data[cursor + 2];
        let cooler_type = data[cursor + 3];
        debug!("Possible child device found with device type {}", device_type);

        let is_lcd = device_type == DeviceKind::LinkLcd.code();
        let (slice_len, advance) = if is_lcd {
            (LCD_SLICE_LEN, LCD_ADVANCE)
        } else {
            (CHILD_SLICE_LEN, CHILD_ADVANCE)
        };

        let end = (cursor + slice_len).min(data.len());
        let child = ChildDeviceDescriptor::from_id_slice(device_type, cooler_type, &data[cursor..end]);
        debug!(
            "Converted device id {} with unique id {}",
            child.display_id, child.unique_id
        );

        if is_lcd {
            info!("LCD found: {}", child.unique_id);
            table.pending_lcd = Some(child);
        } else {
            table.children.push(child);
        }

        cursor += advance;
    }

    table
}

/// Classify scanned children into registry records
///
/// Sensor slots are shifted off `pools` in table order. Strip adapters
/// take channel ids from `channel_ids` in the same way. A pending LCD is
/// emitted right after the first composite cooler, and dropped if there
/// is none.
pub fn classify(
    table: ChildTable,
    pools: &mut SlotPools,
    channel_ids: &mut VecDeque<usize>,
) -> Vec<DeviceRecord> {
    let ChildTable {
        children,
        mut pending_lcd,
    } = table;
    let mut records = Vec::with_capacity(children.len() + 1);

    for mut child in children {
        if child.device_type == DeviceKind::LsAdapter.code() {
            let channel = channel_ids.pop_front();
            debug!("Strip adapter {} takes channel {:?}", child.unique_id, channel);
            records.push(DeviceRecord::strip_adapter(
                child.unique_id,
                child.device_type,
                channel,
            ));
            continue;
        }

        let Some(kind) = DeviceKind::from_code(child.device_type) else {
            warn!(
                "Unknown child device type {} ({}). Skipping",
                child.device_type, child.unique_id
            );
            continue;
        };

        let Some(resolved) = kind.resolve(child.cooler_type) else {
            warn!(
                "Unknown cooler type {} for {:?} ({}). Skipping",
                child.cooler_type, kind, child.unique_id
            );
            continue;
        };

        child.probe_slot = if resolved.probe { pools.probes.pop_front() } else { None };
        child.rpm_slot = if resolved.rpm { pools.fans.pop_front() } else { None };
        debug!(
            "{} takes probe slot {:?} and rpm slot {:?}",
            child.unique_id, child.probe_slot, child.rpm_slot
        );

        let Some(record) =
            DeviceRecord::from_resolved(&resolved, child.unique_id, child.rpm_slot, child.probe_slot)
        else {
            continue;
        };
        info!("Adding child {} (type {})", record.name, record.device_type);
        records.push(record);

        if resolved.is_pump() {
            if let Some(lcd) = pending_lcd.take() {
                if let Some(record) = lcd_record(&lcd) {
                    info!("Adding child LCD cooler: {}", record.unique_id);
                    records.push(record);
                }
            }
        }
    }

    if let Some(lcd) = pending_lcd {
        warn!("LCD {} found without a pump to attach to", lcd.unique_id);
    }

    records
}

fn lcd_record(lcd: &ChildDeviceDescriptor) -> Option<DeviceRecord> {
    let resolved = DeviceKind::LinkLcd.resolve(lcd.cooler_type)?;
    DeviceRecord::from_resolved(&resolved, lcd.unique_id.clone(), None, None)
}

/// Read and scan the strip adapter endpoint
pub fn read_strip_channels<T: HidTransport>(
    protocol: &mut LinkProtocol<T>,
    device_id: u8,
) -> Vec<StripChannel> {
    let data =
        protocol.read_from_endpoint(Handle::Background, Endpoint::LED_COUNT_LINK_3PIN, device_id);
    let channels = scan_strip_channels(&data);

    let total: usize = channels.iter().map(|c| c.led_count).sum();
    debug!("Found {} strip channels with {} LEDs", channels.len(), total);
    channels
}

/// Read and scan the child devices endpoint
pub fn read_child_table<T: HidTransport>(
    protocol: &mut LinkProtocol<T>,
    device_id: u8,
) -> ChildTable {
    let data = protocol.read_from_endpoint(Handle::Lighting, Endpoint::CHILD_DEVICES, device_id);
    if data.is_empty() {
        warn!("Child device table read came back empty");
    }
    scan_child_table(&data)
}
