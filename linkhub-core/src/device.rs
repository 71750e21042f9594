//! Child device model types
//!
//! [`ChildDeviceDescriptor`] is the raw result of a child table scan.
//! [`DeviceRecord`] is the classified entry the session registry owns.

use crate::catalog::{Geometry, Resolved};
use serde::{Deserialize, Serialize};

/// Offset inside an identifier slice where the text begins
const ID_TEXT_OFFSET: usize = 8;

/// Length of the trailing unique id inside an identifier slice
const UNIQUE_ID_LEN: usize = 8;

/// A child device found in the child table, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDeviceDescriptor {
    pub device_type: u8,
    pub cooler_type: u8,
    /// Identifier bytes as sliced from the table
    pub raw_id: Vec<u8>,
    /// Human readable identifier
    pub display_id: String,
    /// Registry key
    pub unique_id: String,
    pub rpm_slot: Option<usize>,
    pub probe_slot: Option<usize>,
}

impl ChildDeviceDescriptor {
    /// Decode an identifier slice
    ///
    /// Bytes from offset 8 onwards are text with NULs dropped. The last 8
    /// bytes of the slice form the unique id, everything before them the
    /// display id.
    ///
    /// ```
    /// use linkhub_core::device::ChildDeviceDescriptor;
    ///
    /// let mut slice = vec![0u8, 0, 1, 0, 0, 0, 0, 0];
    /// slice.extend_from_slice(b"QX\0\0ABCDEFGH");
    /// let child = ChildDeviceDescriptor::from_id_slice(1, 0, &slice);
    /// assert_eq!(child.display_id, "QX");
    /// assert_eq!(child.unique_id, "ABCDEFGH");
    /// ```
    pub fn from_id_slice(device_type: u8, cooler_type: u8, slice: &[u8]) -> Self {
        let unique_start = slice.len().saturating_sub(UNIQUE_ID_LEN);
        let mut display = Vec::new();
        let mut unique = Vec::new();

        for (index, &byte) in slice.iter().enumerate().skip(ID_TEXT_OFFSET) {
            if byte == 0 {
                continue;
            }
            if index >= unique_start {
                unique.push(byte);
            } else {
                display.push(byte);
            }
        }

        Self {
            device_type,
            cooler_type,
            raw_id: slice.to_vec(),
            display_id: String::from_utf8_lossy(&display).into_owned(),
            unique_id: String::from_utf8_lossy(&unique).into_owned(),
            rpm_slot: None,
            probe_slot: None,
        }
    }
}

/// An LED strip channel found by the strip adapter scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripChannel {
    pub name: String,
    pub led_count: usize,
}

/// A classified child device owned by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    pub size: (u32, u32),
    pub led_names: Vec<String>,
    pub led_positions: Vec<(u32, u32)>,
    pub led_map: Vec<usize>,
    /// Registry key
    pub unique_id: String,
    pub rpm_slot: Option<usize>,
    pub probe_slot: Option<usize>,
    pub device_type: u8,
    /// Strip channel index for LED strip adapters, which have no geometry
    pub channel: Option<usize>,
}

impl DeviceRecord {
    /// Build a record from a resolved catalog entry
    pub fn from_geometry(
        geometry: &Geometry,
        unique_id: impl Into<String>,
        device_type: u8,
        rpm_slot: Option<usize>,
        probe_slot: Option<usize>,
    ) -> Self {
        Self {
            name: geometry.name.to_string(),
            size: geometry.size,
            led_names: geometry.led_names(),
            led_positions: geometry.led_positions.to_vec(),
            led_map: geometry.led_map.to_vec(),
            unique_id: unique_id.into(),
            rpm_slot,
            probe_slot,
            device_type,
            channel: None,
        }
    }

    /// Build a channel-backed record for an LED strip adapter
    pub fn strip_adapter(unique_id: impl Into<String>, device_type: u8, channel: Option<usize>) -> Self {
        Self {
            name: "LS Adapter".to_string(),
            size: (1, 1),
            led_names: Vec::new(),
            led_positions: Vec::new(),
            led_map: Vec::new(),
            unique_id: unique_id.into(),
            rpm_slot: None,
            probe_slot: None,
            device_type,
            channel,
        }
    }

    /// Build a record from a resolution result, taking sensor slots as given
    pub fn from_resolved(
        resolved: &Resolved,
        unique_id: impl Into<String>,
        rpm_slot: Option<usize>,
        probe_slot: Option<usize>,
    ) -> Option<Self> {
        resolved.geometry.map(|geometry| {
            Self::from_geometry(
                geometry,
                unique_id,
                resolved.kind.code(),
                rpm_slot,
                probe_slot,
            )
        })
    }

    /// Name used for the fan control and temperature sensor of this device
    pub fn sensor_name(&self) -> String {
        format!("{} - {}", self.name, self.unique_id)
    }

    pub fn led_count(&self) -> usize {
        self.led_map.len()
    }
}
