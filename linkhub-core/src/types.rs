//! Protocol identifiers for the LINK hub
//!
//! Properties, endpoints and handles are plain numeric codes on the wire.
//! Each has a canonical code type plus a lookup table for display names,
//! with explicit `from_code` / `from_name` constructors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Command opcodes (byte 3 of every packet)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Set a property value (0x01)
    SetProperty = 0x01,
    /// Get a property value (0x02)
    GetProperty = 0x02,
    /// Close a handle (0x05)
    CloseHandle = 0x05,
    /// Write to an open endpoint (0x06)
    WriteEndpoint = 0x06,
    /// Continue a write that did not fit in one packet (0x07)
    StreamEndpoint = 0x07,
    /// Read from an open endpoint (0x08)
    ReadEndpoint = 0x08,
    /// Query the state of a handle (0x09)
    CheckHandle = 0x09,
    /// Open an endpoint on a handle (0x0D)
    OpenEndpoint = 0x0D,
    /// Ping the device (0x12)
    PingDevice = 0x12,
}

/// A readable or settable device attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Property(u8);

impl Property {
    pub const POLLING_RATE: Property = Property(0x01);
    pub const BRIGHTNESS: Property = Property(0x02);
    pub const MODE: Property = Property(0x03);
    pub const ANGLE_SNAP: Property = Property(0x07);
    pub const IDLE_MODE: Property = Property(0x0D);
    pub const BATTERY_LEVEL: Property = Property(0x0F);
    pub const BATTERY_STATUS: Property = Property(0x10);
    pub const VENDOR_ID: Property = Property(0x11);
    pub const PRODUCT_ID: Property = Property(0x12);
    pub const FIRMWARE: Property = Property(0x13);
    pub const BOOTLOADER_FIRMWARE: Property = Property(0x14);
    pub const WIRELESS_FIRMWARE: Property = Property(0x15);
    pub const DPI_PROFILE: Property = Property(0x1E);
    pub const DPI_MASK: Property = Property(0x1F);
    pub const DPI: Property = Property(0x20);
    pub const DPI_X: Property = Property(0x21);
    pub const DPI_Y: Property = Property(0x22);
    pub const SUBDEVICE_BITMASK: Property = Property(0x36);
    pub const IDLE_MODE_TIMEOUT: Property = Property(0x37);
    pub const LAYOUT: Property = Property(0x41);
    pub const BRIGHTNESS_LEVEL: Property = Property(0x44);
    pub const WIN_LOCK_STATE: Property = Property(0x45);
    pub const LOCKED_SHORTCUTS: Property = Property(0x4A);
    pub const MAX_POLLING_RATE: Property = Property(0x96);

    const NAMES: &'static [(u8, &'static str)] = &[
        (0x01, "Polling Rate"),
        (0x02, "HW Brightness"),
        (0x03, "Mode"),
        (0x07, "Angle Snapping"),
        (0x0D, "Idle Mode"),
        (0x0F, "Battery Level"),
        (0x10, "Battery Status"),
        (0x11, "Vendor Id"),
        (0x12, "Product Id"),
        (0x13, "Firmware Version"),
        (0x14, "Bootloader Firmware Version"),
        (0x15, "Wireless Firmware Version"),
        (0x16, "Wireless Bootloader Version"),
        (0x1E, "DPI Profile"),
        (0x1F, "DPI Mask"),
        (0x20, "DPI"),
        (0x21, "DPI X"),
        (0x22, "DPI Y"),
        (0x2F, "DPI 0 Color"),
        (0x30, "DPI 1 Color"),
        (0x31, "DPI 2 Color"),
        (0x36, "Wireless Subdevices"),
        (0x37, "Idle Mode Timeout"),
        (0x41, "HW Layout"),
        (0x44, "Brightness Level"),
        (0x45, "WinLock Enabled"),
        (0x4A, "WinLock Disabled Shortcuts"),
        (0x5F, "MultipointConnectionSupport"),
        (0x96, "Max Polling Rate"),
    ];

    /// Wrap a raw property code
    pub const fn from_code(code: u8) -> Self {
        Property(code)
    }

    /// Look up a property by its display name
    pub fn from_name(name: &str) -> Option<Self> {
        lookup_code(Self::NAMES, name).map(Property)
    }

    /// Raw property code
    pub const fn code(self) -> u8 {
        self.0
    }

    /// Display name, or "Unknown Property"
    pub fn name(self) -> &'static str {
        lookup_name(Self::NAMES, self.0).unwrap_or("Unknown Property")
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#04x})", self.name(), self.0)
    }
}

/// A data channel that must be opened on a handle before use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint(u8);

impl Endpoint {
    pub const LIGHTING: Endpoint = Endpoint(0x01);
    pub const BUTTONS: Endpoint = Endpoint(0x02);
    pub const PAIRING_ID: Endpoint = Endpoint(0x05);
    pub const FAN_RPM: Endpoint = Endpoint(0x17);
    pub const FAN_SPEEDS: Endpoint = Endpoint(0x18);
    pub const FAN_STATES: Endpoint = Endpoint(0x1A);
    pub const LED_COUNT_3PIN: Endpoint = Endpoint(0x1D);
    pub const LED_COUNT_4PIN: Endpoint = Endpoint(0x1E);
    pub const LED_COUNT_LINK_3PIN: Endpoint = Endpoint(0x20);
    pub const TEMPERATURE_DATA: Endpoint = Endpoint(0x21);
    pub const LIGHTING_CONTROLLER: Endpoint = Endpoint(0x22);
    pub const ERROR_LOG: Endpoint = Endpoint(0x27);
    pub const CHILD_DEVICES: Endpoint = Endpoint(0x36);

    const NAMES: &'static [(u8, &'static str)] = &[
        (0x01, "Lighting"),
        (0x02, "Buttons"),
        (0x05, "Pairing Id"),
        (0x10, "Lighting Monochrome"),
        (0x17, "Fan RPM"),
        (0x18, "Fan Speeds"),
        (0x1A, "Fan States"),
        (0x1D, "3Pin Led Count"),
        (0x1E, "4Pin Led Count"),
        (0x20, "Link 3Pin Led Count"),
        (0x21, "Temperature Probes"),
        (0x22, "Lighting Controller"),
        (0x27, "Error Log"),
        (0x36, "Child Devices"),
    ];

    /// Wrap a raw endpoint code
    pub const fn from_code(code: u8) -> Self {
        Endpoint(code)
    }

    /// Look up an endpoint by its display name
    pub fn from_name(name: &str) -> Option<Self> {
        lookup_code(Self::NAMES, name).map(Endpoint)
    }

    /// Raw endpoint code
    pub const fn code(self) -> u8 {
        self.0
    }

    /// Display name, or "Unknown Endpoint"
    pub fn name(self) -> &'static str {
        lookup_name(Self::NAMES, self.0).unwrap_or("Unknown Endpoint")
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#04x})", self.name(), self.0)
    }
}

/// Device-side slot through which exactly one endpoint may be open
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    /// Kept open across frames for RGB streaming
    Lighting = 0x00,
    /// General purpose handle for sensor and table reads
    Background = 0x01,
    /// Only needed in very specific cases
    Auxiliary = 0x02,
}

impl Handle {
    /// All handles, in the order they are closed on a mode switch
    pub const ALL: [Handle; 3] = [Handle::Lighting, Handle::Background, Handle::Auxiliary];

    /// Build from a raw handle code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Handle::Lighting),
            0x01 => Some(Handle::Background),
            0x02 => Some(Handle::Auxiliary),
            _ => None,
        }
    }

    /// Build from a display name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|handle| handle.name() == name)
    }

    /// Raw handle code
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            Handle::Lighting => "Lighting",
            Handle::Background => "Background",
            Handle::Auxiliary => "Auxiliary",
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#04x})", self.name(), self.code())
    }
}

/// Device operating mode
///
/// Software mode must hold for RGB output and sensor telemetry to be
/// controllable. The device silently reverts to Hardware after the driver
/// disconnects.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Hardware = 0x01,
    Software = 0x02,
}

impl Mode {
    /// Build from the raw value of the mode property
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0x01 => Some(Mode::Hardware),
            0x02 => Some(Mode::Software),
            _ => None,
        }
    }

    /// Build from a display name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Hardware" => Some(Mode::Hardware),
            "Software" => Some(Mode::Software),
            _ => None,
        }
    }

    /// Raw mode value
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            Mode::Hardware => "Hardware",
            Mode::Software => "Software",
        }
    }
}

/// Type tags leading endpoint payloads
pub mod data_type {
    pub const FAN_RPM: u8 = 0x06;
    pub const FAN_DUTY: u8 = 0x07;
    pub const FAN_STATES: u8 = 0x09;
    pub const LED_COUNT_3PIN: u8 = 0x0C;
    pub const FAN_TYPES: u8 = 0x0D;
    pub const LED_CONFIG: u8 = 0x0F;
    pub const TEMPERATURE_PROBES: u8 = 0x10;
    pub const LIGHTING_CONTROLLER: u8 = 0x12;
}

/// Fan port states reported by the fan states endpoint
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FanState {
    /// The port is empty
    Disconnected = 0x01,
    /// Still being determined by the device; rescan in a few seconds
    Initializing = 0x04,
    /// A fan is connected
    Connected = 0x07,
}

impl FanState {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(FanState::Disconnected),
            0x04 => Some(FanState::Initializing),
            0x07 => Some(FanState::Connected),
            _ => None,
        }
    }
}

fn lookup_name(table: &[(u8, &'static str)], code: u8) -> Option<&'static str> {
    table
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, name)| *name)
}

fn lookup_code(table: &[(u8, &'static str)], name: &str) -> Option<u8> {
    table
        .iter()
        .find(|(_, candidate)| *candidate == name)
        .map(|(code, _)| *code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_values() {
        assert_eq!(Command::SetProperty as u8, 0x01);
        assert_eq!(Command::GetProperty as u8, 0x02);
        assert_eq!(Command::CloseHandle as u8, 0x05);
        assert_eq!(Command::WriteEndpoint as u8, 0x06);
        assert_eq!(Command::StreamEndpoint as u8, 0x07);
        assert_eq!(Command::ReadEndpoint as u8, 0x08);
        assert_eq!(Command::CheckHandle as u8, 0x09);
        assert_eq!(Command::OpenEndpoint as u8, 0x0D);
        assert_eq!(Command::PingDevice as u8, 0x12);
    }

    #[test]
    fn test_property_constructors_agree() {
        assert_eq!(Property::from_name("Mode"), Some(Property::MODE));
        assert_eq!(Property::from_code(0x03), Property::MODE);
        assert_eq!(Property::MODE.name(), "Mode");
        assert_eq!(Property::from_name("Not A Property"), None);
        assert_eq!(Property::from_code(0x63).name(), "Unknown Property");
    }

    #[test]
    fn test_endpoint_constructors_agree() {
        assert_eq!(Endpoint::from_name("Fan RPM"), Some(Endpoint::FAN_RPM));
        assert_eq!(Endpoint::CHILD_DEVICES.code(), 0x36);
        assert_eq!(Endpoint::from_code(0x7F).name(), "Unknown Endpoint");
    }

    #[test]
    fn test_handle_codes() {
        for handle in Handle::ALL {
            assert_eq!(Handle::from_code(handle.code()), Some(handle));
            assert_eq!(Handle::from_name(handle.name()), Some(handle));
        }
        assert_eq!(Handle::from_code(3), None);
    }

    #[test]
    fn test_mode_codes() {
        assert_eq!(Mode::from_code(1), Some(Mode::Hardware));
        assert_eq!(Mode::from_code(2), Some(Mode::Software));
        assert_eq!(Mode::from_code(0), None);
        assert_eq!(Mode::from_name("Software"), Some(Mode::Software));
        assert_eq!(Mode::Software.code(), 2);
    }

    #[test]
    fn test_display_includes_code() {
        assert_eq!(format!("{}", Property::MODE), "Mode (0x03)");
        assert_eq!(format!("{}", Handle::Background), "Background (0x01)");
    }

    #[test]
    fn test_fan_state_codes() {
        assert_eq!(FanState::from_code(7), Some(FanState::Connected));
        assert_eq!(FanState::from_code(2), None);
    }
}
