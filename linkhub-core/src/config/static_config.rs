//! Static configuration loaded once at startup
//!
//! This configuration is read-only after the daemon starts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{LinkHubError, Result};

/// USB identity and HID transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// USB vendor id
    pub vendor_id: u16,
    /// USB product id
    pub product_id: u16,
    /// HID usage page of the vendor interface
    pub usage_page: u16,
    /// Device address byte placed in every packet
    pub address: u8,
    /// Write packet length reported as transport capability
    pub write_length: usize,
    /// Read packet length reported as transport capability
    pub read_length: usize,
    /// HID read timeout in milliseconds
    pub read_timeout_ms: i32,
    /// Log every packet sent and received
    pub debug_hid: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: 0x1B1C,
            product_id: 0x0C3F,
            usage_page: 0xFF42,
            address: 0x01,
            write_length: 513,
            read_length: 512,
            read_timeout_ms: 1000,
            debug_hid: false,
        }
    }
}

/// Tick and keepalive cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Interval between session ticks in milliseconds
    pub tick_interval_ms: u64,
    /// Seconds between keepalive pings
    pub keepalive_interval_secs: u64,
    /// Seconds to leave the device in hardware mode after start
    pub spool_delay_secs: u64,
    /// Attempts when forcing software mode back on
    pub software_mode_retries: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 33,
            keepalive_interval_secs: 50,
            spool_delay_secs: 11,
            software_mode_retries: 5,
        }
    }
}

/// Fan control settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FansConfig {
    /// Drive fan controls and temperature sensors at all
    pub monitoring_enabled: bool,
    /// Duty percentage for fans without an override
    pub default_duty: u8,
    /// Lowest duty percentage ever sent to an AIO pump
    pub pump_min_duty: u8,
    /// Duty percentage per fan control name
    pub overrides: HashMap<String, u8>,
}

impl Default for FansConfig {
    fn default() -> Self {
        Self {
            monitoring_enabled: true,
            default_duty: 0x35,
            pump_min_duty: 20,
            overrides: HashMap::new(),
        }
    }
}

/// What to do with the LEDs when the daemon stops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownAction {
    /// Leave the device in software mode
    Software,
    /// Blank every LED
    Blank,
}

/// Lighting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Colour for every LED without a per-device colour
    pub color: String,
    /// Override every LED with `forced_color`
    pub forced: bool,
    /// Colour used when `forced` is set
    pub forced_color: String,
    /// Colours keyed by device unique id or channel name
    pub device_colors: HashMap<String, String>,
    /// Behaviour on shutdown
    pub shutdown: ShutdownAction,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            color: "#009bde".to_string(),
            forced: false,
            forced_color: "#009bde".to_string(),
            device_colors: HashMap::new(),
            shutdown: ShutdownAction::Software,
        }
    }
}

/// Static configuration for the LinkHub daemon.
///
/// This is loaded once at startup and remains immutable during runtime.
/// Located at `~/.config/linkhub/config.toml` by default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub fans: FansConfig,

    #[serde(default)]
    pub lighting: LightingConfig,
}

impl StaticConfig {
    /// Parse StaticConfig from TOML string.
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize StaticConfig to TOML string.
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Check value ranges and colour strings
    pub fn validate(&self) -> Result<()> {
        if self.fans.default_duty > 100 {
            return Err(LinkHubError::Config(format!(
                "default_duty {} exceeds 100",
                self.fans.default_duty
            )));
        }
        if self.fans.pump_min_duty > 100 {
            return Err(LinkHubError::Config(format!(
                "pump_min_duty {} exceeds 100",
                self.fans.pump_min_duty
            )));
        }
        for (name, duty) in &self.fans.overrides {
            if *duty > 100 {
                return Err(LinkHubError::Config(format!(
                    "duty override for '{}' is {} which exceeds 100",
                    name, duty
                )));
            }
        }
        if self.device.write_length < 16 || self.device.read_length < 16 {
            return Err(LinkHubError::Config(
                "HID packet lengths must be at least 16 bytes".to_string(),
            ));
        }

        parse_hex_color(&self.lighting.color)?;
        parse_hex_color(&self.lighting.forced_color)?;
        for color in self.lighting.device_colors.values() {
            parse_hex_color(color)?;
        }

        Ok(())
    }
}

/// Parse a `#rrggbb` colour string
///
/// ```
/// use linkhub_core::config::parse_hex_color;
///
/// assert_eq!(parse_hex_color("#009bde").unwrap(), [0x00, 0x9B, 0xDE]);
/// assert_eq!(parse_hex_color("FF0000").unwrap(), [0xFF, 0x00, 0x00]);
/// assert!(parse_hex_color("#12345").is_err());
/// ```
pub fn parse_hex_color(value: &str) -> Result<[u8; 3]> {
    let hex = value.strip_prefix('#').unwrap_or(value);
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(LinkHubError::Config(format!("invalid colour '{}'", value)));
    }

    let mut rgb = [0u8; 3];
    for (index, channel) in rgb.iter_mut().enumerate() {
        let digits = &hex[index * 2..index * 2 + 2];
        *channel = u8::from_str_radix(digits, 16)
            .map_err(|_| LinkHubError::Config(format!("invalid colour '{}'", value)))?;
    }
    Ok(rgb)
}
