//! Host side of the driver
//!
//! The session reports readings and registrations through [`HostBridge`],
//! and asks it for fan duty targets and LED colours. [`DaemonHost`] is the
//! daemon's own host: it serves colours and duties from the static
//! configuration and keeps the latest readings for logging.

use linkhub_core::config::{parse_hex_color, FansConfig, LightingConfig};
use linkhub_core::{DeviceRecord, Result, StripChannel};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Callbacks the session drives
pub trait HostBridge {
    /// Whether fan monitoring and control is enabled
    fn fan_control_enabled(&self) -> bool;

    fn create_fan_control(&mut self, name: &str);
    fn remove_fan_control(&mut self, name: &str);
    fn set_fan_rpm(&mut self, name: &str, rpm: u16);
    /// Requested duty for a fan control, in percent
    fn fan_level(&self, name: &str) -> u8;

    fn create_temperature_sensor(&mut self, name: &str);
    fn remove_temperature_sensor(&mut self, name: &str);
    fn set_temperature(&mut self, name: &str, celsius: f64);

    fn add_subdevice(&mut self, record: &DeviceRecord);
    fn remove_subdevice(&mut self, unique_id: &str);
    fn add_channel(&mut self, channel: &StripChannel);

    /// Colour of the LED at `(x, y)` on a sub-device
    fn subdevice_color(&self, unique_id: &str, x: u32, y: u32) -> [u8; 3];
    /// Colours of every LED on a strip channel
    fn channel_colors(&self, channel: &StripChannel) -> Vec<[u8; 3]>;
}

/// Host backed by the static configuration
#[derive(Debug, Clone)]
pub struct DaemonHost {
    monitoring_enabled: bool,
    default_duty: u8,
    duty_overrides: HashMap<String, u8>,
    color: [u8; 3],
    device_colors: HashMap<String, [u8; 3]>,
    fans: BTreeMap<String, Option<u16>>,
    sensors: BTreeMap<String, Option<f64>>,
    subdevices: Vec<String>,
    channels: Vec<String>,
}

impl DaemonHost {
    pub fn new(fans: &FansConfig, lighting: &LightingConfig) -> Result<Self> {
        let device_colors = lighting
            .device_colors
            .iter()
            .map(|(key, value)| parse_hex_color(value).map(|rgb| (key.clone(), rgb)))
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(Self {
            monitoring_enabled: fans.monitoring_enabled,
            default_duty: fans.default_duty,
            duty_overrides: fans.overrides.clone(),
            color: parse_hex_color(&lighting.color)?,
            device_colors,
            fans: BTreeMap::new(),
            sensors: BTreeMap::new(),
            subdevices: Vec::new(),
            channels: Vec::new(),
        })
    }

    pub fn set_monitoring_enabled(&mut self, enabled: bool) {
        self.monitoring_enabled = enabled;
    }

    /// Latest RPM of a registered fan control
    pub fn fan_rpm(&self, name: &str) -> Option<u16> {
        self.fans.get(name).copied().flatten()
    }

    /// Latest reading of a registered temperature sensor
    pub fn temperature(&self, name: &str) -> Option<f64> {
        self.sensors.get(name).copied().flatten()
    }

    pub fn fan_controls(&self) -> impl Iterator<Item = &str> {
        self.fans.keys().map(String::as_str)
    }

    pub fn temperature_sensors(&self) -> impl Iterator<Item = &str> {
        self.sensors.keys().map(String::as_str)
    }

    pub fn subdevices(&self) -> &[String] {
        &self.subdevices
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    fn color_for(&self, key: &str) -> [u8; 3] {
        self.device_colors.get(key).copied().unwrap_or(self.color)
    }
}

impl HostBridge for DaemonHost {
    fn fan_control_enabled(&self) -> bool {
        self.monitoring_enabled
    }

    fn create_fan_control(&mut self, name: &str) {
        info!("Fan control created: {}", name);
        self.fans.insert(name.to_string(), None);
    }

    fn remove_fan_control(&mut self, name: &str) {
        info!("Removing fan control: {}", name);
        self.fans.remove(name);
    }

    fn set_fan_rpm(&mut self, name: &str, rpm: u16) {
        if let Some(slot) = self.fans.get_mut(name) {
            *slot = Some(rpm);
        }
    }

    fn fan_level(&self, name: &str) -> u8 {
        self.duty_overrides
            .get(name)
            .copied()
            .unwrap_or(self.default_duty)
    }

    fn create_temperature_sensor(&mut self, name: &str) {
        info!("Temperature sensor created: {}", name);
        self.sensors.insert(name.to_string(), None);
    }

    fn remove_temperature_sensor(&mut self, name: &str) {
        info!("Removing temperature sensor: {}", name);
        self.sensors.remove(name);
    }

    fn set_temperature(&mut self, name: &str, celsius: f64) {
        if let Some(slot) = self.sensors.get_mut(name) {
            *slot = Some(celsius);
        }
    }

    fn add_subdevice(&mut self, record: &DeviceRecord) {
        debug!(
            "Sub-device {} ({}) with {} LEDs, size {:?}",
            record.unique_id,
            record.name,
            record.led_names.len(),
            record.size
        );
        self.subdevices.push(record.unique_id.clone());
    }

    fn remove_subdevice(&mut self, unique_id: &str) {
        debug!("Removing sub-device {}", unique_id);
        self.subdevices.retain(|id| id != unique_id);
    }

    fn add_channel(&mut self, channel: &StripChannel) {
        debug!("Channel {} with {} LEDs", channel.name, channel.led_count);
        if !self.channels.contains(&channel.name) {
            self.channels.push(channel.name.clone());
        }
    }

    fn subdevice_color(&self, unique_id: &str, _x: u32, _y: u32) -> [u8; 3] {
        self.color_for(unique_id)
    }

    fn channel_colors(&self, channel: &StripChannel) -> Vec<[u8; 3]> {
        vec![self.color_for(&channel.name); channel.led_count]
    }
}
