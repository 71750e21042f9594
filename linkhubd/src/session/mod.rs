//! Driver session
//!
//! [`Session`] owns the protocol engine, the host and everything learned
//! about the hub: the registry, the flat fan and probe target lists and
//! the sensor slots seen on the first enumeration pass. It is created once
//! per daemon run and driven by [`Session::tick`].
//!
//! Lifecycle:
//! 1. [`Session::initialize`] switches to software mode, reads identity
//!    and the first temperature pass, detects the controller and hands the
//!    device back to hardware mode so the fans spool up.
//! 2. Once the spool delay has passed, the next tick switches to software
//!    mode for good and discovers strips and child devices.
//! 3. Every later tick runs the keepalive, sends one RGB frame and gives
//!    the poll scheduler a chance to run.

pub mod frame;
pub mod keepalive;
pub mod registry;
pub mod scheduler;

use crate::host::HostBridge;
use keepalive::Keepalive;
use linkhub_core::config::{parse_hex_color, ShutdownAction};
use linkhub_core::{DeviceKind, Mode, Property, Result, StaticConfig, StripChannel};
use linkhub_hardware::discovery::{read_child_table, read_strip_channels};
use linkhub_hardware::{classify, DeviceInformation, FanDuty, HidTransport, LinkProtocol, SlotPools};
use registry::Registry;
use scheduler::{PollContext, StateStack};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// A registered fan control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanTarget {
    pub name: String,
    pub rpm_slot: usize,
    pub device_type: u8,
}

/// A registered temperature sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub name: String,
    pub probe_slot: usize,
}

/// Everything discovery and enumeration learned about the hub
#[derive(Debug, Default)]
pub struct Inventory {
    pub registry: Registry,
    pub fans: Vec<FanTarget>,
    pub probes: Vec<ProbeTarget>,
    /// RPM slots that reported a reading on the first pass
    pub connected_fans: Vec<usize>,
    /// Probe slots that reported a reading on the first pass
    pub connected_probes: Vec<usize>,
    pub channels: Vec<StripChannel>,
}

impl Inventory {
    /// Keep the RPM readings worth reporting, with their slot
    ///
    /// A reading is kept when it is non-zero, or when a later pass finds a
    /// stopped fan in a slot the first pass saw spinning. The first pass
    /// records the connected slots.
    pub fn parse_fan_rpms(&mut self, readings: &[u16], first_run: bool) -> Vec<(usize, u16)> {
        if first_run {
            self.connected_fans.clear();
        }

        let mut kept = Vec::new();
        for (slot, &rpm) in readings.iter().enumerate() {
            if rpm == 0 && (first_run || !self.connected_fans.contains(&slot)) {
                continue;
            }
            if first_run {
                info!("RPM sensor found at position {}", slot);
                self.connected_fans.push(slot);
            }
            kept.push((slot, rpm));
        }
        kept
    }

    /// Keep the non-zero temperature readings, with their slot
    pub fn parse_temperatures(&mut self, readings: &[f64], first_run: bool) -> Vec<(usize, f64)> {
        if first_run {
            self.connected_probes.clear();
        }

        let mut kept = Vec::new();
        for (slot, &celsius) in readings.iter().enumerate() {
            if celsius == 0.0 {
                continue;
            }
            if first_run {
                info!("Temperature sensor found at position {}", slot);
                self.connected_probes.push(slot);
            }
            kept.push((slot, celsius));
        }
        kept
    }

    /// Register a fan control and sensor for every record with a slot
    ///
    /// Earlier registrations are dropped first. Returns whether any fan
    /// was found.
    pub fn create_targets<H: HostBridge>(&mut self, host: &mut H) -> bool {
        self.clear_targets(host);

        for record in self.registry.records() {
            let name = record.sensor_name();

            if let Some(rpm_slot) = record.rpm_slot {
                host.create_fan_control(&name);
                info!("Found RPM {}", name);
                self.fans.push(FanTarget {
                    name: name.clone(),
                    rpm_slot,
                    device_type: record.device_type,
                });
            }

            if let Some(probe_slot) = record.probe_slot {
                host.create_temperature_sensor(&name);
                info!("Found sensor {}", name);
                self.probes.push(ProbeTarget { name, probe_slot });
            }
        }

        !self.fans.is_empty()
    }

    /// Unregister every fan control and sensor
    pub fn clear_targets<H: HostBridge>(&mut self, host: &mut H) {
        for fan in self.fans.drain(..) {
            host.remove_fan_control(&fan.name);
        }
        for probe in self.probes.drain(..) {
            host.remove_temperature_sensor(&probe.name);
        }
    }
}

/// What the poll states see of a session during one tick
struct SessionContext<'a, T: HidTransport, H: HostBridge> {
    protocol: &'a mut LinkProtocol<T>,
    host: &'a mut H,
    inventory: &'a mut Inventory,
    device_id: u8,
    pump_min_duty: u8,
}

impl<T: HidTransport, H: HostBridge> PollContext for SessionContext<'_, T, H> {
    fn monitoring_enabled(&self) -> bool {
        self.host.fan_control_enabled()
    }

    fn has_fans(&self) -> bool {
        !self.inventory.fans.is_empty()
    }

    fn create_sensors(&mut self) -> bool {
        self.inventory.create_targets(self.host)
    }

    fn remove_sensors(&mut self) {
        self.inventory.clear_targets(self.host);
    }

    fn poll_fan_speeds(&mut self) {
        let readings = self.protocol.fetch_fan_rpm(self.device_id);
        let kept = self.inventory.parse_fan_rpms(&readings, false);

        for ((slot, rpm), fan) in kept.into_iter().zip(&self.inventory.fans) {
            if slot == fan.rpm_slot {
                debug!("{} is running at {} rpm", fan.name, rpm);
            }
            self.host.set_fan_rpm(&fan.name, rpm);
        }
    }

    fn poll_temperatures(&mut self) {
        let readings = self.protocol.fetch_temperatures(self.device_id);
        let kept = self.inventory.parse_temperatures(&readings, false);

        for ((slot, celsius), probe) in kept.into_iter().zip(&self.inventory.probes) {
            if slot == probe.probe_slot {
                self.host.set_temperature(&probe.name, celsius);
                debug!("{} is at {}C", probe.name, celsius);
            }
        }
    }

    fn set_fan_speeds(&mut self) {
        let targets: Vec<FanDuty> = self
            .inventory
            .fans
            .iter()
            .map(|fan| {
                let level = self.host.fan_level(&fan.name);
                let duty = if fan.device_type == DeviceKind::LinkAio.code() {
                    level.max(self.pump_min_duty)
                } else {
                    level
                };
                FanDuty {
                    slot: fan.rpm_slot as u8,
                    duty,
                }
            })
            .collect();

        if let Err(e) = self.protocol.set_fan_speeds(&targets, self.device_id) {
            warn!("Failed to set fan speeds: {}", e);
        }
    }
}

/// One driver session against a LINK hub
pub struct Session<T: HidTransport, H: HostBridge> {
    protocol: LinkProtocol<T>,
    host: H,
    config: StaticConfig,
    inventory: Inventory,
    scheduler: StateStack,
    keepalive: Keepalive,
    forced_color: Option<[u8; 3]>,
    device_info: Option<DeviceInformation>,
    controller_detected: bool,
    spool_started: Option<Instant>,
    spooled: bool,
}

impl<T: HidTransport, H: HostBridge> Session<T, H> {
    pub fn new(transport: T, host: H, config: StaticConfig) -> Result<Self> {
        let forced_color = if config.lighting.forced {
            Some(parse_hex_color(&config.lighting.forced_color)?)
        } else {
            None
        };
        let keepalive = Keepalive::new(
            Duration::from_secs(config.polling.keepalive_interval_secs),
            config.polling.software_mode_retries,
        );

        Ok(Self {
            protocol: LinkProtocol::new(transport),
            host,
            config,
            inventory: Inventory::default(),
            scheduler: StateStack::default(),
            keepalive,
            forced_color,
            device_info: None,
            controller_detected: false,
            spool_started: None,
            spooled: false,
        })
    }

    fn device_id(&self) -> u8 {
        self.config.device.address
    }

    /// Bring the hub up and start the spool delay
    pub fn initialize(&mut self, now: Instant) {
        let device_id = self.device_id();
        self.protocol.set_mode(Mode::Software, device_id);

        self.device_info = Some(self.protocol.fetch_device_information(device_id));
        let temperatures = self.protocol.fetch_temperatures(device_id);
        self.inventory.parse_temperatures(&temperatures, true);

        self.controller_detected = self
            .protocol
            .is_property_supported(Property::SUBDEVICE_BITMASK, device_id);
        if self.controller_detected {
            info!("Controller detected");
        } else {
            warn!("Subdevice bitmask is not supported, child devices will not be driven");
        }

        if !self.spooled {
            self.protocol.set_mode(Mode::Hardware, device_id);
            self.spool_started = Some(now);
        }
    }

    /// Advance the session by one tick
    ///
    /// Device failures are logged and absorbed. Only a LED layout contract
    /// violation is returned.
    pub fn tick(&mut self, now: Instant) -> Result<()> {
        if !self.controller_detected {
            return Ok(());
        }

        if !self.spooled {
            let delay = Duration::from_secs(self.config.polling.spool_delay_secs);
            if let Some(started) = self.spool_started {
                if now.saturating_duration_since(started) > delay {
                    self.spool();
                }
            }
            return Ok(());
        }

        let device_id = self.device_id();
        self.keepalive.poll(now, &mut self.protocol, device_id);
        self.update_rgb(None)?;

        let mut ctx = SessionContext {
            protocol: &mut self.protocol,
            host: &mut self.host,
            inventory: &mut self.inventory,
            device_id,
            pump_min_duty: self.config.fans.pump_min_duty,
        };
        if let Some(state) = self.scheduler.process(now, &mut ctx) {
            trace!("Ran poll state {}", state);
        }

        Ok(())
    }

    /// Take over from hardware mode and discover what is attached
    fn spool(&mut self) {
        let device_id = self.device_id();
        self.protocol.set_mode(Mode::Software, device_id);

        let rpms = self.protocol.fetch_fan_rpm(device_id);
        self.inventory.parse_fan_rpms(&rpms, true);

        let channels = read_strip_channels(&mut self.protocol, device_id);
        for channel in &channels {
            self.host.add_channel(channel);
        }
        self.inventory.channels = channels;

        self.discover_children();
        self.spooled = true;

        for record in self.inventory.registry.records() {
            info!("Child device {} - {}", record.name, record.unique_id);
        }
    }

    /// Re-read the child table and replace the registry with it
    ///
    /// Fan and sensor registrations are dropped so the scheduler
    /// enumerates them again from the new records.
    pub fn discover_children(&mut self) {
        let device_id = self.device_id();
        let table = read_child_table(&mut self.protocol, device_id);

        let mut pools = SlotPools::new(
            &self.inventory.connected_fans,
            &self.inventory.connected_probes,
        );
        let mut channel_ids: VecDeque<usize> = (0..self.inventory.channels.len()).collect();
        let records = classify(table, &mut pools, &mut channel_ids);

        self.inventory.clear_targets(&mut self.host);
        self.inventory.registry.replace_all(records, &mut self.host);
        info!("{} child devices registered", self.inventory.registry.len());
    }

    /// Send one frame, `override_color` taking precedence over everything
    pub fn update_rgb(&mut self, override_color: Option<[u8; 3]>) -> Result<()> {
        let color = override_color.or(self.forced_color);
        let frame = frame::assemble_frame(
            self.inventory.registry.records(),
            &self.inventory.channels,
            &self.host,
            color,
        )?;

        if frame.is_empty() {
            return Ok(());
        }

        let device_id = self.device_id();
        if let Err(e) = self.protocol.send_rgb_data(&frame, device_id) {
            warn!("Failed to send RGB frame: {}", e);
        }
        Ok(())
    }

    /// Leave the hub in its shutdown state
    ///
    /// Blanks the LEDs when the system is suspending or the configuration
    /// asks for it, otherwise keeps the hub in software mode.
    pub fn shutdown(&mut self, suspending: bool) -> Result<()> {
        if suspending || self.config.lighting.shutdown == ShutdownAction::Blank {
            info!("Blanking LEDs");
            self.update_rgb(Some([0, 0, 0]))
        } else {
            let device_id = self.device_id();
            self.protocol.set_mode(Mode::Software, device_id);
            Ok(())
        }
    }

    pub fn protocol(&self) -> &LinkProtocol<T> {
        &self.protocol
    }

    pub fn protocol_mut(&mut self) -> &mut LinkProtocol<T> {
        &mut self.protocol
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn scheduler(&self) -> &StateStack {
        &self.scheduler
    }

    pub fn device_info(&self) -> Option<&DeviceInformation> {
        self.device_info.as_ref()
    }

    pub fn controller_detected(&self) -> bool {
        self.controller_detected
    }

    pub fn is_spooled(&self) -> bool {
        self.spooled
    }
}
