//! Probe report formatting
//!
//! Table output with colours, or pretty JSON.

use crate::probe::ProbeReport;
use anyhow::Result;
use colored::*;
use linkhub_core::FanState;
use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn fan_state_name(code: u8) -> String {
    match FanState::from_code(code) {
        Some(FanState::Connected) => "connected".green().to_string(),
        Some(FanState::Initializing) => "initializing".yellow().to_string(),
        Some(FanState::Disconnected) => "disconnected".dimmed().to_string(),
        None => format!("unknown ({:#04x})", code),
    }
}

/// Format a probe report
pub fn format_probe_report(report: &ProbeReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Table => {
            let mut output = String::new();
            output.push_str(&"LINK Hub".bold().to_string());
            output.push('\n');
            output.push_str(&format!(
                "USB ID: {}",
                format!(
                    "{}:{}",
                    or_dash(report.vendor_id.map(|v| format!("{:04x}", v))),
                    or_dash(report.product_id.map(|p| format!("{:04x}", p)))
                )
                .cyan()
            ));
            output.push('\n');
            output.push_str(&format!(
                "Firmware: {}",
                or_dash(report.firmware.as_deref()).cyan()
            ));
            output.push('\n');
            output.push_str(&format!(
                "Mode: {}",
                or_dash(report.mode.map(|m| m.name())).yellow()
            ));
            output.push('\n');
            output.push_str(&format!(
                "Controller: {}",
                if report.controller {
                    "Yes".green()
                } else {
                    "No".red()
                }
            ));

            if !report.devices.is_empty() {
                #[derive(Tabled)]
                struct DeviceRow {
                    #[tabled(rename = "Unique ID")]
                    unique_id: String,
                    #[tabled(rename = "Name")]
                    name: String,
                    #[tabled(rename = "Type")]
                    device_type: u8,
                    #[tabled(rename = "LEDs")]
                    leds: String,
                    #[tabled(rename = "RPM")]
                    rpm: String,
                    #[tabled(rename = "Temp °C")]
                    temperature: String,
                }

                let rows: Vec<DeviceRow> = report
                    .devices
                    .iter()
                    .map(|device| DeviceRow {
                        unique_id: device.unique_id.cyan().to_string(),
                        name: device.name.clone(),
                        device_type: device.device_type,
                        leds: match device.channel {
                            Some(channel) => format!("channel {}", channel + 1),
                            None => device.led_count.to_string(),
                        },
                        rpm: match (device.rpm_slot, device.rpm) {
                            (Some(slot), Some(rpm)) => format!("{} (slot {})", rpm, slot),
                            (Some(slot), None) => format!("- (slot {})", slot),
                            _ => "-".dimmed().to_string(),
                        },
                        temperature: match (device.probe_slot, device.temperature) {
                            (Some(slot), Some(temp)) => format!("{:.1} (slot {})", temp, slot),
                            (Some(slot), None) => format!("- (slot {})", slot),
                            _ => "-".dimmed().to_string(),
                        },
                    })
                    .collect();

                let table = Table::new(rows).with(Style::rounded()).to_string();
                output.push_str(&format!("\n\n{}\n{}", "Child Devices:".bold(), table));
            }

            if !report.channels.is_empty() {
                #[derive(Tabled)]
                struct ChannelRow {
                    #[tabled(rename = "Channel")]
                    name: String,
                    #[tabled(rename = "LEDs")]
                    leds: usize,
                }

                let rows: Vec<ChannelRow> = report
                    .channels
                    .iter()
                    .map(|channel| ChannelRow {
                        name: channel.name.clone(),
                        leds: channel.led_count,
                    })
                    .collect();

                let table = Table::new(rows).with(Style::rounded()).to_string();
                output.push_str(&format!("\n\n{}\n{}", "Strip Channels:".bold(), table));
            }

            if !report.fan_rpms.is_empty() {
                #[derive(Tabled)]
                struct SlotRow {
                    #[tabled(rename = "Slot")]
                    slot: usize,
                    #[tabled(rename = "RPM")]
                    rpm: String,
                    #[tabled(rename = "State")]
                    state: String,
                }

                let rows: Vec<SlotRow> = report
                    .fan_rpms
                    .iter()
                    .enumerate()
                    .map(|(slot, rpm)| SlotRow {
                        slot,
                        rpm: if *rpm > 0 {
                            rpm.to_string().green().to_string()
                        } else {
                            "0".red().to_string()
                        },
                        state: report
                            .fan_states
                            .get(slot)
                            .map(|code| fan_state_name(*code))
                            .unwrap_or_else(|| "-".to_string()),
                    })
                    .collect();

                let table = Table::new(rows).with(Style::rounded()).to_string();
                output.push_str(&format!("\n\n{}\n{}", "Fan Slots:".bold(), table));
            }

            if let Some(properties) = &report.properties {
                output.push_str(&format!("\n\n{}", "Supported Properties:".bold()));
                for property in properties {
                    output.push_str(&format!("\n  {}", property));
                }
            }

            if let Some(endpoints) = &report.endpoints {
                output.push_str(&format!("\n\n{}", "Supported Endpoints:".bold()));
                for endpoint in endpoints {
                    output.push_str(&format!("\n  {}", endpoint));
                }
            }

            Ok(output)
        }
    }
}
