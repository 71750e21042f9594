//! RGB frame assembly
//!
//! One frame covers every registry record in order. Channel-backed records
//! contribute their strip's colours, everything else is laid out through
//! its LED map in transmit order.

use crate::host::HostBridge;
use linkhub_core::{DeviceKind, DeviceRecord, LinkHubError, Result, StripChannel};
use tracing::debug;

/// Build the RGB bytes for one frame
///
/// `override_color` replaces every sampled colour. A record whose layout
/// does not line up with its LED map is an error.
pub fn assemble_frame<H: HostBridge>(
    records: &[DeviceRecord],
    channels: &[StripChannel],
    host: &H,
    override_color: Option<[u8; 3]>,
) -> Result<Vec<u8>> {
    let mut frame = Vec::new();

    for record in records {
        if let Some(index) = record.channel {
            let channel = channels.get(index).ok_or_else(|| {
                LinkHubError::LayoutContract(format!(
                    "{} refers to channel {} but only {} exist",
                    record.unique_id,
                    index,
                    channels.len()
                ))
            })?;
            frame.extend(channel_bytes(channel, host, override_color));
            continue;
        }

        if record.device_type == DeviceKind::LsAdapter.code() {
            debug!("Strip adapter {} has no channel", record.unique_id);
            continue;
        }

        frame.extend(device_bytes(record, host, override_color)?);
    }

    Ok(frame)
}

fn channel_bytes<H: HostBridge>(
    channel: &StripChannel,
    host: &H,
    override_color: Option<[u8; 3]>,
) -> Vec<u8> {
    let colors = match override_color {
        Some(color) => vec![color; channel.led_count],
        None => host.channel_colors(channel),
    };

    let mut bytes: Vec<u8> = colors.into_iter().flatten().collect();
    bytes.resize(channel.led_count * 3, 0);
    bytes
}

fn device_bytes<H: HostBridge>(
    record: &DeviceRecord,
    host: &H,
    override_color: Option<[u8; 3]>,
) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; record.led_count() * 3];

    for (index, &(x, y)) in record.led_positions.iter().enumerate() {
        let slot = *record.led_map.get(index).ok_or_else(|| {
            LinkHubError::LayoutContract(format!(
                "{} has no LED map entry for position {}",
                record.name, index
            ))
        })?;

        let target = bytes.get_mut(slot * 3..slot * 3 + 3).ok_or_else(|| {
            LinkHubError::LayoutContract(format!(
                "{} maps LED {} to slot {} outside of {} LEDs",
                record.name,
                index,
                slot,
                record.led_count()
            ))
        })?;

        let color = override_color.unwrap_or_else(|| host.subdevice_color(&record.unique_id, x, y));
        target.copy_from_slice(&color);
    }

    Ok(bytes)
}
