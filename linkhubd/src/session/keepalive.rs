//! Device keepalive
//!
//! The hub drops back to hardware mode when it stops hearing from the
//! host. Every keepalive interval the device is pinged and, when its mode
//! has drifted, forced back into software mode.

use linkhub_core::Mode;
use linkhub_hardware::{HidTransport, LinkProtocol};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

#[derive(Debug)]
pub struct Keepalive {
    interval: Duration,
    retries: u32,
    last_poll: Option<Instant>,
}

impl Keepalive {
    pub fn new(interval: Duration, retries: u32) -> Self {
        Self {
            interval,
            retries,
            last_poll: None,
        }
    }

    /// Ping and correct the mode if the interval has elapsed
    ///
    /// Returns whether a poll took place.
    pub fn poll<T: HidTransport>(
        &mut self,
        now: Instant,
        protocol: &mut LinkProtocol<T>,
        device_id: u8,
    ) -> bool {
        if let Some(last) = self.last_poll {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }

        if protocol.ping_device(device_id) {
            debug!("Device ping successful");
        } else {
            warn!("Device ping failed");
        }

        let mode = protocol.fetch_mode(device_id);
        if mode != Some(Mode::Software) {
            warn!("Device mode was {:?}, forcing software mode", mode);
            if !protocol.force_software_mode(device_id, self.retries) {
                error!(
                    "Failed to set software mode after {} attempts",
                    self.retries
                );
            }
        }

        self.last_poll = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkhub_core::Property;
    use linkhub_hardware::mock::FakeHub;

    fn keepalive() -> Keepalive {
        Keepalive::new(Duration::from_secs(50), 5)
    }

    #[test]
    fn test_restores_software_mode() {
        let mut protocol = LinkProtocol::new(FakeHub::new());
        let mut keepalive = keepalive();

        assert!(keepalive.poll(Instant::now(), &mut protocol, 1));
        assert_eq!(protocol.fetch_mode(1), Some(Mode::Software));
        assert_eq!(protocol.transport().sets_of(Property::MODE), 1);
    }

    #[test]
    fn test_gives_up_after_retries() {
        let mut hub = FakeHub::new();
        hub.sticky.insert(Property::MODE.code());
        let mut protocol = LinkProtocol::new(hub);
        let mut keepalive = keepalive();

        assert!(keepalive.poll(Instant::now(), &mut protocol, 1));
        assert_eq!(protocol.fetch_mode(1), Some(Mode::Hardware));
        assert_eq!(protocol.transport().sets_of(Property::MODE), 5);
    }

    #[test]
    fn test_leaves_software_mode_alone() {
        let mut hub = FakeHub::new();
        hub.properties
            .insert(Property::MODE.code(), Mode::Software.code());
        let mut protocol = LinkProtocol::new(hub);

        keepalive().poll(Instant::now(), &mut protocol, 1);
        assert_eq!(protocol.transport().sets_of(Property::MODE), 0);
        assert!(protocol
            .transport()
            .written
            .iter()
            .any(|packet| packet[3] == 0x12));
    }

    #[test]
    fn test_runs_on_cadence() {
        let mut protocol = LinkProtocol::new(FakeHub::new());
        let mut keepalive = keepalive();
        let start = Instant::now();

        assert!(keepalive.poll(start, &mut protocol, 1));
        let written = protocol.transport().written.len();

        assert!(!keepalive.poll(start + Duration::from_secs(49), &mut protocol, 1));
        assert_eq!(protocol.transport().written.len(), written);

        assert!(keepalive.poll(start + Duration::from_secs(50), &mut protocol, 1));
    }
}
