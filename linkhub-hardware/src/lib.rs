//! linkhub-hardware
//!
//! Hardware crate for the LINK hub: the HID transport, the protocol engine
//! that speaks the property/endpoint/handle protocol over it, and child
//! device discovery built on the engine.
//
//! Public API:
//! - `transport::HidDriver`: hidapi-backed transport
//! - `transport::find_link_hub`: helper to locate the hub by VID/PID/usage page
//! - `protocol::LinkProtocol`: protocol engine over any `HidTransport`
//! - `discovery`: strip and child table scans plus classification

pub mod discovery;
pub mod protocol;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use discovery::{classify, ChildTable, SlotPools};
pub use protocol::{DeviceInformation, FanDuty, LinkProtocol};
pub use transport::{find_link_hub, Capabilities, HidDriver, HidTransport};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_present() {
        let _ = std::any::TypeId::of::<HidDriver>();
        let _ = std::any::TypeId::of::<LinkProtocol<HidDriver>>();
    }
}
