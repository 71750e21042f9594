//! LinkHub Core Library
//!
//! Protocol constants, the binary codec, the child device catalog and the
//! configuration types shared by the hardware layer and the daemon.

pub mod catalog;
pub mod codec;
pub mod config;
pub mod device;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use catalog::{AioModel, DeviceKind, Geometry, Resolved};
pub use config::{default_config_path, StaticConfig};
pub use device::{ChildDeviceDescriptor, DeviceRecord, StripChannel};
pub use error::*;
pub use types::*;
