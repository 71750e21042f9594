//! Configuration types for LinkHub
//!
//! A single [`StaticConfig`] TOML document is loaded once at startup. Every
//! section is optional and falls back to defaults that match the stock
//! iCUE LINK hub.

mod paths;
mod static_config;

pub use paths::default_config_path;
pub use static_config::{
    parse_hex_color, DeviceConfig, FansConfig, LightingConfig, PollingConfig, ShutdownAction,
    StaticConfig,
};
