//! Configuration loading
//!
//! The static configuration is read once at startup. A missing file is
//! created with defaults so users have something to edit.

use linkhub_core::{LinkHubError, Result, StaticConfig};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// Load the configuration at `path`, writing defaults if it does not exist
pub async fn load_static_config(path: &Path) -> Result<StaticConfig> {
    if !path.exists() {
        info!(
            "Static config not found at {}. Creating with defaults.",
            path.display()
        );

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                LinkHubError::Config(format!(
                    "Failed to create config directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let config = StaticConfig::default();
        let toml_str = config
            .to_toml()
            .map_err(|e| LinkHubError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, &toml_str)
            .await
            .map_err(|e| LinkHubError::Config(format!("Failed to write config file: {}", e)))?;

        return Ok(config);
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| LinkHubError::Config(format!("Failed to read config file: {}", e)))?;

    let config = StaticConfig::from_toml(&content)
        .map_err(|e| LinkHubError::Config(format!("Failed to parse config file: {}", e)))?;
    config.validate()?;

    debug!(
        "Device {:04X}:{:04X} at address {}, tick every {}ms",
        config.device.vendor_id,
        config.device.product_id,
        config.device.address,
        config.polling.tick_interval_ms
    );
    Ok(config)
}
