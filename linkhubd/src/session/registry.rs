//! Ordered registry of classified child devices
//!
//! Keyed by unique id. Insertion order is the order LED data is sent in.

use crate::host::HostBridge;
use linkhub_core::{DeviceKind, DeviceRecord};
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct Registry {
    records: Vec<DeviceRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, announcing it to the host
    ///
    /// Adding a unique id that is already present does nothing and
    /// returns false.
    pub fn add<H: HostBridge>(&mut self, record: DeviceRecord, host: &mut H) -> bool {
        if self.contains(&record.unique_id) {
            info!(
                "Child device {} ({}) is already registered",
                record.unique_id, record.name
            );
            return false;
        }

        // Strip adapters light through their channel instead
        if record.device_type != DeviceKind::LsAdapter.code() {
            host.add_subdevice(&record);
        }

        debug!("Registered {} - {}", record.name, record.unique_id);
        self.records.push(record);
        true
    }

    pub fn remove<H: HostBridge>(&mut self, unique_id: &str, host: &mut H) -> Option<DeviceRecord> {
        let index = self.records.iter().position(|r| r.unique_id == unique_id)?;
        let record = self.records.remove(index);
        host.remove_subdevice(unique_id);
        info!("Removed child device {} - {}", record.name, record.unique_id);
        Some(record)
    }

    /// Drop every record and register `records` in their place
    pub fn replace_all<H: HostBridge>(&mut self, records: Vec<DeviceRecord>, host: &mut H) {
        let previous: Vec<String> = self.records.iter().map(|r| r.unique_id.clone()).collect();
        for unique_id in previous {
            self.remove(&unique_id, host);
        }

        for record in records {
            self.add(record, host);
        }
    }

    pub fn get(&self, unique_id: &str) -> Option<&DeviceRecord> {
        self.records.iter().find(|r| r.unique_id == unique_id)
    }

    pub fn contains(&self, unique_id: &str) -> bool {
        self.get(unique_id).is_some()
    }

    pub fn records(&self) -> &[DeviceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::DaemonHost;
    use linkhub_core::config::{FansConfig, LightingConfig};

    fn host() -> DaemonHost {
        DaemonHost::new(&FansConfig::default(), &LightingConfig::default()).unwrap()
    }

    fn fan(unique_id: &str) -> DeviceRecord {
        let resolved = DeviceKind::QxFan.resolve(0).unwrap();
        DeviceRecord::from_resolved(&resolved, unique_id, Some(0), None).unwrap()
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut host = host();
        let mut registry = Registry::new();

        assert!(registry.add(fan("QXF001"), &mut host));
        assert!(!registry.add(fan("QXF001"), &mut host));
        assert_eq!(registry.len(), 1);
        assert_eq!(host.subdevices(), &["QXF001".to_string()]);
    }

    #[test]
    fn test_strip_adapter_is_not_a_subdevice() {
        let mut host = host();
        let mut registry = Registry::new();

        registry.add(DeviceRecord::strip_adapter("LSA001", 5, Some(0)), &mut host);
        assert!(registry.contains("LSA001"));
        assert!(host.subdevices().is_empty());
    }

    #[test]
    fn test_remove_notifies_host() {
        let mut host = host();
        let mut registry = Registry::new();
        registry.add(fan("QXF001"), &mut host);
        registry.add(fan("QXF002"), &mut host);

        let removed = registry.remove("QXF001", &mut host).unwrap();
        assert_eq!(removed.unique_id, "QXF001");
        assert!(registry.remove("QXF001", &mut host).is_none());
        assert_eq!(host.subdevices(), &["QXF002".to_string()]);
    }

    #[test]
    fn test_replace_all_keeps_order() {
        let mut host = host();
        let mut registry = Registry::new();
        registry.add(fan("OLD001"), &mut host);

        registry.replace_all(vec![fan("QXF002"), fan("QXF001")], &mut host);

        let ids: Vec<&str> = registry.records().iter().map(|r| r.unique_id.as_str()).collect();
        assert_eq!(ids, vec!["QXF002", "QXF001"]);
        assert!(registry.get("OLD001").is_none());
        assert_eq!(host.subdevices().len(), 2);
    }
}
