//! Shared observation state: the latest sample per domain plus per-domain
//! service health, each behind its own reader/writer lock so the
//! presentation layer can read one domain without blocking a sampler
//! updating another.
//!
//! Sample replacement is atomic per domain: readers see either the old or
//! the new complete set, never a mix. Across domains no ordering is
//! guaranteed.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use crate::models::{
    BleDevice, BluetoothDevice, Domain, NetworkInfo, RadioInfo, ServiceHealth, ServiceStatus,
    WifiAccessPoint, WifiClient,
};

/// One Wi-Fi sampling pass: access points and associated clients together,
/// replaced as a unit.
#[derive(Debug, Clone, Default)]
pub struct WifiSample {
    pub access_points: Vec<WifiAccessPoint>,
    pub clients: Vec<WifiClient>,
}

#[derive(Debug, Default)]
pub struct ObservationStore {
    wifi: RwLock<WifiSample>,
    bluetooth: RwLock<Vec<BluetoothDevice>>,
    ble: RwLock<Vec<BleDevice>>,
    radio: RwLock<RadioInfo>,
    network: RwLock<NetworkInfo>,
    health: RwLock<HashMap<Domain, ServiceHealth>>,
}

impl ObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_wifi(&self, sample: WifiSample) {
        *write(&self.wifi) = sample;
    }

    pub fn wifi(&self) -> WifiSample {
        read(&self.wifi).clone()
    }

    pub fn replace_bluetooth(&self, devices: Vec<BluetoothDevice>) {
        *write(&self.bluetooth) = devices;
    }

    pub fn bluetooth(&self) -> Vec<BluetoothDevice> {
        read(&self.bluetooth).clone()
    }

    pub fn replace_ble(&self, devices: Vec<BleDevice>) {
        *write(&self.ble) = devices;
    }

    pub fn ble(&self) -> Vec<BleDevice> {
        read(&self.ble).clone()
    }

    pub fn replace_radio(&self, info: RadioInfo) {
        *write(&self.radio) = info;
    }

    pub fn radio(&self) -> RadioInfo {
        read(&self.radio).clone()
    }

    pub fn replace_network(&self, info: NetworkInfo) {
        *write(&self.network) = info;
    }

    pub fn network(&self) -> NetworkInfo {
        read(&self.network).clone()
    }

    /// Marks a domain healthy, recording an event describing the pass.
    pub fn mark_running(&self, domain: Domain, event: &str) {
        self.update_health(domain, |health| {
            health.status = ServiceStatus::Running;
            health.error.clear();
            health.push_event(event);
        });
    }

    /// Marks a domain failed without disturbing its last good sample.
    pub fn mark_error(&self, domain: Domain, message: &str) {
        self.update_health(domain, |health| {
            health.status = ServiceStatus::Error;
            health.error = message.to_string();
            health.push_event(&format!("ERROR: {message}"));
        });
    }

    /// Records an event without changing the domain's status.
    pub fn push_event(&self, domain: Domain, event: &str) {
        self.update_health(domain, |health| health.push_event(event));
    }

    pub fn health(&self, domain: Domain) -> Option<ServiceHealth> {
        read(&self.health).get(&domain).cloned()
    }

    pub fn health_snapshot(&self) -> HashMap<Domain, ServiceHealth> {
        read(&self.health).clone()
    }

    fn update_health(&self, domain: Domain, apply: impl FnOnce(&mut ServiceHealth)) {
        let mut map = write(&self.health);
        let health = map
            .entry(domain)
            .or_insert_with(|| ServiceHealth::new(domain.display_name()));
        health.last_update = Utc::now();
        apply(health);
    }
}

// Lock poisoning only happens if a holder panicked mid-update; the data is
// still the last complete write, so recover the guard instead of unwinding.
fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_replaced_wholesale() {
        let store = ObservationStore::new();
        store.replace_bluetooth(vec![BluetoothDevice {
            address: "AA:BB:CC:DD:EE:FF".into(),
            name: "Speaker".into(),
        }]);
        store.replace_bluetooth(vec![BluetoothDevice {
            address: "11:22:33:44:55:66".into(),
            name: "Headset".into(),
        }]);
        let devices = store.bluetooth();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].address, "11:22:33:44:55:66");
    }

    #[test]
    fn health_is_created_lazily_and_updated_in_place() {
        let store = ObservationStore::new();
        assert!(store.health(Domain::Wifi).is_none());

        store.mark_error(Domain::Wifi, "iw scan failed");
        let health = store.health(Domain::Wifi).unwrap();
        assert_eq!(health.status, ServiceStatus::Error);
        assert_eq!(health.error, "iw scan failed");
        assert_eq!(health.name, "WiFi Monitoring");

        store.mark_running(Domain::Wifi, "Scan found 3 access points");
        let health = store.health(Domain::Wifi).unwrap();
        assert_eq!(health.status, ServiceStatus::Running);
        assert!(health.error.is_empty());
        assert_eq!(health.recent_events.len(), 2);
    }

    #[test]
    fn event_log_is_capped_at_ten() {
        let store = ObservationStore::new();
        for i in 0..12 {
            store.push_event(Domain::Network, &format!("pass {i}"));
        }
        let health = store.health(Domain::Network).unwrap();
        assert_eq!(health.recent_events.len(), 10);
        assert!(health.recent_events[0].ends_with("pass 2"));
    }
}
