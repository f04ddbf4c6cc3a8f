//! Advertisement payloads and scan sightings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

use crate::ble::types::DeviceIdentifier;
use crate::protocol::messages::ScanResultEvent;

/// Advertisement payload decoded by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvertisementData {
    /// Advertised local name, if any.
    pub local_name: Option<String>,
    /// Advertised TX power in dBm.
    pub tx_power_level: Option<i16>,
    /// Whether the advertiser accepts connections.
    pub connectable: bool,
    /// Manufacturer-specific data keyed by company identifier.
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    /// Service data keyed by service UUID.
    pub service_data: HashMap<Uuid, Vec<u8>>,
    /// Advertised service UUIDs.
    pub service_uuids: Vec<Uuid>,
}

/// One sighting of a device during a scan.
///
/// Equality and hashing only look at [`ScanResult::device`], so a newer
/// sighting of the same device replaces the older one in a result list.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Which device was seen.
    pub device: DeviceIdentifier,
    /// Platform-reported device name (may be empty).
    pub name: String,
    /// Advertisement payload.
    pub advertisement_data: AdvertisementData,
    /// Signal strength in dBm.
    pub rssi: i16,
    /// Local time the sighting was received.
    pub timestamp: DateTime<Utc>,
}

impl ScanResult {
    /// Best display name: advertised local name, then platform name.
    pub fn display_name(&self) -> &str {
        self.advertisement_data
            .local_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.name)
    }
}

impl From<ScanResultEvent> for ScanResult {
    fn from(event: ScanResultEvent) -> Self {
        Self {
            device: event.remote_id,
            name: event.name,
            advertisement_data: event.advertisement_data,
            rssi: event.rssi,
            timestamp: Utc::now(),
        }
    }
}

impl PartialEq for ScanResult {
    fn eq(&self, other: &Self) -> bool {
        self.device == other.device
    }
}

impl Eq for ScanResult {}

impl Hash for ScanResult {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.device.hash(state);
    }
}

/// Insert `result` into `list`, replacing an earlier sighting of the same
/// device in place or appending a first sighting.
pub(crate) fn merge_scan_result(list: &mut Vec<ScanResult>, result: ScanResult) {
    match list.iter_mut().find(|r| **r == result) {
        Some(existing) => *existing = result,
        None => list.push(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn sighting(id: &str, rssi: i16) -> ScanResult {
        ScanResult {
            device: DeviceIdentifier::from(id),
            name: String::new(),
            advertisement_data: AdvertisementData::default(),
            rssi,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_equality_ignores_payload() {
        assert_eq!(sighting("AA", -40), sighting("aa", -90));
        assert_ne!(sighting("AA", -40), sighting("BB", -40));
    }

    #[test]
    fn test_merge_replaces_in_place() {
        let mut list = Vec::new();
        merge_scan_result(&mut list, sighting("A", -50));
        merge_scan_result(&mut list, sighting("B", -60));
        merge_scan_result(&mut list, sighting("A", -45));

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].device.as_str(), "A");
        assert_eq!(list[0].rssi, -45);
        assert_eq!(list[1].rssi, -60);
    }

    #[test]
    fn test_display_name_prefers_local_name() {
        let mut result = sighting("A", -50);
        result.name = "platform".to_string();
        assert_eq!(result.display_name(), "platform");
        result.advertisement_data.local_name = Some("HRM".to_string());
        assert_eq!(result.display_name(), "HRM");
    }

    #[test]
    fn test_advertisement_decodes_string_keys() {
        let adv: AdvertisementData = serde_json::from_value(serde_json::json!({
            "localName": "Sensor",
            "connectable": true,
            "manufacturerData": { "76": [1, 2] },
            "serviceUuids": ["0000180d-0000-1000-8000-00805f9b34fb"]
        }))
        .unwrap();
        assert_eq!(adv.manufacturer_data.get(&76), Some(&vec![1, 2]));
        assert_eq!(adv.service_uuids.len(), 1);
        assert!(adv.connectable);
    }

    proptest! {
        #[test]
        fn prop_merge_keeps_one_entry_per_device(
            sightings in proptest::collection::vec((0u8..6, -100i16..0), 0..40)
        ) {
            let mut list = Vec::new();
            for (id, rssi) in &sightings {
                merge_scan_result(&mut list, sighting(&format!("dev-{id}"), *rssi));
            }

            let mut first_seen: Vec<String> = Vec::new();
            for (id, _) in &sightings {
                let name = format!("dev-{id}");
                if !first_seen.contains(&name) {
                    first_seen.push(name);
                }
            }

            let order: Vec<String> = list.iter().map(|r| r.device.to_string()).collect();
            prop_assert_eq!(order, first_seen);

            for entry in &list {
                let latest = sightings
                    .iter()
                    .rev()
                    .find(|(id, _)| format!("dev-{id}") == entry.device.as_str())
                    .map(|(_, rssi)| *rssi);
                prop_assert_eq!(Some(entry.rssi), latest);
            }
        }
    }
}
