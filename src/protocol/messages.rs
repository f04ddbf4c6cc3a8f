//! Payload shapes carried over the platform channel.
//!
//! Every payload is a JSON object with camelCase keys. Requests are encoded
//! with [`serde_json::to_value`]; events are decoded from
//! [`PlatformEvent::payload`](crate::PlatformEvent::payload) by whoever is
//! waiting for them.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::ble::adapter::AdapterState;
use crate::ble::advertising::AdvertisementData;
use crate::ble::connection::{ConnectionPriority, ConnectionState, Phy, PhyCoding};
use crate::ble::types::{CharacteristicProperties, DeviceIdentifier, WriteType};

fn default_true() -> bool {
    true
}

/// Fully-qualified location of a characteristic or descriptor.
///
/// This is the correlation key of a pending GATT request and the resource key
/// of the per-characteristic guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GattAddress {
    /// Owning device.
    pub remote_id: DeviceIdentifier,
    /// Primary service.
    pub service_uuid: Uuid,
    /// Included (secondary) service, when the characteristic lives in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_service_uuid: Option<Uuid>,
    /// Characteristic.
    pub characteristic_uuid: Uuid,
    /// Descriptor, when addressing a descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor_uuid: Option<Uuid>,
}

impl GattAddress {
    /// The characteristic this address belongs to (drops the descriptor part).
    pub fn characteristic(&self) -> GattAddress {
        GattAddress {
            descriptor_uuid: None,
            ..self.clone()
        }
    }

    /// Address of descriptor `uuid` under this characteristic.
    pub fn descriptor(&self, uuid: Uuid) -> GattAddress {
        GattAddress {
            descriptor_uuid: Some(uuid),
            ..self.clone()
        }
    }
}

impl fmt::Display for GattAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device {} svc {}", self.remote_id, self.service_uuid)?;
        if let Some(secondary) = self.secondary_service_uuid {
            write!(f, " secondary {}", secondary)?;
        }
        write!(f, " chr {}", self.characteristic_uuid)?;
        if let Some(descriptor) = self.descriptor_uuid {
            write!(f, " desc {}", descriptor)?;
        }
        Ok(())
    }
}

/// Request addressed to a single device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    /// Target device.
    pub remote_id: DeviceIdentifier,
}

/// A device listed by the platform (connected or bonded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Device identifier.
    pub remote_id: DeviceIdentifier,
    /// Platform-reported name.
    #[serde(default)]
    pub name: String,
}

/// `ScanResult` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResultEvent {
    /// Device seen.
    pub remote_id: DeviceIdentifier,
    /// Platform-reported name.
    #[serde(default)]
    pub name: String,
    /// Advertisement payload.
    #[serde(default)]
    pub advertisement_data: AdvertisementData,
    /// Signal strength in dBm.
    pub rssi: i16,
}

/// `connect` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    /// Target device.
    pub remote_id: DeviceIdentifier,
    /// Let the platform connect when the device appears.
    pub auto_connect: bool,
}

/// `DeviceState` event, also the answer to the `deviceState` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStateEvent {
    /// Device whose state changed.
    pub remote_id: DeviceIdentifier,
    /// New state.
    pub state: ConnectionState,
}

/// Descriptor snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorPayload {
    /// Descriptor UUID.
    pub uuid: Uuid,
    /// Owning device.
    pub remote_id: DeviceIdentifier,
    /// Owning service.
    pub service_uuid: Uuid,
    /// Owning characteristic.
    pub characteristic_uuid: Uuid,
    /// Last value known to the platform.
    #[serde(default)]
    pub value: Vec<u8>,
}

/// Characteristic snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacteristicPayload {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// Owning device.
    pub remote_id: DeviceIdentifier,
    /// Owning service.
    pub service_uuid: Uuid,
    /// Included service the characteristic lives in, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_service_uuid: Option<Uuid>,
    /// Declared properties.
    #[serde(default)]
    pub properties: CharacteristicProperties,
    /// Descriptors.
    #[serde(default)]
    pub descriptors: Vec<DescriptorPayload>,
    /// Last value known to the platform.
    #[serde(default)]
    pub value: Vec<u8>,
}

impl CharacteristicPayload {
    /// Address of this characteristic.
    pub fn address(&self) -> GattAddress {
        GattAddress {
            remote_id: self.remote_id.clone(),
            service_uuid: self.service_uuid,
            secondary_service_uuid: self.secondary_service_uuid,
            characteristic_uuid: self.uuid,
            descriptor_uuid: None,
        }
    }
}

/// Service snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePayload {
    /// Service UUID.
    pub uuid: Uuid,
    /// Owning device.
    pub remote_id: DeviceIdentifier,
    /// Primary or secondary service.
    #[serde(default = "default_true")]
    pub is_primary: bool,
    /// Characteristics.
    #[serde(default)]
    pub characteristics: Vec<CharacteristicPayload>,
    /// Included services.
    #[serde(default)]
    pub included_services: Vec<ServicePayload>,
}

/// `DiscoverServicesResult` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverServicesResult {
    /// Device that was discovered.
    pub remote_id: DeviceIdentifier,
    /// Service tree.
    #[serde(default)]
    pub services: Vec<ServicePayload>,
    /// Whether discovery succeeded.
    #[serde(default = "default_true")]
    pub success: bool,
    /// Platform error description when `success` is false.
    #[serde(default)]
    pub error_string: Option<String>,
}

/// `ReadCharacteristicResponse` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadCharacteristicResponse {
    /// Device answering.
    pub remote_id: DeviceIdentifier,
    /// Characteristic snapshot including the value read.
    pub characteristic: CharacteristicPayload,
    /// Whether the read succeeded.
    #[serde(default = "default_true")]
    pub success: bool,
    /// Platform error description.
    #[serde(default)]
    pub error_string: Option<String>,
}

/// `writeCharacteristic` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteCharacteristicRequest {
    /// Target characteristic.
    #[serde(flatten)]
    pub address: GattAddress,
    /// Acknowledgement mode.
    pub write_type: WriteType,
    /// Value to write.
    pub value: Vec<u8>,
}

/// `WriteCharacteristicResponse` / `WriteDescriptorResponse` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    /// What was written.
    #[serde(flatten)]
    pub address: GattAddress,
    /// Whether the peripheral accepted the write.
    pub success: bool,
    /// Platform error description.
    #[serde(default)]
    pub error_string: Option<String>,
}

/// `ReadDescriptorResponse` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadDescriptorResponse {
    /// What was read.
    #[serde(flatten)]
    pub address: GattAddress,
    /// Value read.
    #[serde(default)]
    pub value: Vec<u8>,
    /// Whether the read succeeded.
    #[serde(default = "default_true")]
    pub success: bool,
    /// Platform error description.
    #[serde(default)]
    pub error_string: Option<String>,
}

/// `writeDescriptor` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteDescriptorRequest {
    /// Target descriptor.
    #[serde(flatten)]
    pub address: GattAddress,
    /// Value to write.
    pub value: Vec<u8>,
}

/// `setNotification` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetNotificationRequest {
    /// Target characteristic.
    #[serde(flatten)]
    pub address: GattAddress,
    /// Switch notifications on or off.
    pub enable: bool,
}

/// `SetNotificationResponse` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetNotificationResponse {
    /// Device answering.
    pub remote_id: DeviceIdentifier,
    /// Characteristic snapshot with refreshed descriptors.
    pub characteristic: CharacteristicPayload,
    /// Whether the request succeeded.
    #[serde(default = "default_true")]
    pub success: bool,
    /// Platform error description.
    #[serde(default)]
    pub error_string: Option<String>,
}

/// `OnCharacteristicChanged` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacteristicChanged {
    /// Device pushing the value.
    pub remote_id: DeviceIdentifier,
    /// Characteristic snapshot carrying the new value.
    pub characteristic: CharacteristicPayload,
}

/// `requestMtu` request and `MtuSize` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MtuSize {
    /// Device.
    pub remote_id: DeviceIdentifier,
    /// MTU in bytes.
    pub mtu: u16,
}

/// `ReadRssiResult` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRssiResult {
    /// Device.
    pub remote_id: DeviceIdentifier,
    /// Signal strength in dBm.
    #[serde(default)]
    pub rssi: i16,
    /// Whether the read succeeded.
    #[serde(default = "default_true")]
    pub success: bool,
    /// Platform error description.
    #[serde(default)]
    pub error_string: Option<String>,
}

/// `requestConnectionPriority` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPriorityRequest {
    /// Device.
    pub remote_id: DeviceIdentifier,
    /// Requested priority.
    pub connection_priority: ConnectionPriority,
}

/// `setPreferredPhy` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredPhyRequest {
    /// Device.
    pub remote_id: DeviceIdentifier,
    /// Transmit PHY.
    pub tx_phy: Phy,
    /// Receive PHY.
    pub rx_phy: Phy,
    /// Coding for the coded PHY.
    pub phy_options: PhyCoding,
}

/// `AdapterStateChanged` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterStateEvent {
    /// New state.
    pub state: AdapterState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::uuids::uuid_from_u16;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn address() -> GattAddress {
        GattAddress {
            remote_id: DeviceIdentifier::from("AA"),
            service_uuid: uuid_from_u16(0x180d),
            secondary_service_uuid: None,
            characteristic_uuid: uuid_from_u16(0x2a37),
            descriptor_uuid: None,
        }
    }

    #[test]
    fn test_write_request_is_flat() {
        let request = WriteCharacteristicRequest {
            address: address(),
            write_type: WriteType::WithResponse,
            value: vec![0x12, 0x34],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "remoteId": "AA",
                "serviceUuid": "0000180d-0000-1000-8000-00805f9b34fb",
                "characteristicUuid": "00002a37-0000-1000-8000-00805f9b34fb",
                "writeType": "withResponse",
                "value": [0x12, 0x34],
            })
        );
    }

    #[test]
    fn test_write_response_decodes_address() {
        let response: WriteResponse = serde_json::from_value(json!({
            "remoteId": "aa",
            "serviceUuid": "0000180d-0000-1000-8000-00805f9b34fb",
            "characteristicUuid": "00002a37-0000-1000-8000-00805f9b34fb",
            "success": false,
            "errorString": "GATT_WRITE_NOT_PERMITTED",
        }))
        .unwrap();
        assert_eq!(response.address, address());
        assert!(!response.success);
    }

    #[test]
    fn test_address_display() {
        let desc = address().descriptor(uuid_from_u16(0x2902));
        let text = desc.to_string();
        assert!(text.starts_with("device AA svc 0000180d"));
        assert!(text.contains("chr 00002a37"));
        assert!(text.ends_with("desc 00002902-0000-1000-8000-00805f9b34fb"));
        assert_eq!(desc.characteristic(), address());
    }

    #[test]
    fn test_success_defaults_to_true() {
        let result: ReadRssiResult =
            serde_json::from_value(json!({ "remoteId": "AA", "rssi": -61 })).unwrap();
        assert!(result.success);
        assert_eq!(result.rssi, -61);
    }
}
