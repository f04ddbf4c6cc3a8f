//! GATT services.

use std::sync::Arc;
use uuid::Uuid;

use crate::ble::characteristic::BluetoothCharacteristic;
use crate::ble::types::DeviceIdentifier;
use crate::context::Context;
use crate::protocol::messages::ServicePayload;

/// A service found by [`BluetoothDevice::discover_services`](crate::BluetoothDevice::discover_services).
#[derive(Debug, Clone)]
pub struct BluetoothService {
    uuid: Uuid,
    device_id: DeviceIdentifier,
    is_primary: bool,
    characteristics: Vec<BluetoothCharacteristic>,
    included_services: Vec<BluetoothService>,
}

impl BluetoothService {
    pub(crate) fn from_payload(ctx: &Arc<Context>, payload: &ServicePayload) -> Self {
        Self {
            uuid: payload.uuid,
            device_id: payload.remote_id.clone(),
            is_primary: payload.is_primary,
            characteristics: payload
                .characteristics
                .iter()
                .map(|c| BluetoothCharacteristic::from_payload(ctx.clone(), c))
                .collect(),
            included_services: payload
                .included_services
                .iter()
                .map(|s| Self::from_payload(ctx, s))
                .collect(),
        }
    }

    /// Service UUID.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Owning device.
    pub fn device_id(&self) -> &DeviceIdentifier {
        &self.device_id
    }

    /// Primary or secondary service.
    pub fn is_primary(&self) -> bool {
        self.is_primary
    }

    /// Characteristics of this service.
    pub fn characteristics(&self) -> &[BluetoothCharacteristic] {
        &self.characteristics
    }

    /// Services included by this one.
    pub fn included_services(&self) -> &[BluetoothService] {
        &self.included_services
    }

    /// Look up a characteristic by UUID, searching included services too.
    pub fn characteristic(&self, uuid: Uuid) -> Option<&BluetoothCharacteristic> {
        self.characteristics
            .iter()
            .find(|c| c.uuid() == uuid)
            .or_else(|| {
                self.included_services
                    .iter()
                    .find_map(|s| s.characteristic(uuid))
            })
    }
}
