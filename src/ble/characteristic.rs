//! GATT characteristics: read, write, notifications.
//!
//! Every read, write-with-response and notification toggle on one
//! characteristic runs under the session's per-characteristic guard, so two
//! round-trips on the same characteristic never wait for their answers at
//! the same time. Different characteristics never wait on each other.

use futures::future::ready;
use futures::stream::{self, Stream, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::ble::descriptor::BluetoothDescriptor;
use crate::ble::types::{CharacteristicProperties, DeviceIdentifier, WriteType};
use crate::ble::uuids::{cccd_enabled, CLIENT_CHARACTERISTIC_CONFIG_UUID};
use crate::context::Context;
use crate::error::{ensure_success, Operation, Result};
use crate::events::correlator::Call;
use crate::events::LatestValue;
use crate::protocol::messages::{
    CharacteristicChanged, CharacteristicPayload, DescriptorPayload, ReadCharacteristicResponse,
    SetNotificationRequest, SetNotificationResponse, WriteCharacteristicRequest, WriteResponse,
};
use crate::protocol::{methods, GattAddress};
use crate::utils::{spawn_callback, CallbackHandle};

struct CharacteristicInner {
    address: GattAddress,
    properties: CharacteristicProperties,
    descriptors: Vec<BluetoothDescriptor>,
    /// Most recent value from any source.
    last_value: Mutex<Vec<u8>>,
    /// Values obtained by explicit reads, replayed to new `value()` subscribers.
    reads: LatestValue<Vec<u8>>,
    ctx: Arc<Context>,
}

impl CharacteristicInner {
    /// Same device, service, included service and characteristic.
    fn is_target(&self, payload: &CharacteristicPayload) -> bool {
        payload.address() == self.address
    }

    /// Copy refreshed descriptor values into the matching local descriptors.
    fn merge_descriptors(&self, updates: &[DescriptorPayload]) {
        for update in updates {
            match self.descriptors.iter().find(|d| d.uuid() == update.uuid) {
                Some(descriptor) => descriptor.set_last_value(update.value.clone()),
                None => trace!("Ignoring unknown descriptor {} on {}", update.uuid, self.address),
            }
        }
    }

    fn refresh(&self, payload: &CharacteristicPayload) {
        self.merge_descriptors(&payload.descriptors);
        *self.last_value.lock() = payload.value.clone();
    }
}

/// A characteristic of a discovered service.
///
/// Cheap to clone; clones share the cached values.
#[derive(Clone)]
pub struct BluetoothCharacteristic {
    inner: Arc<CharacteristicInner>,
}

impl BluetoothCharacteristic {
    pub(crate) fn from_payload(ctx: Arc<Context>, payload: &CharacteristicPayload) -> Self {
        let address = payload.address();
        let descriptors = payload
            .descriptors
            .iter()
            .map(|d| BluetoothDescriptor::from_payload(ctx.clone(), &address, d))
            .collect();

        Self {
            inner: Arc::new(CharacteristicInner {
                address,
                properties: payload.properties,
                descriptors,
                last_value: Mutex::new(payload.value.clone()),
                reads: LatestValue::new(payload.value.clone()),
                ctx,
            }),
        }
    }

    /// Characteristic UUID.
    pub fn uuid(&self) -> Uuid {
        self.inner.address.characteristic_uuid
    }

    /// Owning device.
    pub fn device_id(&self) -> &DeviceIdentifier {
        &self.inner.address.remote_id
    }

    /// Owning service.
    pub fn service_uuid(&self) -> Uuid {
        self.inner.address.service_uuid
    }

    /// Included service the characteristic lives in, if any.
    pub fn secondary_service_uuid(&self) -> Option<Uuid> {
        self.inner.address.secondary_service_uuid
    }

    /// Full address of this characteristic.
    pub fn address(&self) -> &GattAddress {
        &self.inner.address
    }

    /// Declared properties.
    pub fn properties(&self) -> CharacteristicProperties {
        self.inner.properties
    }

    /// Descriptors found during discovery.
    pub fn descriptors(&self) -> &[BluetoothDescriptor] {
        &self.inner.descriptors
    }

    /// Look up a descriptor by UUID.
    pub fn descriptor(&self, uuid: Uuid) -> Option<&BluetoothDescriptor> {
        self.inner.descriptors.iter().find(|d| d.uuid() == uuid)
    }

    /// Most recent value, from a read or a notification.
    pub fn last_value(&self) -> Vec<u8> {
        self.inner.last_value.lock().clone()
    }

    /// Whether notifications or indications are switched on.
    ///
    /// Derived from the cached Client Characteristic Configuration value; a
    /// characteristic without that descriptor reports `false`, the same as one
    /// with both bits cleared.
    pub fn is_notifying(&self) -> bool {
        self.descriptor(CLIENT_CHARACTERISTIC_CONFIG_UUID)
            .map(|cccd| cccd_enabled(&cccd.last_value()))
            .unwrap_or(false)
    }

    /// Read the value from the device.
    pub async fn read(&self) -> Result<Vec<u8>> {
        let address = &self.inner.address;
        let ctx = &self.inner.ctx;

        let result: Result<Vec<u8>> = ctx
            .locks
            .run_exclusive(address.clone(), async {
                let call = Call {
                    method: methods::READ_CHARACTERISTIC,
                    arguments: address,
                    response: methods::READ_CHARACTERISTIC_RESPONSE,
                    operation: Operation::ReadCharacteristic,
                    target: address.to_string(),
                    timeout: ctx.config.operation_timeout,
                };
                let response: ReadCharacteristicResponse = ctx
                    .correlator
                    .request(call, |r: &ReadCharacteristicResponse| {
                        self.inner.is_target(&r.characteristic)
                    })
                    .await?;
                ensure_success(response.success, response.error_string, Operation::ReadCharacteristic, || {
                    address.to_string()
                })?;

                let value = response.characteristic.value;
                *self.inner.last_value.lock() = value.clone();
                self.inner.reads.set(value.clone());
                Ok(value)
            })
            .await;

        result.map_err(|e| e.with_context(|| format!("read characteristic {}", self.uuid())))
    }

    /// Write `value`.
    ///
    /// With [`WriteType::WithResponse`] this waits for the device to confirm
    /// and fails if it reports an error. With [`WriteType::WithoutResponse`]
    /// success only means the platform accepted the request; delivery to the
    /// device is never confirmed.
    pub async fn write(&self, value: &[u8], write_type: WriteType) -> Result<()> {
        let address = &self.inner.address;
        let ctx = &self.inner.ctx;

        let result: Result<()> = ctx
            .locks
            .run_exclusive(address.clone(), async {
                let request = WriteCharacteristicRequest {
                    address: address.clone(),
                    write_type,
                    value: value.to_vec(),
                };

                if write_type == WriteType::WithoutResponse {
                    ctx.correlator.invoke(methods::WRITE_CHARACTERISTIC, &request).await?;
                    return Ok(());
                }

                let call = Call {
                    method: methods::WRITE_CHARACTERISTIC,
                    arguments: &request,
                    response: methods::WRITE_CHARACTERISTIC_RESPONSE,
                    operation: Operation::WriteCharacteristic,
                    target: address.to_string(),
                    timeout: ctx.config.operation_timeout,
                };
                let response: WriteResponse = ctx
                    .correlator
                    .request(call, |r: &WriteResponse| r.address == *address)
                    .await?;
                ensure_success(response.success, response.error_string, Operation::WriteCharacteristic, || {
                    address.to_string()
                })
            })
            .await;

        result.map_err(|e| e.with_context(|| format!("write characteristic {}", self.uuid())))
    }

    /// Write `value` and wait for the device to confirm.
    pub async fn write_with_response(&self, value: &[u8]) -> Result<()> {
        self.write(value, WriteType::WithResponse).await
    }

    /// Write `value` without confirmation, see [`write`](Self::write).
    pub async fn write_without_response(&self, value: &[u8]) -> Result<()> {
        self.write(value, WriteType::WithoutResponse).await
    }

    /// Switch notifications (or indications) on or off.
    ///
    /// Returns whether the configuration descriptor reported back by the
    /// platform matches `enable`. `Ok(false)` means the request was accepted
    /// but the device ended up in a different state.
    pub async fn set_notify_value(&self, enable: bool) -> Result<bool> {
        let address = &self.inner.address;
        let ctx = &self.inner.ctx;

        let result: Result<bool> = ctx
            .locks
            .run_exclusive(address.clone(), async {
                let request = SetNotificationRequest {
                    address: address.clone(),
                    enable,
                };
                let call = Call {
                    method: methods::SET_NOTIFICATION,
                    arguments: &request,
                    response: methods::SET_NOTIFICATION_RESPONSE,
                    operation: Operation::SetNotifyValue,
                    target: address.to_string(),
                    timeout: ctx.config.operation_timeout,
                };
                let response: SetNotificationResponse = ctx
                    .correlator
                    .request(call, |r: &SetNotificationResponse| {
                        self.inner.is_target(&r.characteristic)
                    })
                    .await?;
                ensure_success(response.success, response.error_string, Operation::SetNotifyValue, || {
                    address.to_string()
                })?;

                self.inner.merge_descriptors(&response.characteristic.descriptors);
                let notifying = self.is_notifying();
                debug!("Notify on {} is now {}", address, notifying);
                Ok(notifying == enable)
            })
            .await;

        result.map_err(|e| e.with_context(|| format!("set notify value on {}", self.uuid())))
    }

    /// Values pushed by the device from now on.
    ///
    /// Each delivery also refreshes the cached descriptor values and
    /// [`last_value`](Self::last_value).
    pub fn on_value_changed_stream(&self) -> impl Stream<Item = Vec<u8>> + Send + Unpin + 'static {
        let matcher = self.inner.clone();
        let inner = self.inner.clone();
        self.inner
            .ctx
            .correlator
            .listen::<CharacteristicChanged>(methods::CHARACTERISTIC_CHANGED)
            .filter(move |event| ready(matcher.is_target(&event.characteristic)))
            .map(move |event| {
                inner.refresh(&event.characteristic);
                event.characteristic.value
            })
    }

    /// Last read value, then every later read result and every notification.
    pub fn value(&self) -> impl Stream<Item = Vec<u8>> + Send + Unpin + 'static {
        stream::select(self.inner.reads.subscribe(), self.on_value_changed_stream())
    }

    /// Register a callback for values pushed by the device.
    pub fn on_value_changed<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        spawn_callback(self.on_value_changed_stream(), move |value| callback(&value))
    }
}

impl std::fmt::Debug for BluetoothCharacteristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BluetoothCharacteristic")
            .field("address", &self.inner.address)
            .field("properties", &self.inner.properties)
            .field("descriptors", &self.inner.descriptors)
            .finish_non_exhaustive()
    }
}
