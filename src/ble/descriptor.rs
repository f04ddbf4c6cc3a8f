//! GATT descriptors.

use std::sync::Arc;
use uuid::Uuid;

use crate::ble::types::DeviceIdentifier;
use crate::context::Context;
use crate::error::{ensure_success, Operation, Result};
use crate::events::correlator::Call;
use crate::events::{LatestValue, Subscription};
use crate::protocol::messages::{
    DescriptorPayload, ReadDescriptorResponse, WriteDescriptorRequest, WriteResponse,
};
use crate::protocol::{methods, GattAddress};

struct DescriptorInner {
    uuid: Uuid,
    address: GattAddress,
    last_value: LatestValue<Vec<u8>>,
    ctx: Arc<Context>,
}

/// A descriptor of a [`BluetoothCharacteristic`](crate::BluetoothCharacteristic).
///
/// Reads and writes share the exclusion guard of the owning characteristic.
#[derive(Clone)]
pub struct BluetoothDescriptor {
    inner: Arc<DescriptorInner>,
}

impl BluetoothDescriptor {
    pub(crate) fn from_payload(
        ctx: Arc<Context>,
        characteristic: &GattAddress,
        payload: &DescriptorPayload,
    ) -> Self {
        Self {
            inner: Arc::new(DescriptorInner {
                uuid: payload.uuid,
                address: characteristic.descriptor(payload.uuid),
                last_value: LatestValue::new(payload.value.clone()),
                ctx,
            }),
        }
    }

    /// Descriptor UUID.
    pub fn uuid(&self) -> Uuid {
        self.inner.uuid
    }

    /// Owning device.
    pub fn device_id(&self) -> &DeviceIdentifier {
        &self.inner.address.remote_id
    }

    /// Owning characteristic.
    pub fn characteristic_uuid(&self) -> Uuid {
        self.inner.address.characteristic_uuid
    }

    /// Owning service.
    pub fn service_uuid(&self) -> Uuid {
        self.inner.address.service_uuid
    }

    /// Full address of this descriptor.
    pub fn address(&self) -> &GattAddress {
        &self.inner.address
    }

    /// Last value read, written or reported for this descriptor.
    pub fn last_value(&self) -> Vec<u8> {
        self.inner.last_value.get()
    }

    /// Last value followed by every later update.
    pub fn value(&self) -> Subscription<Vec<u8>> {
        self.inner.last_value.subscribe()
    }

    pub(crate) fn set_last_value(&self, value: Vec<u8>) {
        self.inner.last_value.set(value);
    }

    /// Read the descriptor value from the device.
    pub async fn read(&self) -> Result<Vec<u8>> {
        let address = &self.inner.address;
        let ctx = &self.inner.ctx;

        let result: Result<Vec<u8>> = ctx
            .locks
            .run_exclusive(address.characteristic(), async {
                let call = Call {
                    method: methods::READ_DESCRIPTOR,
                    arguments: address,
                    response: methods::READ_DESCRIPTOR_RESPONSE,
                    operation: Operation::ReadDescriptor,
                    target: address.to_string(),
                    timeout: ctx.config.operation_timeout,
                };
                let response: ReadDescriptorResponse = ctx
                    .correlator
                    .request(call, |r: &ReadDescriptorResponse| r.address == *address)
                    .await?;
                ensure_success(response.success, response.error_string, Operation::ReadDescriptor, || {
                    address.to_string()
                })?;

                self.inner.last_value.set(response.value.clone());
                Ok(response.value)
            })
            .await;

        result.map_err(|e| e.with_context(|| format!("read descriptor {}", self.uuid())))
    }

    /// Write `value` to the descriptor and wait for the device to confirm.
    pub async fn write(&self, value: &[u8]) -> Result<()> {
        let address = &self.inner.address;
        let ctx = &self.inner.ctx;

        let result: Result<()> = ctx
            .locks
            .run_exclusive(address.characteristic(), async {
                let request = WriteDescriptorRequest {
                    address: address.clone(),
                    value: value.to_vec(),
                };
                let call = Call {
                    method: methods::WRITE_DESCRIPTOR,
                    arguments: &request,
                    response: methods::WRITE_DESCRIPTOR_RESPONSE,
                    operation: Operation::WriteDescriptor,
                    target: address.to_string(),
                    timeout: ctx.config.operation_timeout,
                };
                let response: WriteResponse = ctx
                    .correlator
                    .request(call, |r: &WriteResponse| r.address == *address)
                    .await?;
                ensure_success(response.success, response.error_string, Operation::WriteDescriptor, || {
                    address.to_string()
                })?;

                self.inner.last_value.set(request.value);
                Ok(())
            })
            .await;

        result.map_err(|e| e.with_context(|| format!("write descriptor {}", self.uuid())))
    }
}

impl std::fmt::Debug for BluetoothDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BluetoothDescriptor")
            .field("address", &self.inner.address)
            .field("last_value", &self.last_value())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::uuids::{uuid_from_u16, CLIENT_CHARACTERISTIC_CONFIG_UUID};
    use crate::config::SessionConfig;
    use crate::error::Error;
    use crate::test_support::{publish, scripted};
    use serde_json::json;

    fn payload() -> DescriptorPayload {
        DescriptorPayload {
            uuid: CLIENT_CHARACTERISTIC_CONFIG_UUID,
            remote_id: DeviceIdentifier::from("AA"),
            service_uuid: uuid_from_u16(0x180d),
            characteristic_uuid: uuid_from_u16(0x2a37),
            value: vec![0, 0],
        }
    }

    fn characteristic_address() -> GattAddress {
        GattAddress {
            remote_id: DeviceIdentifier::from("AA"),
            service_uuid: uuid_from_u16(0x180d),
            secondary_service_uuid: None,
            characteristic_uuid: uuid_from_u16(0x2a37),
            descriptor_uuid: None,
        }
    }

    #[tokio::test]
    async fn test_read_updates_last_value() {
        let (ctx, adapter) = scripted(SessionConfig::default(), |bus, method, args| {
            if method == methods::READ_DESCRIPTOR {
                let mut response = args.clone();
                response["value"] = json!([1, 0]);
                response["success"] = json!(true);
                publish(bus, methods::READ_DESCRIPTOR_RESPONSE, response);
            }
            Ok(json!(true))
        });
        let descriptor = BluetoothDescriptor::from_payload(ctx, &characteristic_address(), &payload());

        assert_eq!(descriptor.read().await.unwrap(), vec![1, 0]);
        assert_eq!(descriptor.last_value(), vec![1, 0]);
        assert_eq!(
            adapter.calls()[0].1["descriptorUuid"],
            json!(CLIENT_CHARACTERISTIC_CONFIG_UUID.to_string())
        );
    }

    #[tokio::test]
    async fn test_write_failure_carries_address() {
        let (ctx, _adapter) = scripted(SessionConfig::default(), |bus, method, args| {
            if method == methods::WRITE_DESCRIPTOR {
                let mut response = args.clone();
                response["success"] = json!(false);
                response["errorString"] = json!("GATT_WRITE_NOT_PERMITTED");
                publish(bus, methods::WRITE_DESCRIPTOR_RESPONSE, response);
            }
            Ok(json!(true))
        });
        let descriptor = BluetoothDescriptor::from_payload(ctx.clone(), &characteristic_address(), &payload());

        let err = descriptor.write(&[1, 0]).await.unwrap_err();
        match err {
            Error::OperationFailed { operation, target, reason } => {
                assert_eq!(operation, Operation::WriteDescriptor);
                assert!(target.contains(&CLIENT_CHARACTERISTIC_CONFIG_UUID.to_string()));
                assert_eq!(reason, "GATT_WRITE_NOT_PERMITTED");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(descriptor.last_value(), vec![0, 0]);
        assert_eq!(ctx.locks.active_keys(), 0);
    }
}
