//! Well-known Bluetooth SIG UUIDs.

use uuid::Uuid;

/// Bluetooth base UUID (`0000xxxx-0000-1000-8000-00805f9b34fb`).
pub const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_00805f9b34fb;

/// Client Characteristic Configuration descriptor UUID.
pub const CLIENT_CHARACTERISTIC_CONFIG_UUID: Uuid =
    Uuid::from_u128(0x0000_2902_0000_1000_8000_00805f9b34fb);

/// Generic Access service UUID.
pub const GENERIC_ACCESS_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_1800_0000_1000_8000_00805f9b34fb);

/// Generic Attribute service UUID.
pub const GENERIC_ATTRIBUTE_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_1801_0000_1000_8000_00805f9b34fb);

/// CCCD bit enabling notifications.
pub const CCCD_NOTIFY: u8 = 0x01;
/// CCCD bit enabling indications.
pub const CCCD_INDICATE: u8 = 0x02;

/// Expand a 16-bit assigned number into a full UUID.
pub const fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// Whether a CCCD value has notifications or indications switched on.
///
/// An empty value counts as off.
pub fn cccd_enabled(value: &[u8]) -> bool {
    value
        .first()
        .map(|b| b & (CCCD_NOTIFY | CCCD_INDICATE) != 0)
        .unwrap_or(false)
}
