//! BLE communication module.
//!
//! Scanning, the adapter, devices and the GATT tree. Nothing here talks to
//! a radio directly; every request goes through the session's
//! [`PlatformAdapter`](crate::PlatformAdapter) and every answer arrives on its
//! event bus.

pub mod adapter;
pub mod advertising;
pub mod characteristic;
pub mod connection;
pub mod descriptor;
pub mod device;
pub mod scanner;
pub mod service;
pub mod types;
pub mod uuids;

pub use adapter::{Adapter, AdapterState};
pub use advertising::{AdvertisementData, ScanResult};
pub use characteristic::BluetoothCharacteristic;
pub use connection::{ConnectOptions, ConnectionPriority, ConnectionState, Phy, PhyCoding};
pub use descriptor::BluetoothDescriptor;
pub use device::BluetoothDevice;
pub use scanner::{ScanMode, ScanSettings, Scanner};
pub use service::BluetoothService;
pub use types::{CharacteristicProperties, DeviceIdentifier, WriteType};
pub use uuids::*;
