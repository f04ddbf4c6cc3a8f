// Allow holding locks across await points - we use parking_lot which is designed for this
#![allow(clippy::await_holding_lock)]
// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # gatt-session
//!
//! An asynchronous BLE GATT session manager that sits on top of a native
//! Bluetooth stack reachable only through a message channel.
//!
//! The native side implements [`PlatformAdapter`]: requests go out through
//! [`PlatformAdapter::invoke`], and everything the radio reports later comes
//! back as [`PlatformEvent`]s fed into [`DeviceManager::publish`] (or a stream
//! handed to [`DeviceManager::attach`]). This crate turns that single inbound
//! stream into ordinary `async` calls and live streams.
//!
//! ## Features
//!
//! - **Scanning**: one scan at a time, optional auto-stop, results
//!   deduplicated per device
//! - **Connections**: connect with timeout, live connection state and MTU
//! - **GATT access**: services, characteristics and descriptors with read,
//!   write and notifications
//! - **Ordering**: operations on one characteristic never overlap; different
//!   characteristics proceed in parallel
//! - **Cached state**: scan state, result list, discovery flag and values
//!   replay to new subscribers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use gatt_session::{ConnectOptions, DeviceManager, PlatformAdapter, Result, ScanSettings};
//!
//! async fn run(platform: Arc<dyn PlatformAdapter>) -> Result<()> {
//!     let manager = DeviceManager::new(platform);
//!
//!     // Scan for four seconds
//!     let results = manager
//!         .scanner()
//!         .scan_for(ScanSettings::default().with_timeout(Duration::from_secs(4)))
//!         .await?;
//!
//!     if let Some(result) = results.first() {
//!         let device = manager.device_for(result);
//!         device.connect(ConnectOptions::default()).await?;
//!
//!         for service in device.discover_services().await? {
//!             for characteristic in service.characteristics() {
//!                 if characteristic.properties().read {
//!                     println!("{}: {:02x?}", characteristic.uuid(), characteristic.read().await?);
//!                 }
//!             }
//!         }
//!         device.disconnect().await?;
//!     }
//!
//!     manager.shutdown().await
//! }
//! ```
//!
//! ## Timeouts
//!
//! Connection attempts default to 35 seconds and every other round-trip to
//! 15 seconds, see [`SessionConfig`]. A timed-out request is only abandoned
//! locally; the native stack is not asked to cancel it.

// Public modules
pub mod ble;
pub mod config;
pub mod device_manager;
pub mod error;
pub mod events;
pub mod platform;
pub mod protocol;
pub mod utils;

mod context;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use config::SessionConfig;
pub use device_manager::DeviceManager;
pub use error::{Error, Operation, Result};
pub use platform::{PlatformAdapter, PlatformEvent};
pub use utils::CallbackHandle;

// Re-export commonly used types from submodules
pub use ble::{
    Adapter, AdapterState, AdvertisementData, BluetoothCharacteristic, BluetoothDescriptor,
    BluetoothDevice, BluetoothService, CharacteristicProperties, ConnectOptions,
    ConnectionPriority, ConnectionState, DeviceIdentifier, Phy, PhyCoding, ScanMode, ScanResult,
    ScanSettings, Scanner, WriteType,
};
pub use events::{EventBus, KeyedMutex, LatestValue, ResultQueue, Subscription};
pub use protocol::GattAddress;
