//! Method names exchanged with the platform adapter.
//!
//! Outbound names are passed to [`PlatformAdapter::invoke`](crate::PlatformAdapter::invoke);
//! inbound names identify [`PlatformEvent`](crate::PlatformEvent)s on the bus.

// Adapter
/// Query whether the host has a BLE radio at all.
pub const IS_AVAILABLE: &str = "isAvailable";
/// Query whether the radio is powered on.
pub const IS_ON: &str = "isOn";
/// Ask the host to power the radio on (Android only).
pub const TURN_ON: &str = "turnOn";
/// Ask the host to power the radio off (Android only).
pub const TURN_OFF: &str = "turnOff";
/// Query the friendly name of the local adapter.
pub const GET_ADAPTER_NAME: &str = "getAdapterName";
/// Query the current adapter power state.
pub const GET_ADAPTER_STATE: &str = "getAdapterState";
/// List devices currently connected at the OS level.
pub const GET_CONNECTED_DEVICES: &str = "getConnectedDevices";
/// List bonded devices (Android only).
pub const GET_BONDED_DEVICES: &str = "getBondedDevices";

// Scanning
/// Start a scan.
pub const START_SCAN: &str = "startScan";
/// Stop the active scan.
pub const STOP_SCAN: &str = "stopScan";

// Connection
/// Connect to a device.
pub const CONNECT: &str = "connect";
/// Disconnect from a device.
pub const DISCONNECT: &str = "disconnect";
/// Start bonding with a device.
pub const PAIR: &str = "pair";
/// Remove an existing bond.
pub const REMOVE_BOND: &str = "removeBond";
/// Drop the OS GATT cache for a device.
pub const CLEAR_GATT_CACHE: &str = "clearGattCache";
/// Query the current connection state of a device.
pub const DEVICE_STATE: &str = "deviceState";
/// Query the current MTU of a device.
pub const MTU: &str = "mtu";
/// Request a new MTU.
pub const REQUEST_MTU: &str = "requestMtu";
/// Read the RSSI of a connected device.
pub const READ_RSSI: &str = "readRssi";
/// Request a connection interval class.
pub const REQUEST_CONNECTION_PRIORITY: &str = "requestConnectionPriority";
/// Request a preferred PHY.
pub const SET_PREFERRED_PHY: &str = "setPreferredPhy";

// GATT
/// Discover the service tree of a connected device.
pub const DISCOVER_SERVICES: &str = "discoverServices";
/// Read a characteristic.
pub const READ_CHARACTERISTIC: &str = "readCharacteristic";
/// Write a characteristic.
pub const WRITE_CHARACTERISTIC: &str = "writeCharacteristic";
/// Read a descriptor.
pub const READ_DESCRIPTOR: &str = "readDescriptor";
/// Write a descriptor.
pub const WRITE_DESCRIPTOR: &str = "writeDescriptor";
/// Enable or disable notifications/indications.
pub const SET_NOTIFICATION: &str = "setNotification";

// Inbound events
/// One advertisement sighting.
pub const SCAN_RESULT: &str = "ScanResult";
/// Connection state change of a device.
pub const DEVICE_STATE_CHANGED: &str = "DeviceState";
/// Result of `discoverServices`.
pub const DISCOVER_SERVICES_RESULT: &str = "DiscoverServicesResult";
/// Result of `readCharacteristic`.
pub const READ_CHARACTERISTIC_RESPONSE: &str = "ReadCharacteristicResponse";
/// Result of `readDescriptor`.
pub const READ_DESCRIPTOR_RESPONSE: &str = "ReadDescriptorResponse";
/// Result of `writeCharacteristic` with response.
pub const WRITE_CHARACTERISTIC_RESPONSE: &str = "WriteCharacteristicResponse";
/// Result of `writeDescriptor`.
pub const WRITE_DESCRIPTOR_RESPONSE: &str = "WriteDescriptorResponse";
/// Result of `setNotification`.
pub const SET_NOTIFICATION_RESPONSE: &str = "SetNotificationResponse";
/// A notification or indication pushed by the peripheral.
pub const CHARACTERISTIC_CHANGED: &str = "OnCharacteristicChanged";
/// MTU change of a device.
pub const MTU_SIZE: &str = "MtuSize";
/// Result of `readRssi`.
pub const READ_RSSI_RESULT: &str = "ReadRssiResult";
/// Adapter power state change.
pub const ADAPTER_STATE_CHANGED: &str = "AdapterStateChanged";
