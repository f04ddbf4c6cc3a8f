//! Small value types shared across the BLE modules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Opaque platform identifier of a remote device (a MAC address on Android,
/// a UUID on Apple platforms).
///
/// Comparison and hashing ignore ASCII case, so `"aa:bb"` and `"AA:BB"` name
/// the same device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceIdentifier(String);

impl DeviceIdentifier {
    /// Wrap a platform identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as reported by the platform.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for DeviceIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for DeviceIdentifier {}

impl Hash for DeviceIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceIdentifier {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DeviceIdentifier {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Access properties declared by a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacteristicProperties {
    /// Broadcast of the value is permitted.
    pub broadcast: bool,
    /// The value can be read.
    pub read: bool,
    /// The value can be written without a response.
    pub write_without_response: bool,
    /// The value can be written with a response.
    pub write: bool,
    /// The peripheral can push notifications.
    pub notify: bool,
    /// The peripheral can push acknowledged indications.
    pub indicate: bool,
    /// Signed writes are permitted.
    pub authenticated_signed_writes: bool,
    /// Extended properties are present.
    pub extended_properties: bool,
    /// Notifications require encryption.
    pub notify_encryption_required: bool,
    /// Indications require encryption.
    pub indicate_encryption_required: bool,
}

/// How a characteristic write is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteType {
    /// The peripheral confirms the write.
    #[default]
    WithResponse,
    /// Fire-and-forget write.
    WithoutResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_device_identifier_ignores_case() {
        let lower = DeviceIdentifier::from("aa:bb:cc:dd:ee:ff");
        let upper = DeviceIdentifier::from("AA:BB:CC:DD:EE:FF");
        assert_eq!(lower, upper);

        let mut set = HashSet::new();
        set.insert(lower);
        assert!(set.contains(&upper));
        assert_eq!(upper.as_str(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_device_identifier_serializes_as_string() {
        let id = DeviceIdentifier::from("AA:BB");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"AA:BB\"");
    }

    #[test]
    fn test_properties_default_missing_fields() {
        let props: CharacteristicProperties =
            serde_json::from_str(r#"{ "read": true, "notify": true }"#).unwrap();
        assert!(props.read);
        assert!(props.notify);
        assert!(!props.write);
    }
}
