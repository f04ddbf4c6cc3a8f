//! Boundary to the native BLE stack.
//!
//! Radio work happens behind [`PlatformAdapter`]: requests go out through
//! [`PlatformAdapter::invoke`], and everything the stack reports later comes
//! back as [`PlatformEvent`]s published onto the
//! [`DeviceManager`](crate::DeviceManager)'s event bus.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// One inbound message from the native stack.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformEvent {
    /// Event name, see [`crate::protocol::methods`].
    pub method: String,
    /// Loosely-typed payload, decoded by whoever is waiting for it.
    pub payload: Value,
}

impl PlatformEvent {
    /// Create an event from a raw JSON payload.
    pub fn new(method: impl Into<String>, payload: Value) -> Self {
        Self {
            method: method.into(),
            payload,
        }
    }

    /// Create an event by serializing a typed payload.
    pub fn encode<T: Serialize>(method: impl Into<String>, payload: &T) -> Result<Self> {
        Ok(Self::new(method, serde_json::to_value(payload)?))
    }
}

/// Outbound half of the channel to the native BLE stack.
///
/// `invoke` resolves once the stack has accepted (or immediately answered) the
/// request. A failure here is a local error reported right away; failures the
/// radio reports later arrive as events.
#[async_trait]
pub trait PlatformAdapter: Send + Sync + 'static {
    /// Issue `method` with `arguments` and return the acknowledgement or immediate result.
    async fn invoke(&self, method: &str, arguments: Value) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_event() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Mtu {
            remote_id: String,
            mtu: u16,
        }

        let event = PlatformEvent::encode(
            "MtuSize",
            &Mtu {
                remote_id: "AA".to_string(),
                mtu: 247,
            },
        )
        .unwrap();
        assert_eq!(event.method, "MtuSize");
        assert_eq!(event.payload, json!({ "remoteId": "AA", "mtu": 247 }));
    }
}
