//! Connection state and connection-level request parameters.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SessionConfig;

/// Connection state of a device, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    /// Not connected to the device.
    #[default]
    Disconnected,
    /// Currently attempting to connect.
    Connecting,
    /// Connected to the device.
    Connected,
    /// Currently disconnecting.
    Disconnecting,
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if in a transitional state.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// Parameters for [`BluetoothDevice::connect`](crate::BluetoothDevice::connect).
///
/// Unless [`with_timeout`](Self::with_timeout) is called, the connect timeout
/// of the session's [`SessionConfig`] applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Per-call override of the session connect timeout.
    timeout: Option<Option<Duration>>,
    /// Let the platform connect whenever the device becomes available (Android).
    pub auto_connect: bool,
    /// Drop the OS GATT cache before connecting (Android).
    pub clear_gatt_cache: bool,
}

impl ConnectOptions {
    /// Give up waiting for `Connected` after `timeout`. `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set auto-connect.
    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Clear the GATT cache before connecting.
    pub fn with_clear_gatt_cache(mut self, clear: bool) -> Self {
        self.clear_gatt_cache = clear;
        self
    }

    /// The bound that applies in a session configured with `config`.
    pub fn timeout(&self, config: &SessionConfig) -> Option<Duration> {
        self.timeout.unwrap_or(config.connect_timeout)
    }
}

/// Connection interval class (Android `requestConnectionPriority`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionPriority {
    /// Default interval.
    #[default]
    Balanced,
    /// Short interval, higher throughput.
    High,
    /// Long interval, lower power.
    LowPower,
}

/// Physical layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phy {
    /// LE 1M.
    #[default]
    Le1m,
    /// LE 2M.
    Le2m,
    /// LE Coded.
    LeCoded,
}

/// Coding preference when the coded PHY is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhyCoding {
    /// No preference.
    #[default]
    NoPreferred,
    /// S=2 coding.
    S2,
    /// S=8 coding.
    S8,
}
