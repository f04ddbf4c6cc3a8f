//! Session-wide configuration.

use std::time::Duration;

/// Tunables shared by every device and characteristic created from one
/// [`DeviceManager`](crate::DeviceManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Default bound for [`ConnectOptions`](crate::ConnectOptions). `None` waits forever.
    pub connect_timeout: Option<Duration>,
    /// Bound applied to every correlated GATT round-trip. `None` waits forever.
    pub operation_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Default connection timeout (35 seconds).
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(35);

    /// Default GATT operation timeout (15 seconds).
    pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(15);

    /// Set the default connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the timeout applied to reads, writes, discovery and the other round-trips.
    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Self::DEFAULT_CONNECT_TIMEOUT),
            operation_timeout: Some(Self::DEFAULT_OPERATION_TIMEOUT),
        }
    }
}
