//! Error types for the gatt-session crate.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// A platform round-trip that can fail or time out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Establishing a connection.
    Connect,
    /// Discovering the GATT service tree.
    DiscoverServices,
    /// Reading a characteristic value.
    ReadCharacteristic,
    /// Writing a characteristic value.
    WriteCharacteristic,
    /// Reading a descriptor value.
    ReadDescriptor,
    /// Writing a descriptor value.
    WriteDescriptor,
    /// Enabling or disabling notifications.
    SetNotifyValue,
    /// Negotiating the MTU.
    RequestMtu,
    /// Reading the signal strength of a connected device.
    ReadRssi,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::DiscoverServices => "discover services",
            Self::ReadCharacteristic => "read characteristic",
            Self::WriteCharacteristic => "write characteristic",
            Self::ReadDescriptor => "read descriptor",
            Self::WriteDescriptor => "write descriptor",
            Self::SetNotifyValue => "set notify value",
            Self::RequestMtu => "request mtu",
            Self::ReadRssi => "read rssi",
        };
        f.write_str(name)
    }
}

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// A scan was requested while another one is still active.
    #[error("Another scan is already in progress")]
    ScanInProgress,

    /// Operation requires a connection but the device is in another state.
    #[error("Device {device} is not connected (state: {state})")]
    NotConnected {
        /// The device the operation targeted.
        device: String,
        /// The connection state observed when the operation was attempted.
        state: String,
    },

    /// The outbound call to the platform adapter itself failed.
    #[error("Platform invocation '{method}' failed: {reason}")]
    Invocation {
        /// The invoked method.
        method: String,
        /// Description reported by the adapter.
        reason: String,
    },

    /// The platform answered a request with an explicit failure.
    #[error("Failed to {operation} ({target}): {reason}")]
    OperationFailed {
        /// The operation that failed.
        operation: Operation,
        /// Identifying context (device, service, characteristic, descriptor).
        target: String,
        /// Failure reason reported by the platform.
        reason: String,
    },

    /// No correlated answer arrived in time.
    #[error("Timed out after {elapsed:?} waiting to {operation} ({target})")]
    Timeout {
        /// The operation that was abandoned.
        operation: Operation,
        /// Identifying context.
        target: String,
        /// Time spent waiting before giving up.
        elapsed: Duration,
    },

    /// The event bus was closed while an operation was waiting on it.
    #[error("Event bus closed")]
    Closed,

    /// The requested operation is not supported by the platform.
    #[error("Operation not supported: {operation}")]
    NotSupported {
        /// Description of the unsupported operation.
        operation: String,
    },

    /// Invalid data was received from the platform.
    #[error("Invalid data received: {context}")]
    InvalidData {
        /// Description of what was invalid about the data.
        context: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// Service not found on the device.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },

    /// A lower-level failure annotated with the operation it interrupted.
    #[error("{context}: {source}")]
    Context {
        /// What was being attempted.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for adapter implementations.
    pub fn invocation(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invocation {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// The innermost error, looking through [`Error::Context`] layers.
    pub fn root(&self) -> &Error {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error (or the error it wraps) is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), Self::Timeout { .. })
    }

    /// Whether this error (or the error it wraps) means the platform lacks the capability.
    pub fn is_not_supported(&self) -> bool {
        matches!(self.root(), Self::NotSupported { .. })
    }

    /// Add diagnostic context to invocation-level failures.
    ///
    /// Correlated failures and timeouts already carry their target and are returned as-is so
    /// callers can keep matching on them directly.
    pub(crate) fn with_context(self, context: impl FnOnce() -> String) -> Self {
        match self {
            Self::OperationFailed { .. } | Self::Timeout { .. } => self,
            other => Self::Context {
                context: context(),
                source: Box::new(other),
            },
        }
    }
}

/// Turn the success flag of a correlated response into a result.
pub(crate) fn ensure_success(
    success: bool,
    error_string: Option<String>,
    operation: Operation,
    target: impl FnOnce() -> String,
) -> Result<()> {
    if success {
        return Ok(());
    }
    Err(Error::OperationFailed {
        operation,
        target: target(),
        reason: error_string.unwrap_or_else(|| "platform reported failure".to_string()),
    })
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidData {
            context: e.to_string(),
        }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
