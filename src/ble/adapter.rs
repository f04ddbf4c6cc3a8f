//! Local Bluetooth adapter queries.

use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::Context;
use crate::error::Result;
use crate::protocol::messages::{AdapterStateEvent, DeviceInfo};
use crate::protocol::methods;

/// Power state of the local adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdapterState {
    /// State not reported yet.
    #[default]
    Unknown,
    /// No Bluetooth hardware.
    Unavailable,
    /// The application may not use Bluetooth.
    Unauthorized,
    /// Powering up.
    TurningOn,
    /// Powered and usable.
    On,
    /// Powering down.
    TurningOff,
    /// Powered off.
    Off,
}

impl AdapterState {
    /// Check if the adapter can be used.
    pub fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }
}

impl std::fmt::Display for AdapterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Unavailable => write!(f, "Unavailable"),
            Self::Unauthorized => write!(f, "Unauthorized"),
            Self::TurningOn => write!(f, "Turning on"),
            Self::On => write!(f, "On"),
            Self::TurningOff => write!(f, "Turning off"),
            Self::Off => write!(f, "Off"),
        }
    }
}

/// Handle to the host's Bluetooth adapter.
///
/// Power control and device listings are capability-gated by the platform; an
/// unsupported call fails with whatever error the adapter reports.
#[derive(Clone)]
pub struct Adapter {
    ctx: Arc<Context>,
}

impl Adapter {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Whether Bluetooth hardware is present.
    pub async fn is_available(&self) -> Result<bool> {
        self.ctx.correlator.query(methods::IS_AVAILABLE, &()).await
    }

    /// Whether the adapter is powered on.
    pub async fn is_on(&self) -> Result<bool> {
        self.ctx.correlator.query(methods::IS_ON, &()).await
    }

    /// Ask the platform to power the adapter on.
    pub async fn turn_on(&self) -> Result<bool> {
        info!("Requesting adapter power on");
        self.ctx.correlator.query(methods::TURN_ON, &()).await
    }

    /// Ask the platform to power the adapter off.
    pub async fn turn_off(&self) -> Result<bool> {
        info!("Requesting adapter power off");
        self.ctx.correlator.query(methods::TURN_OFF, &()).await
    }

    /// Friendly name of the local adapter.
    pub async fn name(&self) -> Result<String> {
        self.ctx.correlator.query(methods::GET_ADAPTER_NAME, &()).await
    }

    /// Current power state, queried from the platform.
    pub async fn state(&self) -> Result<AdapterState> {
        let event: AdapterStateEvent = self.ctx.correlator.query(methods::GET_ADAPTER_STATE, &()).await?;
        Ok(event.state)
    }

    /// Current power state followed by every change the platform reports.
    pub async fn state_stream(&self) -> Result<impl Stream<Item = AdapterState> + Send + Unpin + 'static> {
        let changes = self
            .ctx
            .correlator
            .listen::<AdapterStateEvent>(methods::ADAPTER_STATE_CHANGED)
            .map(|event| event.state);
        let current = self.state().await?;
        debug!("Adapter state is {}", current);
        Ok(stream::iter([current]).chain(changes))
    }

    /// Devices the platform currently holds a connection to.
    pub async fn connected_devices(&self) -> Result<Vec<DeviceInfo>> {
        self.ctx.correlator.query(methods::GET_CONNECTED_DEVICES, &()).await
    }

    /// Devices bonded with this host.
    pub async fn bonded_devices(&self) -> Result<Vec<DeviceInfo>> {
        self.ctx.correlator.query(methods::GET_BONDED_DEVICES, &()).await
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter").finish_non_exhaustive()
    }
}
