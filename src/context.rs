//! State shared by every handle created from one [`DeviceManager`](crate::DeviceManager).

use std::sync::Arc;

use crate::config::SessionConfig;
use crate::events::correlator::Correlator;
use crate::events::{EventBus, KeyedMutex};
use crate::platform::PlatformAdapter;
use crate::protocol::GattAddress;

pub(crate) struct Context {
    pub(crate) correlator: Correlator,
    /// Serializes GATT round-trips per characteristic.
    pub(crate) locks: KeyedMutex<GattAddress>,
    pub(crate) config: SessionConfig,
}

impl Context {
    pub(crate) fn new(platform: Arc<dyn PlatformAdapter>, bus: EventBus, config: SessionConfig) -> Arc<Self> {
        Arc::new(Self {
            correlator: Correlator::new(platform, bus),
            locks: KeyedMutex::new(),
            config,
        })
    }

    pub(crate) fn bus(&self) -> &EventBus {
        self.correlator.bus()
    }
}
