//! Entry point tying the platform channel to scanning, devices and GATT access.
//!
//! A [`DeviceManager`] owns one event bus. Everything the native stack reports
//! is fed into it, either event by event through [`DeviceManager::publish`] or
//! by handing over a whole stream with [`DeviceManager::attach`]. Every
//! scanner, device and characteristic handle created from the manager listens
//! on that bus for the answers to its own requests.

use futures::{Stream, StreamExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::ble::adapter::Adapter;
use crate::ble::advertising::ScanResult;
use crate::ble::device::BluetoothDevice;
use crate::ble::scanner::{ScanSettings, Scanner};
use crate::ble::types::DeviceIdentifier;
use crate::config::SessionConfig;
use crate::context::Context;
use crate::error::Result;
use crate::events::{EventBus, Subscription};
use crate::platform::{PlatformAdapter, PlatformEvent};
use crate::protocol::messages::DeviceInfo;
use crate::utils::CallbackHandle;

/// Central manager for one BLE session.
pub struct DeviceManager {
    ctx: Arc<Context>,
    scanner: Scanner,
    adapter: Adapter,
    /// Known devices by identifier.
    devices: Arc<RwLock<HashMap<DeviceIdentifier, BluetoothDevice>>>,
    /// Task forwarding an attached event stream onto the bus.
    pump_handle: RwLock<Option<JoinHandle<()>>>,
}

impl DeviceManager {
    /// Create a manager talking to `platform` with default timeouts.
    pub fn new(platform: Arc<dyn PlatformAdapter>) -> Self {
        Self::with_config(platform, SessionConfig::default())
    }

    /// Create a manager with explicit configuration.
    pub fn with_config(platform: Arc<dyn PlatformAdapter>, config: SessionConfig) -> Self {
        Self::with_event_bus(platform, config, EventBus::new())
    }

    /// Create a manager listening on a caller-owned bus.
    ///
    /// Useful when the platform glue wants to publish into the bus directly
    /// instead of going through [`publish`](Self::publish).
    pub fn with_event_bus(platform: Arc<dyn PlatformAdapter>, config: SessionConfig, bus: EventBus) -> Self {
        let ctx = Context::new(platform, bus, config);
        Self {
            scanner: Scanner::new(ctx.clone()),
            adapter: Adapter::new(ctx.clone()),
            ctx,
            devices: Arc::new(RwLock::new(HashMap::new())),
            pump_handle: RwLock::new(None),
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.ctx.config
    }

    // === Inbound events ===

    /// Deliver one event from the native stack.
    pub fn publish(&self, event: PlatformEvent) {
        trace!("Inbound {}", event.method);
        self.ctx.bus().publish(event);
    }

    /// Forward every event of `events` onto the bus from a background task.
    ///
    /// Replaces any previously attached stream.
    pub fn attach<S>(&self, events: S)
    where
        S: Stream<Item = PlatformEvent> + Send + 'static,
    {
        let bus = self.ctx.bus().clone();
        let handle = tokio::spawn(async move {
            let mut events = Box::pin(events);
            while let Some(event) = events.next().await {
                trace!("Inbound {}", event.method);
                bus.publish(event);
            }
            debug!("Platform event stream ended");
        });

        if let Some(previous) = self.pump_handle.write().replace(handle) {
            previous.abort();
        }
    }

    /// The bus inbound events are published on.
    pub fn event_bus(&self) -> &EventBus {
        self.ctx.bus()
    }

    /// Raw view of every inbound event from now on.
    pub fn events(&self) -> Subscription<PlatformEvent> {
        self.ctx.bus().subscribe()
    }

    // === Scanning ===

    /// The scan controller.
    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Start a scan, see [`Scanner::start_scan`].
    pub async fn start_scan(&self, settings: ScanSettings) -> Result<Subscription<ScanResult>> {
        self.scanner.start_scan(settings).await
    }

    /// Stop scanning, see [`Scanner::stop_scan`].
    pub async fn stop_scan(&self) -> Result<()> {
        self.scanner.stop_scan().await
    }

    /// Check if scanning is active.
    pub fn is_scanning(&self) -> bool {
        self.scanner.is_scanning()
    }

    /// Register a callback for every scan sighting.
    pub fn on_scan_result<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&ScanResult) + Send + Sync + 'static,
    {
        self.scanner.on_scan_result(callback)
    }

    // === Adapter ===

    /// The local Bluetooth adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    // === Devices ===

    /// Handle for device `id`. Repeated calls return handles sharing the same caches.
    pub fn device(&self, id: impl Into<DeviceIdentifier>) -> BluetoothDevice {
        self.register(id.into(), String::new())
    }

    /// Handle for the device behind a scan sighting.
    pub fn device_for(&self, result: &ScanResult) -> BluetoothDevice {
        self.register(result.device.clone(), result.display_name().to_string())
    }

    /// Every device handed out so far.
    pub fn devices(&self) -> Vec<BluetoothDevice> {
        self.devices.read().values().cloned().collect()
    }

    fn register(&self, id: DeviceIdentifier, name: String) -> BluetoothDevice {
        if let Some(device) = self.devices.read().get(&id) {
            return device.clone();
        }
        self.devices
            .write()
            .entry(id.clone())
            .or_insert_with(|| {
                debug!("Tracking device {}", id);
                BluetoothDevice::new(self.ctx.clone(), id, name)
            })
            .clone()
    }

    fn register_all(&self, infos: Vec<DeviceInfo>) -> Vec<BluetoothDevice> {
        infos
            .into_iter()
            .map(|info| self.register(info.remote_id, info.name))
            .collect()
    }

    /// Devices the platform is currently connected to.
    pub async fn connected_devices(&self) -> Result<Vec<BluetoothDevice>> {
        let infos = self.adapter.connected_devices().await?;
        Ok(self.register_all(infos))
    }

    /// Devices bonded with this host.
    pub async fn bonded_devices(&self) -> Result<Vec<BluetoothDevice>> {
        let infos = self.adapter.bonded_devices().await?;
        Ok(self.register_all(infos))
    }

    // === Lifecycle ===

    /// Stop any scan, stop the event pump and close the bus.
    ///
    /// Operations still waiting for an answer fail with [`Error::Closed`](crate::Error::Closed).
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down device manager");

        let stopped = if self.scanner.is_scanning() {
            self.scanner.stop_scan().await
        } else {
            Ok(())
        };
        if let Err(e) = &stopped {
            warn!("Error stopping scan during shutdown: {}", e);
        }

        if let Some(handle) = self.pump_handle.write().take() {
            handle.abort();
        }
        self.ctx.bus().close();

        stopped
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        if let Some(handle) = self.pump_handle.get_mut().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager")
            .field("config", &self.ctx.config)
            .field("scanner", &self.scanner)
            .field("devices", &self.devices.read().len())
            .finish()
    }
}
