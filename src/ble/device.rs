//! Remote peripherals: connection lifecycle and device-level requests.

use futures::future::ready;
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ble::characteristic::BluetoothCharacteristic;
use crate::ble::connection::{ConnectOptions, ConnectionPriority, ConnectionState, Phy, PhyCoding};
use crate::ble::service::BluetoothService;
use crate::ble::types::DeviceIdentifier;
use crate::context::Context;
use crate::error::{ensure_success, Error, Operation, Result};
use crate::events::correlator::{bounded, first_match, Call};
use crate::events::{LatestValue, Subscription};
use crate::protocol::messages::{
    ConnectRequest, ConnectionPriorityRequest, DeviceRequest, DeviceStateEvent,
    DiscoverServicesResult, MtuSize, PreferredPhyRequest, ReadRssiResult,
};
use crate::protocol::methods;
use crate::utils::{spawn_callback, CallbackHandle};

/// Clears a busy flag when dropped, so cancellation cannot leave it set.
struct BusyFlag<'a>(&'a LatestValue<bool>);

impl<'a> BusyFlag<'a> {
    fn raise(flag: &'a LatestValue<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for BusyFlag<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

struct DeviceInner {
    id: DeviceIdentifier,
    name: String,
    ctx: Arc<Context>,
    is_discovering: LatestValue<bool>,
    services: LatestValue<Vec<BluetoothService>>,
}

/// A remote BLE peripheral.
///
/// Connection state is owned by the platform: this handle never changes it
/// locally, it only asks for transitions and watches the platform's reports.
/// Obtain handles from [`DeviceManager::device`](crate::DeviceManager::device)
/// so every caller shares the same discovery caches.
#[derive(Clone)]
pub struct BluetoothDevice {
    inner: Arc<DeviceInner>,
}

impl BluetoothDevice {
    pub(crate) fn new(ctx: Arc<Context>, id: DeviceIdentifier, name: String) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                id,
                name,
                ctx,
                is_discovering: LatestValue::new(false),
                services: LatestValue::new(Vec::new()),
            }),
        }
    }

    /// Platform identifier.
    pub fn id(&self) -> &DeviceIdentifier {
        &self.inner.id
    }

    /// Name seen when the handle was created (may be empty).
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    fn request(&self) -> DeviceRequest {
        DeviceRequest {
            remote_id: self.inner.id.clone(),
        }
    }

    fn target(&self) -> String {
        format!("device {}", self.inner.id)
    }

    /// Live state reports for this device, without the current value.
    fn state_changes(&self) -> impl Stream<Item = ConnectionState> + Send + Unpin + 'static {
        let id = self.inner.id.clone();
        self.inner
            .ctx
            .correlator
            .listen::<DeviceStateEvent>(methods::DEVICE_STATE_CHANGED)
            .filter(move |event| ready(event.remote_id == id))
            .map(|event| event.state)
    }

    // === Connection ===

    /// Connect and wait until the platform reports [`ConnectionState::Connected`].
    ///
    /// On timeout the platform connection attempt is left running; a later
    /// `Connected` report is not turned into success for this call.
    pub async fn connect(&self, options: ConnectOptions) -> Result<()> {
        let started = Instant::now();
        if options.clear_gatt_cache {
            self.clear_gatt_cache().await?;
        }

        let timeout = options.timeout(&self.inner.ctx.config);
        let states = self.state_changes();
        info!("Connecting to {} (timeout: {:?})", self.inner.id, timeout);
        let request = ConnectRequest {
            remote_id: self.inner.id.clone(),
            auto_connect: options.auto_connect,
        };
        self.inner.ctx.correlator.invoke(methods::CONNECT, &request).await?;

        bounded(timeout, started, Operation::Connect, || self.target(), async {
            let current = self.connection_state().await?;
            if current.is_connected() {
                return Ok(());
            }
            debug!("{} is {}, waiting for connection", self.inner.id, current);
            first_match(states, |state| state.is_connected())
                .await
                .map(|_| ())
                .ok_or(Error::Closed)
        })
        .await?;

        info!("Connected to {}", self.inner.id);
        Ok(())
    }

    /// Ask the platform to disconnect.
    pub async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from {}", self.inner.id);
        self.inner.ctx.correlator.invoke(methods::DISCONNECT, &self.request()).await?;
        Ok(())
    }

    /// Start bonding (Android).
    pub async fn pair(&self) -> Result<()> {
        self.inner.ctx.correlator.invoke(methods::PAIR, &self.request()).await?;
        Ok(())
    }

    /// Remove the bond with this device. A no-op where unsupported.
    pub async fn remove_bond(&self) -> Result<()> {
        self.optional(methods::REMOVE_BOND).await
    }

    /// Drop the platform's cached GATT table (Android). A no-op where unsupported.
    pub async fn clear_gatt_cache(&self) -> Result<()> {
        self.optional(methods::CLEAR_GATT_CACHE).await
    }

    async fn optional(&self, method: &str) -> Result<()> {
        match self.inner.ctx.correlator.invoke(method, &self.request()).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_supported() => {
                debug!("{} not supported on this platform, skipping", method);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Current connection state, queried from the platform.
    pub async fn connection_state(&self) -> Result<ConnectionState> {
        let event: DeviceStateEvent = self
            .inner
            .ctx
            .correlator
            .query(methods::DEVICE_STATE, &self.request())
            .await?;
        Ok(event.state)
    }

    /// Current connection state followed by every change.
    pub async fn state(&self) -> Result<impl Stream<Item = ConnectionState> + Send + Unpin + 'static> {
        let changes = self.state_changes();
        let current = self.connection_state().await?;
        Ok(stream::iter([current]).chain(changes))
    }

    /// Register a callback for connection state changes.
    pub fn on_connection_state_changed<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        spawn_callback(self.state_changes(), callback)
    }

    // === Services ===

    /// Discover the GATT tree. Requires a connection.
    pub async fn discover_services(&self) -> Result<Vec<BluetoothService>> {
        let state = self.connection_state().await?;
        if !state.is_connected() {
            return Err(Error::NotConnected {
                device: self.inner.id.to_string(),
                state: state.to_string(),
            });
        }

        let ctx = &self.inner.ctx;
        let result = {
            let _busy = BusyFlag::raise(&self.inner.is_discovering);
            let request = self.request();
            let call = Call {
                method: methods::DISCOVER_SERVICES,
                arguments: &request,
                response: methods::DISCOVER_SERVICES_RESULT,
                operation: Operation::DiscoverServices,
                target: self.target(),
                timeout: ctx.config.operation_timeout,
            };
            ctx.correlator
                .request(call, |r: &DiscoverServicesResult| r.remote_id == self.inner.id)
                .await
        };
        let result = result?;
        ensure_success(result.success, result.error_string, Operation::DiscoverServices, || {
            self.target()
        })?;

        let services: Vec<BluetoothService> = result
            .services
            .iter()
            .map(|s| BluetoothService::from_payload(ctx, s))
            .collect();
        debug!("Discovered {} services on {}", services.len(), self.inner.id);
        self.inner.services.set(services.clone());
        Ok(services)
    }

    /// Services from the last discovery.
    pub fn services(&self) -> Vec<BluetoothService> {
        self.inner.services.get()
    }

    /// Last discovered services followed by every later discovery.
    pub fn services_stream(&self) -> Subscription<Vec<BluetoothService>> {
        self.inner.services.subscribe()
    }

    /// Whether a discovery is running.
    pub fn is_discovering(&self) -> bool {
        self.inner.is_discovering.get()
    }

    /// Discovery flag followed by every change.
    pub fn is_discovering_stream(&self) -> Subscription<bool> {
        self.inner.is_discovering.subscribe()
    }

    /// Look up a discovered service.
    pub fn service(&self, uuid: Uuid) -> Option<BluetoothService> {
        self.inner
            .services
            .get()
            .into_iter()
            .find(|s| s.uuid() == uuid)
    }

    /// Look up a discovered characteristic.
    pub fn characteristic(&self, service: Uuid, characteristic: Uuid) -> Option<BluetoothCharacteristic> {
        self.service(service)?.characteristic(characteristic).cloned()
    }

    // === Link parameters ===

    /// Current MTU followed by every change.
    pub async fn mtu(&self) -> Result<impl Stream<Item = u16> + Send + Unpin + 'static> {
        let id = self.inner.id.clone();
        let changes = self
            .inner
            .ctx
            .correlator
            .listen::<MtuSize>(methods::MTU_SIZE)
            .filter(move |event| ready(event.remote_id == id))
            .map(|event| event.mtu);
        let current: MtuSize = self
            .inner
            .ctx
            .correlator
            .query(methods::MTU, &self.request())
            .await?;
        Ok(stream::iter([current.mtu]).chain(changes))
    }

    /// Negotiate a larger MTU and return the value agreed on.
    pub async fn request_mtu(&self, desired: u16) -> Result<u16> {
        let ctx = &self.inner.ctx;
        let request = MtuSize {
            remote_id: self.inner.id.clone(),
            mtu: desired,
        };
        let call = Call {
            method: methods::REQUEST_MTU,
            arguments: &request,
            response: methods::MTU_SIZE,
            operation: Operation::RequestMtu,
            target: self.target(),
            timeout: ctx.config.operation_timeout,
        };
        let response: MtuSize = ctx
            .correlator
            .request(call, |r: &MtuSize| r.remote_id == self.inner.id)
            .await?;
        if response.mtu != desired {
            debug!("{} negotiated MTU {} (asked for {})", self.inner.id, response.mtu, desired);
        }
        Ok(response.mtu)
    }

    /// Signal strength of the connection in dBm.
    pub async fn read_rssi(&self) -> Result<i16> {
        let ctx = &self.inner.ctx;
        let request = self.request();
        let call = Call {
            method: methods::READ_RSSI,
            arguments: &request,
            response: methods::READ_RSSI_RESULT,
            operation: Operation::ReadRssi,
            target: self.target(),
            timeout: ctx.config.operation_timeout,
        };
        let response: ReadRssiResult = ctx
            .correlator
            .request(call, |r: &ReadRssiResult| r.remote_id == self.inner.id)
            .await?;
        ensure_success(response.success, response.error_string, Operation::ReadRssi, || {
            self.target()
        })?;
        Ok(response.rssi)
    }

    /// Request a connection interval class (Android).
    pub async fn request_connection_priority(&self, priority: ConnectionPriority) -> Result<()> {
        let request = ConnectionPriorityRequest {
            remote_id: self.inner.id.clone(),
            connection_priority: priority,
        };
        self.inner
            .ctx
            .correlator
            .invoke(methods::REQUEST_CONNECTION_PRIORITY, &request)
            .await
            .map_err(|e| {
                warn!("Connection priority request for {} failed: {}", self.inner.id, e);
                e
            })?;
        Ok(())
    }

    /// Set the preferred PHYs (Android).
    pub async fn set_preferred_phy(&self, tx_phy: Phy, rx_phy: Phy, coding: PhyCoding) -> Result<()> {
        let request = PreferredPhyRequest {
            remote_id: self.inner.id.clone(),
            tx_phy,
            rx_phy,
            phy_options: coding,
        };
        self.inner
            .ctx
            .correlator
            .invoke(methods::SET_PREFERRED_PHY, &request)
            .await?;
        Ok(())
    }
}

impl PartialEq for BluetoothDevice {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for BluetoothDevice {}

impl std::fmt::Debug for BluetoothDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BluetoothDevice")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}
