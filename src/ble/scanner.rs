//! BLE scanning functionality.
//!
//! At most one scan runs at a time. While it runs, every `ScanResult` event
//! is folded into a deduplicated result list and handed to the caller through
//! a [`Subscription`] that ends when the scan stops, whether by
//! [`Scanner::stop_scan`], by the scan timeout or because the event source
//! went away.

use futures::stream::{Stream, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ble::advertising::{merge_scan_result, ScanResult};
use crate::ble::types::DeviceIdentifier;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::events::{LatestValue, ResultQueue, Subscription};
use crate::protocol::messages::ScanResultEvent;
use crate::protocol::methods;
use crate::utils::{spawn_callback, CallbackHandle};

/// Android scan power profile. Ignored by other platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanMode {
    /// Only piggy-back on scans started by other applications.
    Opportunistic,
    /// Long scan interval.
    LowPower,
    /// Balance between latency and power.
    #[default]
    Balanced,
    /// Continuous scanning.
    LowLatency,
}

/// Filters and options for one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSettings {
    /// Only report devices advertising one of these services.
    pub service_uuids: Vec<Uuid>,
    /// Only report these devices.
    pub device_ids: Vec<DeviceIdentifier>,
    /// Only report these MAC addresses (Android).
    pub mac_addresses: Vec<String>,
    /// Power profile.
    pub scan_mode: ScanMode,
    /// Report every advertisement instead of one per device.
    pub allow_duplicates: bool,
    /// Stop automatically after this long.
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl ScanSettings {
    /// Filter by advertised services.
    pub fn with_services(mut self, services: impl IntoIterator<Item = Uuid>) -> Self {
        self.service_uuids = services.into_iter().collect();
        self
    }

    /// Filter by device identifiers.
    pub fn with_devices(mut self, devices: impl IntoIterator<Item = DeviceIdentifier>) -> Self {
        self.device_ids = devices.into_iter().collect();
        self
    }

    /// Filter by MAC address.
    pub fn with_mac_addresses(mut self, addresses: impl IntoIterator<Item = String>) -> Self {
        self.mac_addresses = addresses.into_iter().collect();
        self
    }

    /// Set the scan mode.
    pub fn with_scan_mode(mut self, mode: ScanMode) -> Self {
        self.scan_mode = mode;
        self
    }

    /// Allow duplicate advertisements.
    pub fn with_allow_duplicates(mut self, allow: bool) -> Self {
        self.allow_duplicates = allow;
        self
    }

    /// Stop the scan automatically after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Resources owned by the active scan.
struct ScanSession {
    queue: ResultQueue<ScanResult>,
    timer: Option<JoinHandle<()>>,
}

struct ScannerInner {
    ctx: Arc<Context>,
    is_scanning: LatestValue<bool>,
    results: LatestValue<Vec<ScanResult>>,
    session: Mutex<Option<ScanSession>>,
}

impl ScannerInner {
    /// Scan results folded into the result list.
    ///
    /// Every path that drops the scanning flag goes through [`teardown`](Self::teardown),
    /// which closes the session queue first; the queue then keeps the sightings
    /// already delivered and takes no later ones.
    fn result_source(&self) -> impl Stream<Item = ScanResult> + Send + 'static {
        let results = self.results.clone();

        self.ctx
            .correlator
            .listen::<ScanResultEvent>(methods::SCAN_RESULT)
            .map(move |event| {
                let result = ScanResult::from(event);
                results.update(|list| merge_scan_result(list, result.clone()));
                result
            })
    }

    fn arm_timer(weak: Weak<Self>, timeout: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            info!("Scan timed out after {:?}", timeout);
            if inner.teardown(false) {
                inner.request_stop().await;
            }
        })
    }

    /// End the local session. Returns whether a scan was active.
    ///
    /// `abort_timer` is false when called from the timer task itself.
    fn teardown(&self, abort_timer: bool) -> bool {
        let mut session = self.session.lock();
        if let Some(active) = session.take() {
            active.queue.close();
            if let Some(timer) = active.timer {
                if abort_timer {
                    timer.abort();
                }
            }
        }
        let was_scanning = self.is_scanning.get();
        if was_scanning {
            self.is_scanning.set(false);
        }
        was_scanning
    }

    async fn request_stop(&self) {
        if let Err(e) = self.ctx.correlator.invoke(methods::STOP_SCAN, &()).await {
            warn!("Failed to stop scan: {}", e);
        }
    }
}

/// Scan controller.
#[derive(Clone)]
pub struct Scanner {
    inner: Arc<ScannerInner>,
}

impl Scanner {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self {
            inner: Arc::new(ScannerInner {
                ctx,
                is_scanning: LatestValue::new(false),
                results: LatestValue::new(Vec::new()),
                session: Mutex::new(None),
            }),
        }
    }

    /// Start scanning.
    ///
    /// The returned subscription yields each sighting and ends when the scan
    /// stops. Results are buffered from before the platform is asked to scan.
    ///
    /// # Errors
    ///
    /// [`Error::ScanInProgress`] if a scan is already running (the platform is
    /// not contacted), or the invocation error if the platform refuses to scan.
    pub async fn start_scan(&self, settings: ScanSettings) -> Result<Subscription<ScanResult>> {
        let results = {
            let mut session = self.inner.session.lock();
            if session.is_some() || self.inner.is_scanning.get() {
                debug!("Scan requested while another is running");
                return Err(Error::ScanInProgress);
            }

            self.inner.is_scanning.set(true);
            self.inner.results.set(Vec::new());

            let queue = ResultQueue::new();
            let weak = Arc::downgrade(&self.inner);
            let results = queue.listen_then(self.inner.result_source(), move || async move {
                if let Some(inner) = weak.upgrade() {
                    debug!("Scan result stream ended");
                    if inner.teardown(true) {
                        inner.request_stop().await;
                    }
                }
            });
            let timer = settings
                .timeout
                .map(|timeout| ScannerInner::arm_timer(Arc::downgrade(&self.inner), timeout));
            *session = Some(ScanSession { queue, timer });
            results
        };

        info!(
            "Starting BLE scan (services: {:?}, timeout: {:?})",
            settings.service_uuids, settings.timeout
        );
        if let Err(e) = self.inner.ctx.correlator.invoke(methods::START_SCAN, &settings).await {
            warn!("Failed to start scan: {}", e);
            self.inner.teardown(true);
            return Err(e);
        }

        Ok(results)
    }

    /// Stop scanning.
    ///
    /// Safe to call when no scan is running; the platform is asked to stop
    /// either way and local state always ends up idle.
    pub async fn stop_scan(&self) -> Result<()> {
        info!("Stopping BLE scan");
        let result = self
            .inner
            .ctx
            .correlator
            .invoke(methods::STOP_SCAN, &())
            .await
            .map(|_| ());
        self.inner.teardown(true);
        result
    }

    /// Scan until the scan ends and return everything seen.
    ///
    /// Without a timeout in `settings` this only returns once another task
    /// calls [`stop_scan`](Self::stop_scan).
    pub async fn scan_for(&self, settings: ScanSettings) -> Result<Vec<ScanResult>> {
        let mut results = self.start_scan(settings).await?;
        while results.recv().await.is_some() {}
        Ok(self.scan_results())
    }

    /// Check if currently scanning.
    pub fn is_scanning(&self) -> bool {
        self.inner.is_scanning.get()
    }

    /// Current scanning flag followed by every change.
    pub fn is_scanning_stream(&self) -> Subscription<bool> {
        self.inner.is_scanning.subscribe()
    }

    /// Deduplicated results of the current (or last) scan, in first-seen order.
    pub fn scan_results(&self) -> Vec<ScanResult> {
        self.inner.results.get()
    }

    /// Current result list followed by the list after every sighting.
    pub fn scan_results_stream(&self) -> Subscription<Vec<ScanResult>> {
        self.inner.results.subscribe()
    }

    /// Register a callback for every sighting, across scans.
    pub fn on_scan_result<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&ScanResult) + Send + Sync + 'static,
    {
        let sightings = self
            .inner
            .ctx
            .correlator
            .listen::<ScanResultEvent>(methods::SCAN_RESULT)
            .map(ScanResult::from);
        spawn_callback(sightings, move |result| callback(&result))
    }
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("is_scanning", &self.is_scanning())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::test_support::{publish, scripted, silent};
    use serde_json::json;

    fn sighting(id: &str, rssi: i16) -> serde_json::Value {
        json!({ "remoteId": id, "name": "", "rssi": rssi })
    }

    #[tokio::test]
    async fn test_second_scan_is_rejected_locally() {
        let (ctx, adapter) = silent();
        let scanner = Scanner::new(ctx);

        let _results = scanner.start_scan(ScanSettings::default()).await.unwrap();
        let err = scanner.start_scan(ScanSettings::default()).await.unwrap_err();

        assert!(matches!(err, Error::ScanInProgress));
        assert_eq!(adapter.count(methods::START_SCAN), 1);
    }

    #[tokio::test]
    async fn test_results_are_deduplicated_in_order() {
        let (ctx, _adapter) = silent();
        let scanner = Scanner::new(ctx.clone());

        let mut results = scanner.start_scan(ScanSettings::default()).await.unwrap();
        publish(ctx.bus(), methods::SCAN_RESULT, sighting("A", -50));
        publish(ctx.bus(), methods::SCAN_RESULT, sighting("B", -60));
        publish(ctx.bus(), methods::SCAN_RESULT, sighting("a", -45));

        for _ in 0..3 {
            results.recv().await.unwrap();
        }
        let list = scanner.scan_results();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].device.as_str(), "a");
        assert_eq!(list[0].rssi, -45);
        assert_eq!(list[1].device.as_str(), "B");
    }

    #[tokio::test]
    async fn test_immediate_result_is_buffered() {
        let (ctx, _adapter) = scripted(SessionConfig::default(), |bus, method, _| {
            if method == methods::START_SCAN {
                publish(bus, methods::SCAN_RESULT, json!({ "remoteId": "X", "rssi": -70 }));
            }
            Ok(json!(true))
        });
        let scanner = Scanner::new(ctx);

        let mut results = scanner.start_scan(ScanSettings::default()).await.unwrap();
        let first = results.recv().await.unwrap();
        assert_eq!(first.device.as_str(), "X");
    }

    #[tokio::test]
    async fn test_start_failure_resets_state() {
        let (ctx, _adapter) = scripted(SessionConfig::default(), |_, method, _| {
            if method == methods::START_SCAN {
                Err(Error::invocation(method, "bluetooth off"))
            } else {
                Ok(json!(true))
            }
        });
        let scanner = Scanner::new(ctx);

        let err = scanner.start_scan(ScanSettings::default()).await.unwrap_err();
        assert!(matches!(err, Error::Invocation { .. }));
        assert!(!scanner.is_scanning());

        // A fresh attempt reaches the platform again instead of hitting ScanInProgress.
        let err = scanner.start_scan(ScanSettings::default()).await.unwrap_err();
        assert!(matches!(err, Error::Invocation { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_stops_exactly_once() {
        let (ctx, adapter) = silent();
        let scanner = Scanner::new(ctx);

        let mut results = scanner
            .start_scan(ScanSettings::default().with_timeout(Duration::from_secs(4)))
            .await
            .unwrap();
        assert!(scanner.is_scanning());

        assert!(results.recv().await.is_none());
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!scanner.is_scanning());
        assert_eq!(adapter.count(methods::STOP_SCAN), 1);
    }

    #[tokio::test]
    async fn test_stop_ends_results_and_is_idempotent() {
        let (ctx, adapter) = silent();
        let scanner = Scanner::new(ctx);
        let mut flags = scanner.is_scanning_stream();
        assert_eq!(flags.recv().await, Some(false));

        let mut results = scanner.start_scan(ScanSettings::default()).await.unwrap();
        scanner.stop_scan().await.unwrap();
        scanner.stop_scan().await.unwrap();

        assert!(results.recv().await.is_none());
        assert_eq!(flags.recv().await, Some(true));
        assert_eq!(flags.recv().await, Some(false));
        assert!(flags.try_recv().is_none());
        assert_eq!(adapter.count(methods::STOP_SCAN), 2);
    }

    #[tokio::test]
    async fn test_stop_keeps_sightings_already_delivered() {
        let (ctx, _adapter) = silent();
        let scanner = Scanner::new(ctx.clone());

        let mut results = scanner.start_scan(ScanSettings::default()).await.unwrap();
        publish(ctx.bus(), methods::SCAN_RESULT, sighting("A", -50));
        publish(ctx.bus(), methods::SCAN_RESULT, sighting("B", -60));
        scanner.stop_scan().await.unwrap();

        let mut delivered = Vec::new();
        while let Some(result) = results.recv().await {
            delivered.push(result.device.to_string());
        }
        assert_eq!(delivered, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(scanner.scan_results().len(), 2);
        assert!(!scanner.is_scanning());
    }

    #[tokio::test]
    async fn test_closed_bus_stops_scan() {
        let (ctx, adapter) = silent();
        let scanner = Scanner::new(ctx.clone());

        let mut results = scanner.start_scan(ScanSettings::default()).await.unwrap();
        ctx.bus().close();

        assert!(results.recv().await.is_none());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!scanner.is_scanning());
        assert_eq!(adapter.count(methods::STOP_SCAN), 1);
    }

    #[test]
    fn test_settings_payload() {
        let settings = ScanSettings::default()
            .with_services([crate::ble::uuids::uuid_from_u16(0x180d)])
            .with_allow_duplicates(true)
            .with_timeout(Duration::from_secs(4));
        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["allowDuplicates"], json!(true));
        assert_eq!(value["scanMode"], json!("balanced"));
        assert!(value.get("timeout").is_none());
    }
}
