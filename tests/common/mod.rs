//! Scripted platform used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use gatt_session::protocol::methods;
use gatt_session::{
    BluetoothDevice, DeviceManager, EventBus, PlatformAdapter, PlatformEvent, Result, SessionConfig,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

pub type Script = dyn Fn(&EventBus, &str, &Value) -> Result<Value> + Send + Sync;

/// Records every invocation and answers through a script that may publish
/// events before `invoke` returns.
pub struct FakePlatform {
    bus: EventBus,
    calls: Mutex<Vec<(String, Value)>>,
    script: Box<Script>,
}

impl FakePlatform {
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, args)| args.clone())
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls_to(method).len()
    }

    pub fn publish(&self, method: &str, payload: Value) {
        self.bus.publish(PlatformEvent::new(method, payload));
    }
}

#[async_trait]
impl PlatformAdapter for FakePlatform {
    async fn invoke(&self, method: &str, arguments: Value) -> Result<Value> {
        self.calls.lock().push((method.to_string(), arguments.clone()));
        (self.script)(&self.bus, method, &arguments)
    }
}

pub fn session<F>(config: SessionConfig, script: F) -> (DeviceManager, Arc<FakePlatform>)
where
    F: Fn(&EventBus, &str, &Value) -> Result<Value> + Send + Sync + 'static,
{
    init_tracing();
    let bus = EventBus::new();
    let platform = Arc::new(FakePlatform {
        bus: bus.clone(),
        calls: Mutex::new(Vec::new()),
        script: Box::new(script),
    });
    let manager = DeviceManager::with_event_bus(platform.clone(), config, bus);
    (manager, platform)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn publish(bus: &EventBus, method: &str, payload: Value) {
    bus.publish(PlatformEvent::new(method, payload));
}

pub const HEART_RATE_SERVICE: &str = "0000180d-0000-1000-8000-00805f9b34fb";
pub const HEART_RATE_MEASUREMENT: &str = "00002a37-0000-1000-8000-00805f9b34fb";
pub const BODY_SENSOR_LOCATION: &str = "00002a38-0000-1000-8000-00805f9b34fb";

fn characteristic(id: &str, uuid: &str) -> Value {
    json!({
        "uuid": uuid,
        "remoteId": id,
        "serviceUuid": HEART_RATE_SERVICE,
        "properties": { "read": true, "write": true, "notify": true },
        "descriptors": [{
            "uuid": "00002902-0000-1000-8000-00805f9b34fb",
            "remoteId": id,
            "serviceUuid": HEART_RATE_SERVICE,
            "characteristicUuid": uuid,
            "value": [0, 0]
        }],
        "value": []
    })
}

/// Answers for a connected heart-rate sensor; everything else is accepted silently.
pub fn connected_sensor(bus: &EventBus, method: &str, args: &Value) -> Result<Value> {
    let id = args["remoteId"].as_str().unwrap_or_default().to_string();
    match method {
        methods::DEVICE_STATE => Ok(json!({ "remoteId": id, "state": "connected" })),
        methods::DISCOVER_SERVICES => {
            publish(
                bus,
                methods::DISCOVER_SERVICES_RESULT,
                json!({
                    "remoteId": id,
                    "services": [{
                        "uuid": HEART_RATE_SERVICE,
                        "remoteId": id,
                        "characteristics": [
                            characteristic(&id, HEART_RATE_MEASUREMENT),
                            characteristic(&id, BODY_SENSOR_LOCATION)
                        ]
                    }]
                }),
            );
            Ok(json!(true))
        }
        _ => Ok(json!(true)),
    }
}

/// Device `id` with its services discovered.
pub async fn discovered(manager: &DeviceManager, id: &str) -> BluetoothDevice {
    let device = manager.device(id);
    device.discover_services().await.expect("discovery");
    device
}

/// Let spawned and joined futures make progress.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
