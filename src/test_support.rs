//! Scripted platform adapter used by the inline unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::context::Context;
use crate::error::Result;
use crate::events::EventBus;
use crate::platform::{PlatformAdapter, PlatformEvent};

type Responder = Box<dyn Fn(&EventBus, &str, &Value) -> Result<Value> + Send + Sync>;

/// Records every invocation and answers it through `responder`, which may
/// publish events on the bus before the invocation returns.
pub(crate) struct ScriptedAdapter {
    bus: EventBus,
    calls: Mutex<Vec<(String, Value)>>,
    responder: Responder,
}

impl ScriptedAdapter {
    pub(crate) fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub(crate) fn count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(m, _)| m == method).count()
    }
}

#[async_trait]
impl PlatformAdapter for ScriptedAdapter {
    async fn invoke(&self, method: &str, arguments: Value) -> Result<Value> {
        self.calls.lock().push((method.to_string(), arguments.clone()));
        (self.responder)(&self.bus, method, &arguments)
    }
}

/// Context wired to a scripted adapter.
pub(crate) fn scripted<F>(config: SessionConfig, responder: F) -> (Arc<Context>, Arc<ScriptedAdapter>)
where
    F: Fn(&EventBus, &str, &Value) -> Result<Value> + Send + Sync + 'static,
{
    let bus = EventBus::new();
    let adapter = Arc::new(ScriptedAdapter {
        bus: bus.clone(),
        calls: Mutex::new(Vec::new()),
        responder: Box::new(responder),
    });
    let ctx = Context::new(adapter.clone(), bus, config);
    (ctx, adapter)
}

/// Context whose adapter accepts everything and never answers.
pub(crate) fn silent() -> (Arc<Context>, Arc<ScriptedAdapter>) {
    scripted(SessionConfig::default(), |_, _, _| Ok(json!(true)))
}

pub(crate) fn publish(bus: &EventBus, method: &str, payload: Value) {
    bus.publish(PlatformEvent::new(method, payload));
}
