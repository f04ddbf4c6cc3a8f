//! Binds outbound platform requests to the inbound events that answer them.
//!
//! Every round-trip follows the same steps:
//! 1. subscribe to the bus, filtered by the response method name;
//! 2. issue the invocation;
//! 3. take the first response accepted by the caller's matcher, optionally
//!    bounded by a timeout.
//!
//! The subscription always exists before the invocation is sent, so an
//! answer published the instant the platform receives the request is still
//! seen. A timeout only abandons the wait locally; a late answer then finds no
//! listener and is dropped by the bus.

use futures::future::ready;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::bus::EventBus;
use crate::error::{Error, Operation, Result};
use crate::platform::{PlatformAdapter, PlatformEvent};

/// One correlated round-trip.
pub(crate) struct Call<'a, A: ?Sized> {
    /// Outbound method.
    pub method: &'static str,
    /// Outbound arguments.
    pub arguments: &'a A,
    /// Inbound event answering the call.
    pub response: &'static str,
    /// Operation reported in timeout errors.
    pub operation: Operation,
    /// Identifying context reported in timeout errors.
    pub target: String,
    /// Bound on the wait for the response.
    pub timeout: Option<Duration>,
}

/// Decode `event` as a `method` payload of type `T`, if it is one.
pub(crate) fn decode_event<T: DeserializeOwned>(method: &str, event: PlatformEvent) -> Option<T> {
    if event.method != method {
        return None;
    }
    match serde_json::from_value(event.payload) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!("Ignoring undecodable {} payload: {}", method, e);
            None
        }
    }
}

/// First item of `events` accepted by `matcher`, or `None` if the stream ends.
pub(crate) async fn first_match<S, T, F>(mut events: S, matcher: F) -> Option<T>
where
    S: Stream<Item = T> + Unpin,
    F: Fn(&T) -> bool,
{
    while let Some(event) = events.next().await {
        if matcher(&event) {
            return Some(event);
        }
        trace!("Skipping non-matching event");
    }
    None
}

/// Await `fut`, failing with [`Error::Timeout`] if `timeout` elapses first.
///
/// `started` is when the overall operation began, so the reported elapsed time
/// covers the invocation as well as the wait.
pub(crate) async fn bounded<T, Fut>(
    timeout: Option<Duration>,
    started: Instant,
    operation: Operation,
    target: impl FnOnce() -> String,
    fut: Fut,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    let Some(limit) = timeout else {
        return fut.await;
    };
    let remaining = limit.saturating_sub(started.elapsed());
    match tokio::time::timeout(remaining, fut).await {
        Ok(result) => result,
        Err(_) => {
            let target = target();
            debug!("{} timed out ({})", operation, target);
            Err(Error::Timeout {
                operation,
                target,
                elapsed: started.elapsed(),
            })
        }
    }
}

/// Outbound channel plus inbound bus, shared by every component.
#[derive(Clone)]
pub(crate) struct Correlator {
    platform: Arc<dyn PlatformAdapter>,
    bus: EventBus,
}

impl Correlator {
    pub(crate) fn new(platform: Arc<dyn PlatformAdapter>, bus: EventBus) -> Self {
        Self { platform, bus }
    }

    pub(crate) fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Live, typed slice of the bus carrying only `method` events.
    pub(crate) fn listen<T>(&self, method: &'static str) -> impl Stream<Item = T> + Send + Unpin + 'static
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.bus
            .subscribe()
            .filter_map(move |event| ready(decode_event::<T>(method, event)))
    }

    /// Issue `method` and return the platform's acknowledgement.
    pub(crate) async fn invoke<A: Serialize + ?Sized>(&self, method: &str, arguments: &A) -> Result<Value> {
        let arguments = serde_json::to_value(arguments)?;
        trace!("Invoking {} with {}", method, arguments);
        self.platform.invoke(method, arguments).await
    }

    /// Issue `method` and decode its immediate result.
    pub(crate) async fn query<A, R>(&self, method: &str, arguments: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let value = self.invoke(method, arguments).await?;
        serde_json::from_value(value).map_err(|e| Error::InvalidData {
            context: format!("result of {}: {}", method, e),
        })
    }

    /// Full round-trip: listen, invoke, take the first matching response.
    pub(crate) async fn request<A, R, F>(&self, call: Call<'_, A>, matcher: F) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned + Send + 'static,
        F: Fn(&R) -> bool,
    {
        let started = Instant::now();
        let responses = self.listen::<R>(call.response);

        self.invoke(call.method, call.arguments).await?;
        debug!("Waiting for {} after {}", call.response, call.method);

        let Call {
            operation,
            target,
            timeout,
            ..
        } = call;
        bounded(timeout, started, operation, move || target, async move {
            first_match(responses, matcher).await.ok_or(Error::Closed)
        })
        .await
    }
}
