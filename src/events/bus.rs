//! Fan-out of platform events to independent listeners.

use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::trace;

use crate::platform::PlatformEvent;

/// A live sequence of values delivered by a [`EventBus`] or a
/// [`LatestValue`](super::LatestValue).
///
/// Every subscription has its own unbounded buffer, so a slow consumer never
/// loses items or holds up other consumers. The sequence ends when the source
/// is closed or dropped.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    pub(crate) fn from_receiver(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self { rx }
    }

    /// Wait for the next item. Returns `None` once the source is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take an already-buffered item without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

/// Set of subscriber queues. Not synchronized; owners wrap it in a lock.
#[derive(Debug)]
pub(crate) struct Fanout<T> {
    subscribers: Vec<mpsc::UnboundedSender<T>>,
}

impl<T: Clone> Fanout<T> {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Register a new subscriber, optionally seeding its queue with `first`.
    pub(crate) fn subscribe(&mut self, first: Option<T>) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(value) = first {
            let _ = tx.send(value);
        }
        self.subscribers.push(tx);
        Subscription::from_receiver(rx)
    }

    /// Deliver `value` to every live subscriber, forgetting dropped ones.
    pub(crate) fn send(&mut self, value: &T) {
        self.subscribers.retain(|tx| tx.send(value.clone()).is_ok());
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub(crate) fn clear(&mut self) {
        self.subscribers.clear();
    }
}

#[derive(Debug)]
struct BusState {
    fanout: Fanout<PlatformEvent>,
    closed: bool,
}

/// Broadcast bus carrying every inbound [`PlatformEvent`].
///
/// Each [`subscribe`](Self::subscribe) sees every event published after the
/// call, exactly once and in publish order. Nothing is retained: an event
/// published with no matching listener is gone.
#[derive(Debug, Clone)]
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
}

impl EventBus {
    /// Create an empty, open bus.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                fanout: Fanout::new(),
                closed: false,
            })),
        }
    }

    /// Deliver `event` to all current subscribers.
    pub fn publish(&self, event: PlatformEvent) {
        let mut state = self.state.lock();
        if state.closed {
            trace!("Dropping {} published after close", event.method);
            return;
        }
        state.fanout.send(&event);
    }

    /// Start receiving every event published from now on.
    ///
    /// Subscribing to a closed bus yields an already-finished sequence.
    pub fn subscribe(&self) -> Subscription<PlatformEvent> {
        let mut state = self.state.lock();
        let sub = state.fanout.subscribe(None);
        if state.closed {
            state.fanout.clear();
        }
        sub
    }

    /// Finish every subscription and refuse further events.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.fanout.clear();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of live subscriptions (dropped ones are pruned lazily).
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().fanout.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn event(n: i64) -> PlatformEvent {
        PlatformEvent::new("Tick", json!(n))
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_every_event_in_order() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        for n in 0..3 {
            bus.publish(event(n));
        }
        bus.close();

        let a: Vec<_> = (&mut a).map(|e| e.payload).collect().await;
        let b: Vec<_> = (&mut b).map(|e| e.payload).collect().await;
        assert_eq!(a, vec![json!(0), json!(1), json!(2)]);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.publish(event(1));
        let mut sub = bus.subscribe();
        bus.publish(event(2));

        assert_eq!(sub.recv().await.map(|e| e.payload), Some(json!(2)));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(event(0));
        assert_eq!(bus.subscriber_count(), 1);
        drop(kept);
    }

    #[tokio::test]
    async fn test_closed_bus_ends_subscriptions() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.close();
        bus.publish(event(0));
        assert!(sub.recv().await.is_none());
        assert!(bus.subscribe().recv().await.is_none());
        assert!(bus.is_closed());
    }
}
