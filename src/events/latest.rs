//! Single-slot cache that replays its current value to new subscribers.

use parking_lot::Mutex;
use std::sync::Arc;

use super::bus::{Fanout, Subscription};

struct Slot<T> {
    value: T,
    fanout: Fanout<T>,
}

/// Holds the most recent value of some quantity and broadcasts every change.
///
/// A new [`subscribe`](Self::subscribe) yields the current value first, then
/// every later [`set`](Self::set) in order. Setting an equal value still
/// notifies. Clones share the same slot.
pub struct LatestValue<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T: Clone> LatestValue<T> {
    /// Create a cache holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                value: initial,
                fanout: Fanout::new(),
            })),
        }
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.slot.lock().value.clone()
    }

    /// Replace the value and notify every subscriber.
    pub fn set(&self, value: T) {
        let mut slot = self.slot.lock();
        slot.fanout.send(&value);
        slot.value = value;
    }

    /// Modify the value in place, notify subscribers and return the new value.
    pub fn update<F: FnOnce(&mut T)>(&self, f: F) -> T {
        let mut slot = self.slot.lock();
        f(&mut slot.value);
        let value = slot.value.clone();
        slot.fanout.send(&value);
        value
    }

    /// Current value followed by every later update.
    pub fn subscribe(&self) -> Subscription<T> {
        let mut slot = self.slot.lock();
        let current = slot.value.clone();
        slot.fanout.subscribe(Some(current))
    }
}

impl<T> Clone for LatestValue<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T: Clone + Default> Default for LatestValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + std::fmt::Debug> std::fmt::Debug for LatestValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LatestValue").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_current_value() {
        let cache = LatestValue::new(false);
        cache.set(true);

        let mut sub = cache.subscribe();
        assert_eq!(sub.recv().await, Some(true));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_equal_values_still_notify() {
        let cache = LatestValue::new(1);
        let mut sub = cache.subscribe();
        cache.set(1);
        cache.set(2);

        assert_eq!(sub.try_recv(), Some(1));
        assert_eq!(sub.try_recv(), Some(1));
        assert_eq!(sub.try_recv(), Some(2));
        assert_eq!(cache.get(), 2);
    }

    #[tokio::test]
    async fn test_update_in_place() {
        let cache: LatestValue<Vec<u8>> = LatestValue::default();
        let mut sub = cache.subscribe();
        let after = cache.update(|v| v.push(7));

        assert_eq!(after, vec![7]);
        assert_eq!(sub.try_recv(), Some(vec![]));
        assert_eq!(sub.try_recv(), Some(vec![7]));
    }

    #[test]
    fn test_clones_share_state() {
        let cache = LatestValue::new("a");
        let other = cache.clone();
        other.set("b");
        assert_eq!(cache.get(), "b");
    }
}
