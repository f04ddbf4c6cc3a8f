//! Callback registration helpers.

use futures::{Stream, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(1);

/// Callback handle for unregistering callbacks.
///
/// Dropping the handle unregisters the callback as well.
pub struct CallbackHandle {
    id: u64,
    unregister_fn: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CallbackHandle {
    /// Create a new callback handle.
    pub(crate) fn new(id: u64, unregister_fn: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            unregister_fn: Some(Box::new(unregister_fn)),
        }
    }

    /// Unregister this callback.
    pub fn unregister(mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }

    /// Get the callback ID.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }
}

impl std::fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHandle").field("id", &self.id).finish()
    }
}

/// Run `callback` for every item of `stream` on a background task.
///
/// The task stops when the stream ends or the returned handle is dropped.
pub(crate) fn spawn_callback<S, F>(stream: S, callback: F) -> CallbackHandle
where
    S: Stream + Send + 'static,
    S::Item: Send,
    F: Fn(S::Item) + Send + Sync + 'static,
{
    let callback_id = NEXT_CALLBACK_ID.fetch_add(1, Ordering::SeqCst);

    let handle = tokio::spawn(async move {
        let mut stream = Box::pin(stream);
        while let Some(item) = stream.next().await {
            callback(item);
        }
    });

    CallbackHandle::new(callback_id, move || {
        handle.abort();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_callback_sees_items() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = spawn_callback(
            crate::events::Subscription::from_receiver(rx),
            move |n: u32| sink.lock().push(n),
        );

        tx.send(1).unwrap();
        tx.send(2).unwrap();
        drop(tx);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(*seen.lock(), vec![1, 2]);
        assert!(handle.id() > 0);
    }

    #[tokio::test]
    async fn test_unregister_stops_delivery() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = spawn_callback(
            crate::events::Subscription::from_receiver(rx),
            move |n: u32| sink.lock().push(n),
        );

        handle.unregister();
        tokio::task::yield_now().await;
        let _ = tx.send(1);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert!(seen.lock().is_empty());
    }
}
