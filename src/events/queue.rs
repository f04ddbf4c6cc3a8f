//! Closable buffer between a push source and a pulling consumer.

use futures::{FutureExt, Stream, StreamExt};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use super::bus::Subscription;

#[derive(Default)]
struct QueueState {
    /// Tells the running forwarder to stop taking new items.
    stop: Option<oneshot::Sender<()>>,
    closed: bool,
}

/// Buffers a source sequence for a consumer and lets any task end it.
///
/// [`listen`](Self::listen) starts draining the source immediately, so items
/// produced before the consumer first polls are kept. [`close`](Self::close)
/// stops the forwarding; the consumer still gets everything the source had
/// already produced and then sees the end of the sequence. A source that
/// finishes on its own ends the consumer the same way.
pub struct ResultQueue<T> {
    state: Arc<Mutex<QueueState>>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + 'static> ResultQueue<T> {
    /// Create an idle queue.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            _marker: std::marker::PhantomData,
        }
    }

    /// Start buffering `source`.
    pub fn listen<S>(&self, source: S) -> Subscription<T>
    where
        S: Stream<Item = T> + Send + 'static,
    {
        self.listen_then(source, || async {})
    }

    /// Start buffering `source`; run `on_complete` if the source finishes by itself
    /// (it is not run when the queue is closed first).
    pub fn listen_then<S, F, Fut>(&self, source: S, on_complete: F) -> Subscription<T>
    where
        S: Stream<Item = T> + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        if state.closed {
            return Subscription::from_receiver(rx);
        }

        let (stop_tx, mut stop_rx) = oneshot::channel();
        if let Some(previous) = state.stop.replace(stop_tx) {
            let _ = previous.send(());
        }

        let shared = self.state.clone();
        tokio::spawn(async move {
            let mut source = Box::pin(source);
            let stopped = loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break true,
                    item = source.next() => match item {
                        Some(item) => {
                            if tx.send(item).is_err() {
                                trace!("Result consumer gone, still draining source");
                            }
                        }
                        None => break false,
                    },
                }
            };
            if stopped {
                // Keep whatever the source already holds, take nothing new.
                while let Some(Some(item)) = source.next().now_or_never() {
                    let _ = tx.send(item);
                }
                trace!("Result queue closed");
                return;
            }
            drop(source);
            drop(tx);
            drop(stop_rx);

            // Detach before running the hook so a close() from inside it is a no-op.
            let closed = {
                let mut state = shared.lock();
                if state.stop.as_ref().is_some_and(|stop| stop.is_closed()) {
                    state.stop = None;
                }
                std::mem::replace(&mut state.closed, true)
            };
            if !closed {
                on_complete().await;
            }
        });

        Subscription::from_receiver(rx)
    }

    /// End the consumer sequence after it drains. Idempotent and callable from any task.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        if let Some(stop) = state.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Whether the queue has been closed or its source has finished.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl<T: Send + 'static> Default for ResultQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_buffers_before_consumer_polls() {
        let (tx, rx) = mpsc::unbounded_channel::<u32>();
        let queue = ResultQueue::new();
        let mut results = queue.listen(Subscription::from_receiver(rx));

        tx.send(1).unwrap();
        tx.send(2).unwrap();
        drop(tx);

        assert_eq!(results.recv().await, Some(1));
        assert_eq!(results.recv().await, Some(2));
        assert_eq!(results.recv().await, None);
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let (tx, rx) = mpsc::unbounded_channel::<u32>();
        let queue = ResultQueue::new();
        let mut results = queue.listen(Subscription::from_receiver(rx));

        tx.send(1).unwrap();
        assert_eq!(results.recv().await, Some(1));
        tx.send(2).unwrap();
        tokio::task::yield_now().await;

        queue.close();
        queue.close();

        let mut rest = Vec::new();
        while let Some(item) = results.recv().await {
            rest.push(item);
        }
        assert_eq!(rest, vec![2]);
        assert!(tx.send(3).is_err());
    }

    #[tokio::test]
    async fn test_close_keeps_items_the_forwarder_has_not_moved() {
        let (tx, rx) = mpsc::unbounded_channel::<u32>();
        let queue = ResultQueue::new();
        let mut results = queue.listen(Subscription::from_receiver(rx));

        // The forwarder has not run yet when the queue is closed.
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        queue.close();

        let mut rest = Vec::new();
        while let Some(item) = results.recv().await {
            rest.push(item);
        }
        assert_eq!(rest, vec![1, 2]);
        assert!(tx.send(3).is_err());
    }

    #[tokio::test]
    async fn test_on_complete_only_for_natural_end() {
        let ran = Arc::new(AtomicUsize::new(0));

        let queue = ResultQueue::new();
        let counter = ran.clone();
        let mut results = queue.listen_then(futures::stream::iter(vec![1, 2]), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        while results.recv().await.is_some() {}
        tokio::task::yield_now().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        let (_tx, rx) = mpsc::unbounded_channel::<u32>();
        let queue = ResultQueue::new();
        let counter = ran.clone();
        let mut results = queue.listen_then(Subscription::from_receiver(rx), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        queue.close();
        assert_eq!(results.recv().await, None);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_listen_after_close_is_empty() {
        let queue = ResultQueue::new();
        queue.close();
        let mut results = queue.listen(futures::stream::iter(vec![1]));
        assert_eq!(results.recv().await, None);
    }
}
