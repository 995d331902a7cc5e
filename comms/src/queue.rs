use std::{collections::VecDeque, pin::pin, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::Notify;

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
}

/// Unbounded FIFO shared between the producer and consumers of a pipeline hop.
///
/// `put` never blocks, `get` waits until an item is available. Cloning yields
/// another handle to the same queue.
pub struct Queue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                items: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
            }),
        }
    }

    /// Appends `item` at the back of the queue.
    pub fn put(&self, item: T) {
        self.inner.items.lock().push_back(item);
        self.inner.notify.notify_one();
    }

    /// Pops the item at the front of the queue, waiting for one if it's empty.
    pub async fn get(&self) -> T {
        loop {
            // Registered before checking, a put racing with the check still wakes us.
            let mut notified = pin!(self.inner.notify.notified());
            notified.as_mut().enable();

            if let Some(item) = self.try_get() {
                return item;
            }

            notified.await;
        }
    }

    /// Pops the item at the front of the queue if there is one.
    pub fn try_get(&self) -> Option<T> {
        self.inner.items.lock().pop_front()
    }

    /// Snapshot of the amount of queued items.
    pub fn qsize(&self) -> usize {
        self.inner.items.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.qsize() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn preserves_fifo_order() {
        let queue = Queue::new();
        for i in 0..5 {
            queue.put(i);
        }

        assert_eq!(queue.qsize(), 5);
        for i in 0..5 {
            assert_eq!(queue.get().await, i);
        }
        assert!(queue.is_empty());
        assert_eq!(queue.try_get(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn get_waits_for_a_producer() {
        let queue = Queue::new();
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { (queue.get().await, queue.get().await) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.put("a");
        queue.put("b");

        let got = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, ("a", "b"));
    }
}
