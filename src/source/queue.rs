use crate::av::Packet;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;

/// Thread-safe FIFO of packets shared between a producing source and the
/// consuming interleaver.
///
/// The queue is unbounded; any backpressure comes from the source's own
/// buffering policy. Ordering across queues is decided by the interleaver,
/// never here. Consumers can wait for data with a bounded timeout so that
/// source liveness is re-checked on every wake instead of blocking
/// indefinitely.
#[derive(Debug, Default)]
pub struct PacketQueue {
    inner: Mutex<VecDeque<Packet>>,
    notify: Notify,
}

impl PacketQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a packet and wakes any waiting consumer.
    pub fn push(&self, packet: Packet) {
        self.inner.lock().push_back(packet);
        self.notify.notify_waiters();
    }

    /// Removes and returns the head packet, transferring ownership to the
    /// caller.
    pub fn dequeue(&self) -> Option<Packet> {
        self.inner.lock().pop_front()
    }

    /// Applies `f` to the head packet without dequeuing it.
    pub fn with_head<R>(&self, f: impl FnOnce(&Packet) -> R) -> Option<R> {
        self.inner.lock().front().map(f)
    }

    /// Number of queued packets.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the queue holds no packets.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Drops all queued packets. Used on teardown so undelivered packets
    /// are released with the queue.
    pub fn clear(&self) {
        self.inner.lock().clear();
        self.notify.notify_waiters();
    }

    /// Wakes any waiting consumer without pushing data, e.g. on a source
    /// status change.
    pub fn wake(&self) {
        self.notify.notify_waiters();
    }

    /// Waits until new data may be available or `timeout` elapses,
    /// whichever comes first. Returns `true` if the queue is non-empty on
    /// return.
    pub async fn wait_for_data(&self, timeout: Duration) -> bool {
        if !self.is_empty() {
            return true;
        }
        let notified = self.notify.notified();
        let _ = tokio::time::timeout(timeout, notified).await;
        !self.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn fifo_order() {
        let q = PacketQueue::new();
        q.push(Packet::new(vec![1]).with_dts(10));
        q.push(Packet::new(vec![2]).with_dts(20));

        assert_eq!(q.len(), 2);
        assert_eq!(q.with_head(|p| p.dts), Some(Some(10)));
        assert_eq!(q.dequeue().unwrap().dts, Some(10));
        assert_eq!(q.dequeue().unwrap().dts, Some(20));
        assert!(q.dequeue().is_none());
    }

    #[tokio::test]
    async fn wait_wakes_on_push() {
        let q = Arc::new(PacketQueue::new());
        let producer = q.clone();
        let waiter = tokio::spawn(async move {
            producer.wait_for_data(Duration::from_secs(5)).await
        });

        // Give the waiter a chance to register before pushing.
        tokio::task::yield_now().await;
        q.push(Packet::new(vec![0]));
        assert!(waiter.await.unwrap());
    }

    #[test]
    fn wait_times_out_empty() {
        tokio_test::block_on(async {
            let q = PacketQueue::new();
            assert!(!q.wait_for_data(Duration::from_millis(10)).await);
        });
    }
}
