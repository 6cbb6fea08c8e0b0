//! Bounded shared buffer of inbound live events
//!
//! One producer (the stream connection) appends, any number of query tasks
//! take snapshots. A single mutex guards the sequence and is held only for the
//! append or the copy, never while events are classified or formatted.
//!
//! Every event is tagged with the subscription epoch that was current when it
//! was appended. `clear()` advances the epoch, so a poll that started before a
//! venue change can ignore events buffered for the newer selection.

use prometheus::IntGauge;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::metrics;

/// Maximum number of events retained
pub const BUFFER_CAPACITY: usize = 100;

/// An event as stored in the buffer
#[derive(Debug, Clone)]
pub struct BufferedEvent {
    pub epoch: u64,
    pub payload: Arc<Value>,
}

#[derive(Debug)]
struct Inner {
    events: VecDeque<BufferedEvent>,
    epoch: u64,
}

/// Lock-guarded FIFO with oldest-first eviction
pub struct EventBuffer {
    inner: Mutex<Inner>,
    capacity: usize,
    len_gauge: IntGauge,
}

impl std::fmt::Debug for EventBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBuffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::with_capacity(BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: VecDeque::with_capacity(capacity + 1),
                epoch: 0,
            }),
            capacity,
            len_gauge: metrics::buffer_len_gauge(),
        }
    }

    #[cfg(test)]
    fn with_gauge(mut self, gauge: IntGauge) -> Self {
        self.len_gauge = gauge;
        self
    }

    // Poisoning is ignored: every critical section leaves the deque consistent.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event, evicting from the front past capacity.
    /// Returns the buffer length after the append.
    pub fn append(&self, event: Value) -> usize {
        let payload = Arc::new(event);
        let mut inner = self.lock();
        let epoch = inner.epoch;
        inner.events.push_back(BufferedEvent { epoch, payload });
        while inner.events.len() > self.capacity {
            inner.events.pop_front();
        }
        // Gauge is set under the lock
        let len = inner.events.len();
        self.len_gauge.set(len as i64);
        len
    }

    /// Independent copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<BufferedEvent> {
        self.lock().events.iter().cloned().collect()
    }

    /// Payloads appended during `epoch`, oldest first
    pub fn snapshot_epoch(&self, epoch: u64) -> Vec<Arc<Value>> {
        self.snapshot()
            .into_iter()
            .filter(|e| e.epoch == epoch)
            .map(|e| e.payload)
            .collect()
    }

    /// Drop all events and start a new epoch. Returns the new epoch.
    pub fn clear(&self) -> u64 {
        let mut inner = self.lock();
        inner.events.clear();
        inner.epoch += 1;
        self.len_gauge.set(0);
        inner.epoch
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seq(events: &[BufferedEvent]) -> Vec<i64> {
        events
            .iter()
            .map(|e| e.payload["seq"].as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_append_within_capacity() {
        let buffer = EventBuffer::new();
        assert!(buffer.is_empty());

        assert_eq!(buffer.append(json!({"seq": 1})), 1);
        assert_eq!(buffer.append(json!({"seq": 2})), 2);

        assert_eq!(seq(&buffer.snapshot()), vec![1, 2]);
    }

    #[test]
    fn test_capacity_keeps_last_hundred_in_order() {
        let buffer = EventBuffer::new();
        for i in 0..150 {
            buffer.append(json!({"seq": i}));
            assert!(buffer.len() <= BUFFER_CAPACITY);
        }

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 100);
        assert_eq!(seq(&snapshot), (50..150).collect::<Vec<_>>());
    }

    #[test]
    fn test_clear_empties_and_advances_epoch() {
        let buffer = EventBuffer::new();
        buffer.append(json!({"seq": 1}));

        assert_eq!(buffer.clear(), 1);
        assert!(buffer.snapshot().is_empty());
        buffer.append(json!({"seq": 2}));
        assert_eq!(buffer.snapshot()[0].epoch, 1);
        assert_eq!(buffer.clear(), 2);
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let buffer = EventBuffer::new();
        buffer.append(json!({"seq": 1}));

        let snapshot = buffer.snapshot();
        buffer.clear();
        buffer.append(json!({"seq": 2}));

        assert_eq!(seq(&snapshot), vec![1]);
        assert_eq!(seq(&buffer.snapshot()), vec![2]);
    }

    #[test]
    fn test_snapshot_epoch_filters_older_events() {
        let buffer = EventBuffer::with_capacity(10);
        buffer.append(json!({"seq": 1}));
        let epoch = buffer.clear();
        buffer.append(json!({"seq": 2}));

        let current: Vec<_> = buffer
            .snapshot_epoch(epoch)
            .iter()
            .map(|v| v["seq"].as_i64().unwrap())
            .collect();
        assert_eq!(current, vec![2]);
        assert!(buffer.snapshot_epoch(0).is_empty());
    }

    #[test]
    fn test_concurrent_producer_and_readers() {
        let buffer = Arc::new(EventBuffer::new());

        let producer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    buffer.append(json!({"seq": i}));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let s = seq(&buffer.snapshot());
                        assert!(s.len() <= BUFFER_CAPACITY);
                        // Contiguous and ascending: never a torn view
                        assert!(s.windows(2).all(|w| w[1] == w[0] + 1));
                    }
                })
            })
            .collect();

        producer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(buffer.len(), BUFFER_CAPACITY);
    }

    #[test]
    fn test_gauge_matches_length_after_racing_append_and_clear() {
        let gauge = IntGauge::new("test_buffer_len", "test").unwrap();
        let buffer = Arc::new(EventBuffer::with_capacity(10).with_gauge(gauge.clone()));

        let producer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                for i in 0..2000 {
                    buffer.append(json!({"seq": i}));
                }
            })
        };
        let clearer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    buffer.clear();
                }
            })
        };

        producer.join().unwrap();
        clearer.join().unwrap();
        assert_eq!(gauge.get(), buffer.len() as i64);
    }
}
