//! The bounded MPMC event queue with flood-spill (`spec.md` §4.7).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::warn;

use crate::event::Event;

/// Configuration for the queue's flood-spill policy (`spec.md` §4.7, §4.10).
#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub capacity: usize,
    pub flood_file: PathBuf,
    pub flood_attempts: u32,
    pub flood_sleep: Duration,
}

/// Bounded multi-producer multi-consumer queue of events.
///
/// Backed by `flume`'s bounded channel, which is internally synchronized
/// and safe to clone across producer/consumer threads (`spec.md` §5:
/// "Event queue: shared MPMC, internally synchronized").
pub struct EventQueue {
    sender: flume::Sender<Event>,
    receiver: flume::Receiver<Event>,
    config: QueueConfig,
    flood_file_lock: Mutex<()>,
    flooded: AtomicU64,
}

impl EventQueue {
    pub fn new(config: QueueConfig) -> Self {
        let (sender, receiver) = flume::bounded(config.capacity);
        Self {
            sender,
            receiver,
            config,
            flood_file_lock: Mutex::new(()),
            flooded: AtomicU64::new(0),
        }
    }

    /// Number of events that have been spilled to the flood file so far.
    pub fn flooded_count(&self) -> u64 {
        self.flooded.load(Ordering::Relaxed)
    }

    /// Attempt a non-blocking push; never spills to the flood file.
    pub fn try_push(&self, event: Event) -> Result<(), Event> {
        self.sender.try_send(event).map_err(|e| e.into_inner())
    }

    /// Push an event, retrying up to `flood_attempts` times with
    /// `flood_sleep` between tries; on exhaustion, spill to the flood file
    /// and drop the event (`spec.md` §4.7, §9 "Backpressure").
    pub fn push(&self, event: Event) {
        #[cfg(feature = "metrics")]
        metrics::counter!("eventcascade_queue_pushed_total").increment(1);

        let mut remaining = event;
        for _ in 0..self.config.flood_attempts {
            match self.sender.try_send(remaining) {
                Ok(()) => {
                    #[cfg(feature = "metrics")]
                    metrics::gauge!("eventcascade_queue_depth").set(self.depth() as f64);
                    return;
                }
                Err(flume::TrySendError::Full(returned)) => {
                    remaining = returned;
                    std::thread::sleep(self.config.flood_sleep);
                }
                Err(flume::TrySendError::Disconnected(_)) => return,
            }
        }
        self.spill(&remaining);
    }

    /// Blocking pop, used by router workers.
    pub fn pop(&self) -> Option<Event> {
        self.receiver.recv().ok()
    }

    /// Blocking pop bounded by `timeout`; used by the router's worker loop
    /// so it can periodically check for a stop request without leaving
    /// the queue (`spec.md` §5, "Cancellation").
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Event> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Current occupied depth, for metrics scopes (`spec.md` §4.7).
    pub fn depth(&self) -> usize {
        self.receiver.len()
    }

    fn spill(&self, event: &Event) {
        self.flooded.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::counter!("eventcascade_queue_flooded_total").increment(1);
        warn!(flood_file = %self.config.flood_file.display(), "event queue flooded; spilling event");
        let _guard = self.flood_file_lock.lock();
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.flood_file)
            .and_then(|mut file| {
                let line = serde_json::to_string(&event.to_value()).unwrap_or_default();
                writeln!(file, "{line}")
            });
        if let Err(e) = result {
            warn!(error = %e, "failed to append spilled event to flood file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::BufRead;

    fn config(capacity: usize, flood_file: PathBuf) -> QueueConfig {
        QueueConfig {
            capacity,
            flood_file,
            flood_attempts: 2,
            flood_sleep: Duration::from_millis(1),
        }
    }

    #[test]
    fn push_and_pop_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let queue = EventQueue::new(config(4, dir.path().join("flood.jsonl")));
        queue.push(Event::new(json!({"a": 1})));
        let popped = queue.pop().unwrap();
        assert_eq!(popped.to_value(), json!({"a": 1}));
    }

    #[test]
    fn overflow_spills_to_the_flood_file() {
        let dir = tempfile::tempdir().unwrap();
        let flood_path = dir.path().join("flood.jsonl");
        let queue = EventQueue::new(config(1, flood_path.clone()));
        queue.push(Event::new(json!({"a": 1})));
        queue.push(Event::new(json!({"a": 2})));
        assert_eq!(queue.flooded_count(), 1);
        let file = std::fs::File::open(&flood_path).unwrap();
        let lines: Vec<_> = std::io::BufReader::new(file).lines().collect::<Result<_, _>>().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("\"a\":2"));
    }

    #[test]
    fn try_push_never_spills() {
        let dir = tempfile::tempdir().unwrap();
        let queue = EventQueue::new(config(1, dir.path().join("flood.jsonl")));
        queue.try_push(Event::new(json!({"a": 1}))).unwrap();
        assert!(queue.try_push(Event::new(json!({"a": 2}))).is_err());
        assert_eq!(queue.flooded_count(), 0);
    }
}
