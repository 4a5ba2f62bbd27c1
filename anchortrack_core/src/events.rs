//! Thread-safe event handoff from service callbacks to the main tick.
//!
//! The anchoring service raises its events on whatever worker thread
//! happens to finish a detection; the engine consumes them on the single
//! main/render thread. A lock-free queue bridges the two: producers push
//! from any thread without blocking, the consumer drains everything once
//! per tick in FIFO order.
//!
//! The queue is unbounded. That is acceptable only because the consumer
//! tick runs every frame - a stalled consumer would grow the queue without
//! limit. This is a documented liveness assumption, not an enforced cap:
//! dropping events silently would be worse than growing.

use anchortrack_env::ObjectEventArgs;
use crossbeam::queue::SegQueue;
use std::sync::Arc;

/// One event from the spatial-anchoring service.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingEvent {
    /// A detection batch was submitted. Diagnostic marker, no payload.
    DetectionAttempted,

    /// A new object instance was found for the first time.
    Added(ObjectEventArgs),

    /// State of a tracked instance changed.
    Updated(ObjectEventArgs),

    /// An instance lost tracking.
    Removed(ObjectEventArgs),
}

/// Multi-producer single-consumer queue for [`TrackingEvent`]s.
///
/// `push` may be called concurrently from any number of threads and never
/// blocks or fails; `drain` is called exactly once per tick from the
/// consumer thread and returns everything enqueued since the last drain,
/// in arrival order.
#[derive(Debug, Default)]
pub struct EventQueue {
    inner: SegQueue<TrackingEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }

    /// Enqueues an event. Callable from any thread.
    pub fn push(&self, event: TrackingEvent) {
        self.inner.push(event);
    }

    /// Removes and returns all pending events in FIFO order.
    pub fn drain(&self) -> Vec<TrackingEvent> {
        let mut events = Vec::with_capacity(self.inner.len());
        while let Some(event) = self.inner.pop() {
            events.push(event);
        }
        events
    }

    /// Number of events currently buffered.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Cloneable producer handle handed to service callbacks.
#[derive(Debug, Clone)]
pub struct EventSender {
    queue: Arc<EventQueue>,
}

impl EventSender {
    pub fn new(queue: Arc<EventQueue>) -> Self {
        Self { queue }
    }

    /// Enqueues an event from a producer thread.
    pub fn send(&self, event: TrackingEvent) {
        self.queue.push(event);
    }
}
