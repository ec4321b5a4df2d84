use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{EventSink, EventSinkStream, EventSinkWriter};

struct Inner<T> {
    capacity: Option<usize>,
    is_open: AtomicBool,
    buffer: Mutex<VecDeque<T>>,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // A poisoned buffer only means a writer panicked mid-push; the queue
        // itself is still consistent.
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// An [`EventSink`] and [`EventSinkStream`] that collects events in
/// first-in-first-out order.
///
/// The buffer is unbounded unless created with
/// [`with_capacity`](Self::with_capacity), in which case the oldest events
/// are discarded once the capacity is reached. Note that even if the iterator
/// returns `None`, it may produce more items after the simulation advances.
pub struct EventBuffer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> EventBuffer<T> {
    /// Creates an open, unbounded `EventBuffer`.
    pub fn new() -> Self {
        Self::build(None, true)
    }

    /// Creates a closed, unbounded `EventBuffer`.
    pub fn new_closed() -> Self {
        Self::build(None, false)
    }

    /// Creates an open `EventBuffer` that retains at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(Some(capacity), true)
    }

    fn build(capacity: Option<usize>, is_open: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity,
                is_open: AtomicBool::new(is_open),
                buffer: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Returns the number of events currently buffered.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if no event is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns all buffered events.
    pub fn drain_all(&mut self) -> Vec<T> {
        self.inner.lock().drain(..).collect()
    }
}

impl<T: Send + 'static> EventSink<T> for EventBuffer<T> {
    type Writer = EventBufferWriter<T>;

    fn writer(&self) -> Self::Writer {
        EventBufferWriter {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Iterator for EventBuffer<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.lock().pop_front()
    }
}

impl<T: Send + 'static> EventSinkStream for EventBuffer<T> {
    fn open(&mut self) {
        self.inner.is_open.store(true, Ordering::Relaxed);
    }

    fn close(&mut self) {
        self.inner.is_open.store(false, Ordering::Relaxed);
    }

    fn is_open(&self) -> bool {
        self.inner.is_open.load(Ordering::Relaxed)
    }
}

impl<T> Default for EventBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EventBuffer")
            .field("capacity", &self.inner.capacity)
            .finish_non_exhaustive()
    }
}

/// A writer handle of an `EventBuffer`.
pub struct EventBufferWriter<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for EventBufferWriter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> EventSinkWriter<T> for EventBufferWriter<T> {
    fn write(&self, event: T) {
        if !self.inner.is_open.load(Ordering::Relaxed) {
            return;
        }

        let mut buffer = self.inner.lock();
        if let Some(capacity) = self.inner.capacity {
            if capacity == 0 {
                return;
            }
            if buffer.len() == capacity {
                buffer.pop_front();
            }
        }
        buffer.push_back(event);
    }
}

impl<T> fmt::Debug for EventBufferWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EventBufferWriter").finish_non_exhaustive()
    }
}
