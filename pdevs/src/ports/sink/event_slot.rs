use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{EventSink, EventSinkStream, EventSinkWriter};

struct Inner<T> {
    is_open: AtomicBool,
    slot: Mutex<Option<T>>,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// An [`EventSink`] and [`EventSinkStream`] that only keeps the last event.
///
/// Once the value is read, the iterator returns `None` until a new value is
/// received. A value that was not read is overwritten by the next one.
pub struct EventSlot<T> {
    inner: Arc<Inner<T>>,
}

impl<T> EventSlot<T> {
    /// Creates an open `EventSlot`.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Creates a closed `EventSlot`.
    pub fn new_closed() -> Self {
        Self::build(false)
    }

    fn build(is_open: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                is_open: AtomicBool::new(is_open),
                slot: Mutex::new(None),
            }),
        }
    }
}

impl<T: Clone> EventSlot<T> {
    /// Returns a copy of the last event without consuming it.
    pub fn peek(&self) -> Option<T> {
        self.inner.lock().clone()
    }
}

impl<T: Send + 'static> EventSink<T> for EventSlot<T> {
    type Writer = EventSlotWriter<T>;

    fn writer(&self) -> EventSlotWriter<T> {
        EventSlotWriter {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Iterator for EventSlot<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.lock().take()
    }
}

impl<T: Send + 'static> EventSinkStream for EventSlot<T> {
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

impl<T> Default for EventSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EventSlot").finish_non_exhaustive()
    }
}

/// A writer handle of an `EventSlot`.
pub struct EventSlotWriter<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for EventSlotWriter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> EventSinkWriter<T> for EventSlotWriter<T> {
    fn write(&self, event: T) {
        if !self.inner.is_open.load(Ordering::Relaxed) {
            return;
        }

        *self.inner.lock() = Some(event);
    }
}

impl<T> fmt::Debug for EventSlotWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EventSlotWriter").finish_non_exhaustive()
    }
}
