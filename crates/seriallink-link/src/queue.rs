use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{LinkError, Result};

/// A thread-safe FIFO buffer with a fixed capacity.
///
/// When full, new items are refused and the items already queued are kept.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    name: &'static str,
    capacity: usize,
    inner: Mutex<VecDeque<T>>,
}

impl<T> BoundedQueue<T> {
    /// Create an empty queue. `name` identifies the queue in errors and logs.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Append an item unless the queue is full.
    pub fn push(&self, item: T) -> Result<()> {
        let mut items = self.lock();
        if items.len() >= self.capacity {
            return Err(LinkError::BufferFull {
                queue: self.name,
                capacity: self.capacity,
            });
        }
        items.push_back(item);
        Ok(())
    }

    /// Remove and return the oldest item.
    pub fn pop_oldest(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Remove and return the oldest item satisfying `pred`, leaving the
    /// others in place.
    pub fn remove_first(&self, mut pred: impl FnMut(&T) -> bool) -> Option<T> {
        let mut items = self.lock();
        let pos = items.iter().position(|item| pred(item))?;
        items.remove(pos)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Drop every queued item, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.lock();
        let count = items.len();
        items.clear();
        count
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> BoundedQueue<T> {
    /// Copy of the queued items, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().iter().cloned().collect()
    }
}
