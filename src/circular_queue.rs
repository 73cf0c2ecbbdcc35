use std::collections::VecDeque;
use std::fmt;

/// Fixed-capacity FIFO; pushing into a full queue evicts the oldest item.
/// Iteration goes from the newest item to the oldest one.
pub struct CircularQueue<T> {
    deque: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> Clone for CircularQueue<T> {
    fn clone(&self) -> Self {
        Self {
            deque: self.deque.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for CircularQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircularQueue")
            .field("capacity", &self.capacity)
            .field("items", &self.deque)
            .finish()
    }
}

impl<T> CircularQueue<T> {
    #[inline]
    pub fn with_capacity(cap: usize) -> Self {
        let capacity = cap.max(1);

        Self {
            deque: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns the evicted item, if any
    #[inline]
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.deque.pop_back()
        } else {
            None
        };

        self.deque.push_front(item);

        evicted
    }

    #[inline]
    pub fn latest(&self) -> Option<&T> {
        self.deque.front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.deque.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.deque.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.deque.len() == self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn clear(&mut self) {
        self.deque.clear()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &'_ T> {
        self.deque.iter()
    }
}
