//! Fixed-capacity ring buffer keeping the last N items of a stream

/// Ring buffer that retains only the most recent `capacity` items pushed
///
/// Used to pull the tail of a history file in a single forward pass without
/// holding the whole file in memory.
#[derive(Debug)]
pub struct TailBuffer<T> {
    /// Ring storage; grows up to `capacity` then wraps
    slots: Vec<T>,
    /// Next write position once the buffer is full
    head: usize,
    capacity: usize,
}

impl<T> TailBuffer<T> {
    /// Create a buffer holding at most `capacity` items
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");
        Self {
            slots: Vec::new(),
            head: 0,
            capacity,
        }
    }

    /// Push an item, evicting the oldest one when full
    pub fn push(&mut self, item: T) {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
        } else {
            self.slots[self.head] = item;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Consume the buffer, yielding items oldest first
    pub fn into_vec(mut self) -> Vec<T> {
        self.slots.rotate_left(self.head);
        self.slots
    }
}

impl<T> Extend<T> for TailBuffer<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}
