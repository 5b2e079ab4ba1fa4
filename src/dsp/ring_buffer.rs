//! bounded circular containers backing the measurement windows
//!
//! Two disciplines over the same idea.  [`SlidingWindow`] evicts its oldest
//! element when a push would overflow, which is what the capture buffer
//! wants.  [`BoundedBuffer`] refuses the push instead and leaves eviction to
//! its owner, which is what the energy windows and the correlation window
//! want.  Both allocate their backing storage once, up front, so nothing on
//! the audio path ever grows them.
//!
//! Index 0 is always the oldest retained element.
use std::collections::VecDeque;
use std::ops::Index;

/// circular buffer that drops its oldest element on overflow
pub struct SlidingWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> SlidingWindow<T> {
    pub fn with_capacity(capacity: usize) -> SlidingWindow<T> {
        SlidingWindow {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }
    pub fn clear(&mut self) -> () {
        self.items.clear();
    }
    pub fn iter(&self) -> std::collections::vec_deque::Iter<T> {
        self.items.iter()
    }
    /// push, returning the evicted oldest element if the window was full
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(value);
        }
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(value);
        evicted
    }
}

impl<T> Index<usize> for SlidingWindow<T> {
    type Output = T;
    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

/// circular buffer that refuses pushes at capacity; the owner evicts
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedBuffer<T> {
    pub fn with_capacity(capacity: usize) -> BoundedBuffer<T> {
        BoundedBuffer {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }
    pub fn clear(&mut self) -> () {
        self.items.clear();
    }
    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }
    pub fn iter(&self) -> std::collections::vec_deque::Iter<T> {
        self.items.iter()
    }
    /// push that hands the value back instead of overflowing
    pub fn try_push(&mut self, value: T) -> Result<(), T> {
        if self.items.len() >= self.capacity {
            return Err(value);
        }
        self.items.push_back(value);
        Ok(())
    }
}

impl<T> Index<usize> for BoundedBuffer<T> {
    type Output = T;
    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}
