// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-capacity circular FIFO
//!
//! One of the `N` cells is kept free so that `head == tail` always means
//! empty; the queue therefore holds at most `N - 1` elements. Elements are
//! small `Copy` values (pool handles in practice), never the messages
//! themselves.

use crate::error::{Error, Result};

/// Circular FIFO with `N - 1` usable cells
#[derive(Debug)]
pub struct Queue<T: Copy + Default, const N: usize> {
    cells: [T; N],
    head: usize,
    tail: usize,
}

impl<T: Copy + Default, const N: usize> Queue<T, N> {
    const CAPACITY_OK: () = assert!(N >= 2, "queue needs at least two cells");

    /// Create an empty queue
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_OK;
        Self {
            cells: [T::default(); N],
            head: 0,
            tail: 0,
        }
    }

    /// Check if the queue is empty
    pub const fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Check if the queue is full
    pub const fn is_full(&self) -> bool {
        (self.tail + 1) % N == self.head
    }

    /// Append an element at the tail
    ///
    /// On a full queue the element is dropped and `Error::QueueFull` is
    /// returned; the caller owns whatever the element refers to.
    pub fn push(&mut self, element: T) -> Result<()> {
        if self.is_full() {
            log::error!("Queue is full. Element hasn't been queued");
            return Err(Error::QueueFull);
        }
        self.cells[self.tail] = element;
        self.tail = (self.tail + 1) % N;
        Ok(())
    }

    /// Remove the element at the head
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            log::warn!("Queue is empty. Nothing to pop");
            return None;
        }
        let element = self.cells[self.head];
        self.cells[self.head] = T::default();
        self.head = (self.head + 1) % N;
        Some(element)
    }

    /// Look at the element at the head without removing it
    pub fn peek(&self) -> Option<T> {
        if self.is_empty() {
            log::warn!("Queue is empty. Nothing to peek");
            return None;
        }
        Some(self.cells[self.head])
    }

    /// Drop all elements
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    /// Number of queued elements
    pub const fn size(&self) -> usize {
        (self.tail + N - self.head) % N
    }

    /// Number of elements the queue can hold
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Iterate from head to tail
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.size()).map(move |i| &self.cells[(self.head + i) % N])
    }
}

impl<T: Copy + Default, const N: usize> Default for Queue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_queue() {
        let mut q: Queue<u8, 4> = Queue::new();

        assert!(q.is_empty());
        assert!(!q.is_full());
        assert_eq!(q.size(), 0);
        assert_eq!(q.capacity(), 3);
        assert_eq!(q.pop(), None);
        assert_eq!(q.peek(), None);
    }

    #[test]
    fn test_fifo_order() {
        let mut q: Queue<u8, 4> = Queue::new();

        q.push(1).unwrap();
        q.push(2).unwrap();
        assert_eq!(q.peek(), Some(1));
        assert_eq!(q.pop(), Some(1));

        q.push(3).unwrap();
        q.push(4).unwrap();
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.pop(), Some(4));
        assert!(q.is_empty());
    }

    #[test]
    fn test_push_on_full_rejected() {
        let mut q: Queue<u8, 4> = Queue::new();

        for i in 0..3 {
            q.push(i).unwrap();
        }
        assert!(q.is_full());

        assert_eq!(q.push(99), Err(Error::QueueFull));
        assert_eq!(q.size(), 3);
        assert_eq!(q.iter().copied().collect::<heapless::Vec<u8, 4>>(), [0, 1, 2]);
    }

    #[test]
    fn test_size_after_pushes_and_pops() {
        let mut q: Queue<u16, 10> = Queue::new();
        let mut rng = fastrand::Rng::with_seed(7);

        for _ in 0..50 {
            q.clear();
            let k = rng.usize(0..=9);
            let j = rng.usize(0..=k);
            for i in 0..k {
                q.push(i as u16).unwrap();
            }
            for _ in 0..j {
                q.pop().unwrap();
            }
            assert_eq!(q.size(), k - j);
        }
    }

    #[test]
    fn test_wraparound() {
        let mut q: Queue<u32, 3> = Queue::new();

        for round in 0..10u32 {
            q.push(round).unwrap();
            q.push(round + 100).unwrap();
            assert!(q.is_full());
            assert_eq!(q.pop(), Some(round));
            assert_eq!(q.pop(), Some(round + 100));
        }
        assert!(q.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut q: Queue<u8, 4> = Queue::new();
        q.push(1).unwrap();
        q.push(2).unwrap();

        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.size(), 0);
        q.push(3).unwrap();
        assert_eq!(q.pop(), Some(3));
    }
}
