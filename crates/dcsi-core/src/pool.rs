// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-capacity slot pool
//!
//! All `N` slots are allocated up front. Callers borrow a slot through a
//! [`Handle`] and give it back with [`Pool::release`]. Handles carry the
//! pool tag and a per-slot generation, so a handle that was already
//! released, or that belongs to another pool, is detected instead of
//! silently aliasing a live slot.
//!
//! ## Layout
//!
//! ```text
//! used:   0b0000_0000_0000_0101   (bit i set = slot i handed out)
//! slots:  [ T, T, T, ... ]        (N <= 16)
//! gens:   [ g, g, g, ... ]        (bumped on every release)
//! ```

use crate::error::{Error, Result};

/// Handle to one slot of a [`Pool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    tag: u8,
    index: u8,
    generation: u16,
}

impl Handle {
    /// Distinguished handle returned when the pool is exhausted
    pub const NIL: Handle = Handle {
        tag: u8::MAX,
        index: u8::MAX,
        generation: u16::MAX,
    };

    /// Check whether this is the nil handle
    pub const fn is_nil(&self) -> bool {
        self.index == u8::MAX
    }

    /// Slot index inside the owning pool
    pub const fn index(&self) -> usize {
        self.index as usize
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::NIL
    }
}

/// Fixed-capacity allocator of `N` zero-initialized `T` slots (`N <= 16`)
pub struct Pool<T: Default, const N: usize> {
    slots: [T; N],
    generations: [u16; N],
    used: u16,
    tag: u8,
}

impl<T: Default, const N: usize> Pool<T, N> {
    const CAPACITY_OK: () = assert!(N > 0 && N <= 16, "pool capacity must be 1..=16");

    /// Create a pool with tag 0
    pub fn new() -> Self {
        Self::with_tag(0)
    }

    /// Create a pool whose handles carry `tag`
    ///
    /// Pools living side by side should use distinct tags.
    pub fn with_tag(tag: u8) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_OK;
        Self {
            slots: core::array::from_fn(|_| T::default()),
            generations: [0; N],
            used: 0,
            tag,
        }
    }

    /// Allocate the lowest-indexed free slot
    ///
    /// Returns [`Handle::NIL`] when all slots are in use.
    pub fn allocate(&mut self) -> Handle {
        let free = !self.used & Self::full_mask();
        if free == 0 {
            return Handle::NIL;
        }

        let index = free.trailing_zeros() as usize;
        self.used |= 1 << index;
        log::trace!("pool[{}] allocated slot {}", self.tag, index);

        Handle {
            tag: self.tag,
            index: index as u8,
            generation: self.generations[index],
        }
    }

    /// Zero a slot and return it to the free set
    ///
    /// Releasing a nil, stale or foreign handle is a logged no-op.
    pub fn release(&mut self, handle: Handle) -> Result<()> {
        let index = match self.validate(handle) {
            Some(index) => index,
            None => {
                log::error!(
                    "pool[{}]: handle {:?} does not exist in the pool",
                    self.tag,
                    handle
                );
                return Err(Error::InvalidHandle);
            }
        };

        self.slots[index] = T::default();
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.used &= !(1 << index);
        log::trace!("pool[{}] released slot {}", self.tag, index);
        Ok(())
    }

    /// Check whether `handle` is the allocation-failure sentinel
    pub const fn is_nil(&self, handle: Handle) -> bool {
        handle.is_nil()
    }

    /// Borrow the slot behind a live handle
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.validate(handle).map(|i| &self.slots[i])
    }

    /// Mutably borrow the slot behind a live handle
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.validate(handle).map(move |i| &mut self.slots[i])
    }

    /// Number of slots currently handed out
    pub const fn in_use(&self) -> usize {
        self.used.count_ones() as usize
    }

    /// Number of free slots
    pub const fn available(&self) -> usize {
        N - self.in_use()
    }

    /// Total number of slots
    pub const fn capacity(&self) -> usize {
        N
    }

    fn validate(&self, handle: Handle) -> Option<usize> {
        if handle.is_nil() || handle.tag != self.tag {
            return None;
        }
        let index = handle.index as usize;
        if index >= N || self.used & (1 << index) == 0 {
            return None;
        }
        (self.generations[index] == handle.generation).then_some(index)
    }

    const fn full_mask() -> u16 {
        u16::MAX >> (16 - N)
    }
}

impl<T: Default, const N: usize> Default for Pool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
