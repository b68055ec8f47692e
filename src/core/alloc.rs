//! Allocation contract for heap envelopes.
//!
//! The engine does not own a heap. It asks a [`MsgAllocator`] for room
//! before creating a user envelope and gives the room back when that
//! envelope is dropped. Hosts with a fixed message budget plug in a bounded
//! allocator; everyone else uses [`SystemAllocator`].

use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// The allocator refused a request.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("allocator refused {size} bytes ({outstanding} allocations outstanding)")]
pub struct AllocError {
    pub size: usize,
    pub outstanding: usize,
}

/// Allocate/release contract used for user envelopes.
///
/// Both calls may come from any execution context.
pub trait MsgAllocator: Send + Sync {
    /// Reserve room for one envelope of `size` bytes.
    fn allocate(&self, size: usize) -> Result<(), AllocError>;

    /// Give back a reservation previously granted by `allocate`.
    fn release(&self, size: usize);
}

/// Allocator that always succeeds and keeps no books.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl MsgAllocator for SystemAllocator {
    fn allocate(&self, _size: usize) -> Result<(), AllocError> {
        Ok(())
    }

    fn release(&self, _size: usize) {}
}

/// Counting allocator with a fixed number of envelope slots.
///
/// # Example
///
/// ```rust
/// use hsm_dispatch::core::{BoundedAllocator, MsgAllocator};
///
/// let heap = BoundedAllocator::new(1);
/// assert!(heap.allocate(16).is_ok());
/// assert!(heap.allocate(16).is_err());
/// heap.release(16);
/// assert_eq!(heap.outstanding(), 0);
/// ```
#[derive(Debug)]
pub struct BoundedAllocator {
    capacity: usize,
    outstanding: AtomicUsize,
    allocations: AtomicUsize,
    releases: AtomicUsize,
}

impl BoundedAllocator {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            outstanding: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    /// Effectively unbounded, for instrumentation only.
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Envelopes currently alive.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Successful `allocate` calls so far.
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Acquire)
    }

    /// `release` calls so far.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::Acquire)
    }
}

impl MsgAllocator for BoundedAllocator {
    fn allocate(&self, size: usize) -> Result<(), AllocError> {
        self.outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .map_err(|outstanding| AllocError { size, outstanding })?;
        self.allocations.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn release(&self, _size: usize) {
        // Saturate so a stray release cannot wrap the counter.
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        self.releases.fetch_add(1, Ordering::AcqRel);
    }
}
