//! Allocator capability for device-resident buffers.
//!
//! The device backend requests every scratch and output buffer through an
//! [`Allocator`] handle passed in at construction time. The manager makes no
//! assumption about the allocation strategy; it only relies on `free` being
//! called once per successful `allocate`, after the work using the buffer has
//! completed.

use std::mem::size_of;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{CoordinateError, Result};

/// Opaque handle for one allocation.
#[derive(Debug, PartialEq, Eq)]
pub struct Allocation {
    id: u64,
    bytes: usize,
}

impl Allocation {
    pub fn new(id: u64, bytes: usize) -> Self {
        Self { id, bytes }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

/// Memory allocation capability.
pub trait Allocator: Send + Sync {
    /// Reserve `bytes` bytes.
    fn allocate(&self, bytes: usize) -> Result<Allocation>;

    /// Release an allocation returned by [`Allocator::allocate`].
    fn free(&self, allocation: Allocation);
}

impl<A: Allocator + ?Sized> Allocator for Arc<A> {
    fn allocate(&self, bytes: usize) -> Result<Allocation> {
        (**self).allocate(bytes)
    }

    fn free(&self, allocation: Allocation) {
        (**self).free(allocation)
    }
}

impl<A: Allocator + ?Sized> Allocator for &A {
    fn allocate(&self, bytes: usize) -> Result<Allocation> {
        (**self).allocate(bytes)
    }

    fn free(&self, allocation: Allocation) {
        (**self).free(allocation)
    }
}

/// Unbounded allocator that only keeps bookkeeping.
#[derive(Debug, Default)]
pub struct HostAllocator {
    next_id: AtomicU64,
    live_bytes: AtomicUsize,
}

impl HostAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently allocated and not yet freed.
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Acquire)
    }
}

impl Allocator for HostAllocator {
    fn allocate(&self, bytes: usize) -> Result<Allocation> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_add(bytes, Ordering::AcqRel);
        Ok(Allocation::new(id, bytes))
    }

    fn free(&self, allocation: Allocation) {
        self.live_bytes.fetch_sub(allocation.bytes, Ordering::AcqRel);
    }
}

#[derive(Debug, Default)]
struct BudgetState {
    next_id: u64,
    live_bytes: usize,
    peak_bytes: usize,
    allocations: usize,
}

/// Allocator with a fixed byte budget, modelling a bounded device pool.
#[derive(Debug)]
pub struct BudgetAllocator {
    budget: usize,
    state: Mutex<BudgetState>,
}

impl BudgetAllocator {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            state: Mutex::new(BudgetState::default()),
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn live_bytes(&self) -> usize {
        self.state.lock().live_bytes
    }

    /// Highest simultaneous usage observed.
    pub fn peak_bytes(&self) -> usize {
        self.state.lock().peak_bytes
    }

    /// Number of successful allocations so far.
    pub fn allocations(&self) -> usize {
        self.state.lock().allocations
    }
}

impl Allocator for BudgetAllocator {
    fn allocate(&self, bytes: usize) -> Result<Allocation> {
        let mut state = self.state.lock();
        let available = self.budget - state.live_bytes;
        if bytes > available {
            return Err(CoordinateError::AllocationFailure {
                requested: bytes,
                available,
            });
        }
        state.live_bytes += bytes;
        state.peak_bytes = state.peak_bytes.max(state.live_bytes);
        state.allocations += 1;
        let id = state.next_id;
        state.next_id += 1;
        Ok(Allocation::new(id, bytes))
    }

    fn free(&self, allocation: Allocation) {
        let mut state = self.state.lock();
        state.live_bytes = state.live_bytes.saturating_sub(allocation.bytes);
    }
}

/// Typed buffer whose memory is accounted through an [`Allocator`].
///
/// The allocation is released when the buffer is dropped.
pub struct DeviceVec<'a, T, A: Allocator + ?Sized> {
    data: Vec<T>,
    allocation: Option<Allocation>,
    allocator: &'a A,
}

impl<'a, T, A: Allocator + ?Sized> DeviceVec<'a, T, A> {
    /// Allocate a buffer of `len` copies of `value`.
    pub fn filled(allocator: &'a A, len: usize, value: T) -> Result<Self>
    where
        T: Clone,
    {
        let allocation = allocator.allocate(len * size_of::<T>())?;
        Ok(Self {
            data: vec![value; len],
            allocation: Some(allocation),
            allocator,
        })
    }

    /// Account an already-built vector (an upload of host data).
    pub fn from_vec(allocator: &'a A, data: Vec<T>) -> Result<Self> {
        let allocation = allocator.allocate(data.len() * size_of::<T>())?;
        Ok(Self {
            data,
            allocation: Some(allocation),
            allocator,
        })
    }

    /// Copy the contents back to host memory, releasing the allocation.
    pub fn into_host(mut self) -> Vec<T> {
        std::mem::take(&mut self.data)
    }
}

impl<T, A: Allocator + ?Sized> Deref for DeviceVec<'_, T, A> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T, A: Allocator + ?Sized> DerefMut for DeviceVec<'_, T, A> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T, A: Allocator + ?Sized> Drop for DeviceVec<'_, T, A> {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.allocator.free(allocation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_allocator_tracks_live_bytes() {
        let allocator = HostAllocator::new();
        let a = allocator.allocate(128).unwrap();
        let b = allocator.allocate(64).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(allocator.live_bytes(), 192);
        allocator.free(a);
        allocator.free(b);
        assert_eq!(allocator.live_bytes(), 0);
    }

    #[test]
    fn test_budget_allocator_refuses_over_budget() {
        let allocator = BudgetAllocator::new(100);
        let a = allocator.allocate(60).unwrap();
        let err = allocator.allocate(50).unwrap_err();
        assert_eq!(
            err,
            CoordinateError::AllocationFailure {
                requested: 50,
                available: 40
            }
        );
        allocator.free(a);
        assert!(allocator.allocate(100).is_ok());
        assert_eq!(allocator.peak_bytes(), 100);
    }

    #[test]
    fn test_device_vec_frees_on_drop() {
        let allocator = BudgetAllocator::new(1024);
        {
            let mut buffer = DeviceVec::filled(&allocator, 16, 0u32).unwrap();
            buffer[3] = 7;
            assert_eq!(buffer.len(), 16);
            assert_eq!(allocator.live_bytes(), 64);
        }
        assert_eq!(allocator.live_bytes(), 0);

        let buffer = DeviceVec::from_vec(&allocator, vec![1u64, 2, 3]).unwrap();
        assert_eq!(allocator.live_bytes(), 24);
        assert_eq!(buffer.into_host(), vec![1, 2, 3]);
        assert_eq!(allocator.live_bytes(), 0);
    }
}
