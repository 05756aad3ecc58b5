//! Fixed-capacity descriptor pools shared by every resource on a device.

use std::sync::Mutex;

use tracing::warn;

use crate::error::{GpuError, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DescriptorHeapKind {
    ShaderVisible,
    NonShaderVisible,
}

/// One rented descriptor slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorSlot {
    pub heap: DescriptorHeapKind,
    pub index: u32,
}

#[derive(Debug, Default)]
struct PoolState {
    next: u32,
    free: Vec<u32>,
}

/// Hands out slot indices from a fixed-size heap.
///
/// Returned slots are reused before fresh ones. Each slot must be given back
/// exactly once.
#[derive(Debug)]
pub struct DescriptorAllocator {
    heap: DescriptorHeapKind,
    capacity: u32,
    state: Mutex<PoolState>,
}

impl DescriptorAllocator {
    pub fn new(heap: DescriptorHeapKind, capacity: u32) -> Self {
        Self {
            heap,
            capacity,
            state: Mutex::new(PoolState::default()),
        }
    }

    pub fn heap(&self) -> DescriptorHeapKind {
        self.heap
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn rent(&self) -> Result<DescriptorSlot> {
        let mut state = self.lock();
        let index = match state.free.pop() {
            Some(index) => index,
            None if state.next < self.capacity => {
                state.next += 1;
                state.next - 1
            }
            None => {
                warn!(heap = ?self.heap, capacity = self.capacity, "descriptor pool exhausted");
                return Err(GpuError::OutOfDescriptors {
                    capacity: self.capacity,
                });
            }
        };
        Ok(DescriptorSlot {
            heap: self.heap,
            index,
        })
    }

    pub fn give_back(&self, slot: DescriptorSlot) {
        debug_assert_eq!(slot.heap, self.heap, "slot returned to the wrong heap");
        let mut state = self.lock();
        debug_assert!(
            slot.index < state.next && !state.free.contains(&slot.index),
            "descriptor slot {} returned twice",
            slot.index
        );
        state.free.push(slot.index);
    }

    /// Slots currently rented out.
    pub fn in_use(&self) -> u32 {
        let state = self.lock();
        state.next - state.free.len() as u32
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
