// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Stable component storage: fixed-address slots, allocated in chunks,
//! so a pointer handed out by `emplace` stays valid across any number of
//! archetype moves of the owning row, as long as the slot itself is not
//! released.
//!
//! Mirrors the chunk/free-list allocator in the original system's
//! `StableContainer` (`decs::Chunk::Emplace` / `RemoveAt`): each chunk
//! tracks per-slot occupancy, a LIFO free-slot stack, and whether it is
//! currently registered in the owning column's "has space" list.

use crate::type_id::TypeOps;

/// Opaque reference to a stable slot: which chunk, which slot within it,
/// and the slot's address at the time of allocation (stable until the slot
/// is released).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StableSlotRef {
    pub chunk_index: usize,
    pub slot_index: usize,
    pub ptr: *mut u8,
}

struct StableChunk {
    data: Vec<u8>,
    occupied: Vec<bool>,
    free_list: Vec<usize>,
    alloc_high_water: usize,
    size: usize,
    capacity: usize,
    /// Mirrors `currently_in_free_list`: whether this chunk is currently
    /// registered in the owning column's has-space list.
    in_free_space_list: bool,
}

impl StableChunk {
    fn new(capacity: usize, size: usize) -> Self {
        Self {
            data: vec![0u8; capacity * size.max(1)],
            occupied: vec![false; capacity],
            free_list: Vec::new(),
            alloc_high_water: 0,
            size,
            capacity,
            in_free_space_list: true,
        }
    }

    fn is_full(&self) -> bool {
        self.alloc_high_water == self.capacity && self.free_list.is_empty()
    }

    fn is_empty(&self) -> bool {
        self.alloc_high_water == self.free_list.len()
    }

    /// # Safety
    /// `src` must point to a valid element of this chunk's type.
    unsafe fn emplace(&mut self, src: *const u8) -> Option<(usize, *mut u8)> {
        if self.is_full() {
            return None;
        }
        let slot = if let Some(slot) = self.free_list.pop() {
            slot
        } else {
            let slot = self.alloc_high_water;
            self.alloc_high_water += 1;
            slot
        };
        let dst = unsafe { self.data.as_mut_ptr().add(slot * self.size) };
        unsafe {
            std::ptr::copy_nonoverlapping(src, dst, self.size);
        }
        self.occupied[slot] = true;
        Some((slot, dst))
    }

    /// # Safety
    /// `slot` must currently be occupied.
    unsafe fn remove(&mut self, slot: usize, drop_fn: Option<crate::type_id::DropFn>) {
        debug_assert!(self.occupied[slot], "removing an unoccupied stable slot");
        if let Some(drop_fn) = drop_fn {
            unsafe {
                drop_fn(self.data.as_mut_ptr().add(slot * self.size));
            }
        }
        self.occupied[slot] = false;
        if slot + 1 == self.alloc_high_water {
            self.alloc_high_water -= 1;
        } else {
            self.free_list.push(slot);
        }
        if self.is_empty() {
            self.free_list.clear();
            self.alloc_high_water = 0;
        }
    }

    fn ptr(&self, slot: usize) -> *mut u8 {
        (self.data.as_ptr() as *mut u8).wrapping_add(slot * self.size)
    }
}

impl Drop for StableChunk {
    fn drop(&mut self) {
        // Chunks are always released empty via `StableColumn::remove`;
        // nothing to drop for slots still marked occupied would indicate a
        // leak upstream, but we still clean up defensively.
    }
}

/// Column of fixed-address slots for one component type, arranged in
/// chunks of a configurable capacity (default 1000, see §6).
pub struct StableColumn {
    ops: TypeOps,
    chunk_capacity: usize,
    chunks: Vec<Option<StableChunk>>,
    /// Indices (into `chunks`) of chunks with free space, used to satisfy
    /// `emplace` without a linear scan over full chunks.
    has_space: Vec<usize>,
    /// Most recently used chunk with free space, tried first.
    current: Option<usize>,
}

impl StableColumn {
    pub fn new(ops: TypeOps, chunk_capacity: usize) -> Self {
        assert!(chunk_capacity > 0, "stable chunk capacity must be nonzero");
        Self {
            ops,
            chunk_capacity,
            chunks: Vec::new(),
            has_space: Vec::new(),
            current: None,
        }
    }

    pub fn type_ops(&self) -> &TypeOps {
        &self.ops
    }

    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    /// Create an empty column of the same type and chunk size — used when
    /// a new archetype clones the stable columns of a neighboring one.
    pub fn empty_clone(&self) -> Self {
        Self::new(self.ops, self.chunk_capacity)
    }

    fn pick_chunk(&mut self) -> usize {
        if let Some(idx) = self.current {
            if self.chunks[idx].as_ref().is_some_and(|c| !c.is_full()) {
                return idx;
            }
        }
        while let Some(&idx) = self.has_space.last() {
            match &self.chunks[idx] {
                Some(c) if !c.is_full() => {
                    self.current = Some(idx);
                    return idx;
                }
                _ => {
                    self.has_space.pop();
                }
            }
        }
        let idx = self.chunks.len();
        self.chunks
            .push(Some(StableChunk::new(self.chunk_capacity, self.ops.size)));
        self.has_space.push(idx);
        self.current = Some(idx);
        idx
    }

    /// Allocate a slot and move-construct a value into it from `src`.
    ///
    /// # Safety
    /// `src` must point to a valid element of this column's type; the
    /// caller relinquishes ownership of the source bytes.
    pub unsafe fn emplace(&mut self, src: *const u8) -> StableSlotRef {
        let chunk_idx = self.pick_chunk();
        let chunk = self.chunks[chunk_idx].as_mut().unwrap();
        let (slot_idx, ptr) = unsafe { chunk.emplace(src).expect("picked chunk had no space") };
        if chunk.is_full() {
            self.has_space.retain(|&i| i != chunk_idx);
            if self.current == Some(chunk_idx) {
                self.current = None;
            }
        }
        StableSlotRef {
            chunk_index: chunk_idx,
            slot_index: slot_idx,
            ptr,
        }
    }

    /// Destroy the slot at `(chunk_index, slot_index)`. If the chunk
    /// becomes empty it is released (its storage dropped and its position
    /// in `chunks` set to `None`); otherwise it is re-added to the
    /// has-space list.
    pub fn remove(&mut self, chunk_index: usize, slot_index: usize) {
        let was_full;
        {
            let chunk = self.chunks[chunk_index]
                .as_mut()
                .expect("removing from a released chunk");
            was_full = chunk.is_full();
            unsafe {
                chunk.remove(slot_index, self.ops.drop_in_place);
            }
        }
        let chunk = self.chunks[chunk_index].as_ref().unwrap();
        if chunk.is_empty() {
            self.chunks[chunk_index] = None;
            self.has_space.retain(|&i| i != chunk_index);
            if self.current == Some(chunk_index) {
                self.current = None;
            }
        } else if was_full {
            self.has_space.push(chunk_index);
        }
    }

    /// Dereference a live slot reference. Panics if the chunk was released
    /// or the slot is currently free (a stale reference — a correctness
    /// bug upstream, not a recoverable condition).
    pub fn get(&self, slot: StableSlotRef) -> *mut u8 {
        let chunk = self.chunks[slot.chunk_index]
            .as_ref()
            .expect("stable slot reference points to a released chunk");
        debug_assert!(
            chunk.occupied[slot.slot_index],
            "stable slot reference points to a freed slot"
        );
        chunk.ptr(slot.slot_index)
    }

    pub fn clear(&mut self) {
        if let Some(drop_fn) = self.ops.drop_in_place {
            for chunk in self.chunks.iter_mut().flatten() {
                for slot in 0..chunk.capacity {
                    if chunk.occupied[slot] {
                        unsafe {
                            drop_fn(chunk.data.as_mut_ptr().add(slot * chunk.size));
                        }
                    }
                }
            }
        }
        self.chunks.clear();
        self.has_space.clear();
        self.current = None;
    }

    pub fn live_chunk_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }
}

impl Drop for StableColumn {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emplace_and_get_roundtrip() {
        let mut col = StableColumn::new(TypeOps::of::<u32>(), 4);
        let value = 7u32;
        let slot = unsafe { col.emplace(&value as *const u32 as *const u8) };
        let ptr = col.get(slot) as *const u32;
        assert_eq!(unsafe { *ptr }, 7);
    }

    #[test]
    fn slot_address_stable_after_more_allocations() {
        let mut col = StableColumn::new(TypeOps::of::<u32>(), 4);
        let v0 = 1u32;
        let slot0 = unsafe { col.emplace(&v0 as *const u32 as *const u8) };
        let ptr_before = col.get(slot0);
        for i in 1..20u32 {
            unsafe {
                col.emplace(&i as *const u32 as *const u8);
            }
        }
        let ptr_after = col.get(slot0);
        assert_eq!(ptr_before, ptr_after);
    }

    #[test]
    fn empty_chunk_released_on_remove() {
        let mut col = StableColumn::new(TypeOps::of::<u32>(), 2);
        let a = 1u32;
        let b = 2u32;
        let s0 = unsafe { col.emplace(&a as *const u32 as *const u8) };
        let s1 = unsafe { col.emplace(&b as *const u32 as *const u8) };
        assert_eq!(col.live_chunk_count(), 1);
        col.remove(s0.chunk_index, s0.slot_index);
        assert_eq!(col.live_chunk_count(), 1);
        col.remove(s1.chunk_index, s1.slot_index);
        assert_eq!(col.live_chunk_count(), 0);
    }

    #[test]
    fn free_slot_reused_before_bumping_high_water() {
        let mut col = StableColumn::new(TypeOps::of::<u32>(), 4);
        let vals: Vec<u32> = (0..4).collect();
        let slots: Vec<_> = vals
            .iter()
            .map(|v| unsafe { col.emplace(v as *const u32 as *const u8) })
            .collect();
        col.remove(slots[1].chunk_index, slots[1].slot_index);
        let new_val = 99u32;
        let reused = unsafe { col.emplace(&new_val as *const u32 as *const u8) };
        assert_eq!(reused.slot_index, slots[1].slot_index);
    }
}
