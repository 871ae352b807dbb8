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

//! Type-erased, contiguous, packed column storage: one per component type
//! per archetype. All mutation assumes caller-validated indices (see
//! contract table in the component design notes) — out-of-range access is
//! a caller bug, not a recoverable error.

use crate::type_id::TypeOps;

/// A contiguous, type-erased array of equal-sized elements.
///
/// For non-stable component types the element *is* the component. For
/// stable types the element is a `StableSlotRef` (see `stable.rs`) — from
/// this type's point of view the two cases are identical since both are
/// just fixed-size byte records with move/drop operations.
pub struct PackedColumn {
    ops: TypeOps,
    data: Vec<u8>,
    len: usize,
}

impl PackedColumn {
    /// Create an empty column for the type described by `ops`.
    pub fn new(ops: TypeOps) -> Self {
        Self {
            ops,
            data: Vec::new(),
            len: 0,
        }
    }

    pub fn type_ops(&self) -> &TypeOps {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn item_size(&self) -> usize {
        self.ops.size
    }

    /// Capacity ≥ `n` elements. Never moves existing rows (the column's own
    /// `Vec<u8>` may reallocate, but the elements it holds and their
    /// relative order are unchanged).
    pub fn reserve(&mut self, n: usize) {
        let needed = n.saturating_sub(self.len);
        self.data.reserve(needed * self.ops.size.max(1));
    }

    #[inline]
    fn byte_offset(&self, index: usize) -> usize {
        index * self.ops.size
    }

    /// Raw pointer to element `index`. Valid only while no structural
    /// mutation of this column occurs afterward.
    ///
    /// # Safety
    /// `index` must be `< len()`.
    pub unsafe fn get_ptr(&self, index: usize) -> *const u8 {
        unsafe { self.data.as_ptr().add(self.byte_offset(index)) }
    }

    /// Mutable raw pointer to element `index`.
    ///
    /// # Safety
    /// `index` must be `< len()`.
    pub unsafe fn get_ptr_mut(&mut self, index: usize) -> *mut u8 {
        let offset = self.byte_offset(index);
        unsafe { self.data.as_mut_ptr().add(offset) }
    }

    /// Append a move-constructed element read from `src`. Returns the new
    /// length minus one (the appended row's index).
    ///
    /// # Safety
    /// `src` must point to a valid, properly-aligned element of this
    /// column's type; the caller gives up ownership of it (the source is
    /// logically moved-from and must not be dropped again).
    pub unsafe fn push_from(&mut self, src: *const u8) -> usize {
        let size = self.ops.size;
        let old_len = self.data.len();
        self.data.resize(old_len + size, 0);
        unsafe {
            std::ptr::copy_nonoverlapping(src, self.data.as_mut_ptr().add(old_len), size);
        }
        self.len += 1;
        self.len - 1
    }

    /// Swap-remove element `i`. If `i` is not the last element, the last
    /// element is moved into `i`'s slot; its new address equals the old
    /// address of `i`. The element that was at `i` is dropped.
    ///
    /// # Safety
    /// `i` must be `< len()`.
    pub unsafe fn swap_remove(&mut self, i: usize) {
        let size = self.ops.size;
        let last = self.len - 1;
        unsafe {
            let target = self.data.as_mut_ptr().add(i * size);
            if let Some(drop_fn) = self.ops.drop_in_place {
                drop_fn(target);
            }
            if i != last {
                let src = self.data.as_ptr().add(last * size);
                std::ptr::copy_nonoverlapping(src, target, size);
            }
        }
        self.data.truncate(last * size);
        self.len -= 1;
    }

    /// Swap-remove element `i` without invoking its drop function — the
    /// caller has already logically moved the value elsewhere (or dropped
    /// it explicitly via [`Self::drop_at`]) and is only asking to shrink
    /// the backing storage.
    ///
    /// # Safety
    /// `i` must be `< len()`, and the value that was at `i` must not be
    /// accessed again through this column.
    pub unsafe fn forget_swap_remove(&mut self, i: usize) {
        let size = self.ops.size;
        let last = self.len - 1;
        unsafe {
            if i != last {
                let src = self.data.as_ptr().add(last * size);
                let target = self.data.as_mut_ptr().add(i * size);
                std::ptr::copy_nonoverlapping(src, target, size);
            }
        }
        self.data.truncate(last * size);
        self.len -= 1;
    }

    /// Drop the element at `i` in place without shrinking the column. Used
    /// when a row is moving to an archetype that no longer carries this
    /// type: the value must be destroyed before the row's other columns are
    /// shrunk out from under it via [`Self::forget_swap_remove`].
    ///
    /// # Safety
    /// `i` must be `< len()` and must not be dropped or accessed again.
    pub unsafe fn drop_at(&self, i: usize) {
        if let Some(drop_fn) = self.ops.drop_in_place {
            unsafe {
                drop_fn(self.get_ptr(i) as *mut u8);
            }
        }
    }

    /// Drop and remove the last element.
    ///
    /// # Safety
    /// The column must be non-empty.
    pub unsafe fn pop_back(&mut self) {
        let size = self.ops.size;
        let last = self.len - 1;
        unsafe {
            let target = self.data.as_mut_ptr().add(last * size);
            if let Some(drop_fn) = self.ops.drop_in_place {
                drop_fn(target);
            }
        }
        self.data.truncate(last * size);
        self.len -= 1;
    }

    /// Drop every element and reset to empty.
    pub fn clear(&mut self) {
        if let Some(drop_fn) = self.ops.drop_in_place {
            let size = self.ops.size;
            for i in 0..self.len {
                unsafe {
                    drop_fn(self.data.as_mut_ptr().add(i * size));
                }
            }
        }
        self.data.clear();
        self.len = 0;
    }

    pub fn shrink_to_fit(&mut self) {
        self.data.shrink_to_fit();
    }

    /// Load factor in `[0.0, 1.0]`, used by the graph's shrink sweep.
    pub fn load_factor(&self) -> f32 {
        let cap_elems = if self.ops.size == 0 {
            return 1.0;
        } else {
            self.data.capacity() / self.ops.size
        };
        if cap_elems == 0 {
            1.0
        } else {
            self.len as f32 / cap_elems as f32
        }
    }

    /// Create a new, empty column of the same element type — used when a
    /// new archetype clones the columns of a neighboring one.
    pub fn empty_clone(&self) -> Self {
        Self::new(self.ops)
    }

    pub fn get<T: 'static>(&self, index: usize) -> Option<&T> {
        if index >= self.len || std::any::TypeId::of::<T>() != self.ops.type_id {
            return None;
        }
        Some(unsafe { &*(self.get_ptr(index) as *const T) })
    }

    pub fn get_mut<T: 'static>(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len || std::any::TypeId::of::<T>() != self.ops.type_id {
            return None;
        }
        Some(unsafe { &mut *(self.get_ptr_mut(index) as *mut T) })
    }
}

impl Drop for PackedColumn {
    fn drop(&mut self) {
        self.clear();
    }
}
