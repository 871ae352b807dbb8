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

//! A single archetype: columnar storage for every entity that carries an
//! exact, sorted set of component types, plus the single-type add/remove
//! edges that let the graph walk between archetypes in O(1).

use std::any::TypeId;

use rustc_hash::FxHashMap;

use crate::column::PackedColumn;
use crate::entity::EntityId;
use crate::stable::{StableColumn, StableSlotRef};

/// One archetype's columnar storage. `type_ids` and `columns` are parallel
/// and kept sorted by `type_ids`; `stable[i]` records whether `columns[i]`
/// holds the component directly or a [`StableSlotRef`] indirecting into a
/// shared stable column.
pub struct Archetype {
    type_ids: Vec<TypeId>,
    stable: Vec<bool>,
    columns: Vec<PackedColumn>,
    entities: Vec<EntityId>,
    add_edges: FxHashMap<TypeId, usize>,
    remove_edges: FxHashMap<TypeId, usize>,
}

impl Archetype {
    pub fn new(type_ids: Vec<TypeId>, stable: Vec<bool>, columns: Vec<PackedColumn>) -> Self {
        debug_assert_eq!(type_ids.len(), stable.len());
        debug_assert_eq!(type_ids.len(), columns.len());
        Self {
            type_ids,
            stable,
            columns,
            entities: Vec::new(),
            add_edges: FxHashMap::default(),
            remove_edges: FxHashMap::default(),
        }
    }

    /// An archetype with no components — the one every entity starts in.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }

    pub fn type_ids(&self) -> &[TypeId] {
        &self.type_ids
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn has(&self, type_id: TypeId) -> bool {
        self.position(type_id).is_some()
    }

    pub fn position(&self, type_id: TypeId) -> Option<usize> {
        self.type_ids.iter().position(|&t| t == type_id)
    }

    pub fn is_stable_column(&self, index: usize) -> bool {
        self.stable[index]
    }

    pub fn entity_at(&self, row: usize) -> EntityId {
        self.entities[row]
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn column(&self, type_id: TypeId) -> Option<&PackedColumn> {
        self.position(type_id).map(|i| &self.columns[i])
    }

    pub fn column_mut(&mut self, type_id: TypeId) -> Option<&mut PackedColumn> {
        let i = self.position(type_id)?;
        Some(&mut self.columns[i])
    }

    pub fn column_at(&self, index: usize) -> &PackedColumn {
        &self.columns[index]
    }

    pub fn add_edge(&self, type_id: TypeId) -> Option<usize> {
        self.add_edges.get(&type_id).copied()
    }

    pub fn remove_edge(&self, type_id: TypeId) -> Option<usize> {
        self.remove_edges.get(&type_id).copied()
    }

    pub fn set_add_edge(&mut self, type_id: TypeId, archetype_id: usize) {
        self.add_edges.insert(type_id, archetype_id);
    }

    pub fn set_remove_edge(&mut self, type_id: TypeId, archetype_id: usize) {
        self.remove_edges.insert(type_id, archetype_id);
    }

    /// Reserve room for `additional` more rows in every column.
    pub fn reserve(&mut self, additional: usize) {
        self.entities.reserve(additional);
        let target = self.entities.len() + additional;
        for col in &mut self.columns {
            col.reserve(target);
        }
    }

    pub fn shrink_to_fit(&mut self) {
        self.entities.shrink_to_fit();
        for col in &mut self.columns {
            col.shrink_to_fit();
        }
    }

    /// Average load factor across columns, used by the graph's shrink
    /// sweep to decide whether an archetype is worth compacting. An
    /// archetype with no columns (the empty archetype) is always "full".
    pub fn load_factor(&self) -> f32 {
        if self.columns.is_empty() {
            return 1.0;
        }
        self.columns.iter().map(PackedColumn::load_factor).sum::<f32>() / self.columns.len() as f32
    }

    /// Append a brand-new row for `entity`. `values[i]` must point to a
    /// valid, properly-aligned component for `self.type_ids[i]` — for a
    /// stable column the pointer is the component itself (not a
    /// [`StableSlotRef`]); this method performs the `emplace` into the
    /// shared stable column and stores the resulting ref.
    ///
    /// # Safety
    /// `values.len() == self.type_ids.len()`, and every pointer satisfies
    /// the contract above. Ownership of the bytes each pointer refers to
    /// passes to this archetype (or the stable column).
    pub unsafe fn push_new_row(
        &mut self,
        entity: EntityId,
        values: &[*const u8],
        stable_columns: &mut FxHashMap<TypeId, StableColumn>,
    ) -> usize {
        debug_assert_eq!(values.len(), self.type_ids.len());
        for i in 0..self.type_ids.len() {
            if self.stable[i] {
                let stable_col = stable_columns
                    .get_mut(&self.type_ids[i])
                    .expect("stable column missing for registered stable type");
                let slot = unsafe { stable_col.emplace(values[i]) };
                unsafe {
                    self.columns[i].push_from(&slot as *const StableSlotRef as *const u8);
                }
            } else {
                unsafe {
                    self.columns[i].push_from(values[i]);
                }
            }
        }
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Destroy the row entirely: release any stable slots it holds, drop
    /// every in-place component, and swap-remove the row. Returns the
    /// entity that was moved into `row` to keep the archetype dense, if
    /// any, so the caller can patch that entity's record.
    ///
    /// # Safety
    /// `row` must be `< len()`.
    pub unsafe fn swap_remove_row(
        &mut self,
        row: usize,
        stable_columns: &mut FxHashMap<TypeId, StableColumn>,
    ) -> Option<EntityId> {
        for i in 0..self.type_ids.len() {
            if self.stable[i] {
                let slot = unsafe { *(self.columns[i].get_ptr(row) as *const StableSlotRef) };
                stable_columns
                    .get_mut(&self.type_ids[i])
                    .expect("stable column missing for registered stable type")
                    .remove(slot.chunk_index, slot.slot_index);
            }
        }
        for col in &mut self.columns {
            unsafe {
                col.swap_remove(row);
            }
        }
        self.swap_remove_entity(row)
    }

    /// Release the component at `col_index`/`row` without shrinking the
    /// column: drops it in place (or releases its stable slot), leaving a
    /// logically-dead slot that a subsequent [`Self::forget_row`] must
    /// shrink away.
    ///
    /// # Safety
    /// `row` must be `< len()` and must not be read or dropped again.
    unsafe fn release_component(
        &self,
        col_index: usize,
        row: usize,
        stable_columns: &mut FxHashMap<TypeId, StableColumn>,
    ) {
        if self.stable[col_index] {
            let slot =
                unsafe { *(self.columns[col_index].get_ptr(row) as *const StableSlotRef) };
            stable_columns
                .get_mut(&self.type_ids[col_index])
                .expect("stable column missing for registered stable type")
                .remove(slot.chunk_index, slot.slot_index);
        } else {
            unsafe {
                self.columns[col_index].drop_at(row);
            }
        }
    }

    /// Shrink every column by one row at `row` without dropping anything —
    /// every value at `row` must already have been moved out or explicitly
    /// released via [`Self::release_component`]. Returns the entity moved
    /// into `row`, if any.
    ///
    /// # Safety
    /// `row` must be `< len()`, and every column's value at `row` must
    /// already be logically consumed.
    unsafe fn forget_row(&mut self, row: usize) -> Option<EntityId> {
        for col in &mut self.columns {
            unsafe {
                col.forget_swap_remove(row);
            }
        }
        self.swap_remove_entity(row)
    }

    fn swap_remove_entity(&mut self, row: usize) -> Option<EntityId> {
        let last = self.entities.len() - 1;
        let moved = if row != last {
            Some(self.entities[last])
        } else {
            None
        };
        self.entities.swap_remove(row);
        moved
    }

    /// Move the row at `src_row` of `src` into `self`, performing a
    /// lock-step scan over both sorted type lists: types present in both
    /// archetypes are moved byte-for-byte, types only `src` carries are
    /// dropped (or have their stable slot released), and types only
    /// `self` carries must be supplied via `new_component` (a single
    /// `(type_id, ptr)` pair — the contract this crate's structural
    /// transitions rely on, since every edge changes exactly one type).
    ///
    /// Returns the new row in `self` and the entity (if any) that got
    /// swapped into `src_row` as a result of removing it from `src`.
    ///
    /// # Safety
    /// `src_row` must be `< src.len()`; if `new_component` is supplied, its
    /// pointer must be valid for `self`'s corresponding column's type and
    /// ownership passes to this archetype (or its stable column).
    pub unsafe fn move_row_from(
        &mut self,
        src: &mut Archetype,
        src_row: usize,
        stable_columns: &mut FxHashMap<TypeId, StableColumn>,
        new_component: Option<(TypeId, *const u8)>,
    ) -> (usize, Option<EntityId>) {
        let entity = src.entities[src_row];
        let mut j = 0usize;
        for i in 0..self.type_ids.len() {
            let dst_type = self.type_ids[i];
            while j < src.type_ids.len() && src.type_ids[j] != dst_type {
                unsafe {
                    src.release_component(j, src_row, stable_columns);
                }
                j += 1;
            }
            if j < src.type_ids.len() && src.type_ids[j] == dst_type {
                unsafe {
                    let ptr = src.columns[j].get_ptr(src_row);
                    self.columns[i].push_from(ptr);
                }
                j += 1;
            } else {
                let (type_id, ptr) = new_component
                    .expect("structural transition missing the newly-added component");
                debug_assert_eq!(type_id, dst_type);
                if self.stable[i] {
                    let stable_col = stable_columns
                        .get_mut(&dst_type)
                        .expect("stable column missing for registered stable type");
                    let slot = unsafe { stable_col.emplace(ptr) };
                    unsafe {
                        self.columns[i].push_from(&slot as *const StableSlotRef as *const u8);
                    }
                } else {
                    unsafe {
                        self.columns[i].push_from(ptr);
                    }
                }
            }
        }
        while j < src.type_ids.len() {
            unsafe {
                src.release_component(j, src_row, stable_columns);
            }
            j += 1;
        }
        self.entities.push(entity);
        let new_row = self.entities.len() - 1;
        let moved = unsafe { src.forget_row(src_row) };
        (new_row, moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_id::TypeOps;

    fn archetype_of<T: 'static>() -> (Archetype, TypeId) {
        let type_id = TypeId::of::<T>();
        (
            Archetype::new(
                vec![type_id],
                vec![false],
                vec![PackedColumn::new(TypeOps::of::<T>())],
            ),
            type_id,
        )
    }

    fn eid(index: u32) -> EntityId {
        EntityId {
            index,
            generation: 1,
        }
    }

    #[test]
    fn push_new_row_then_read_back() {
        let (mut arch, _tid) = archetype_of::<u32>();
        let mut stable = FxHashMap::default();
        let value = 99u32;
        let row = unsafe {
            arch.push_new_row(eid(0), &[&value as *const u32 as *const u8], &mut stable)
        };
        assert_eq!(row, 0);
        assert_eq!(*arch.column_at(0).get::<u32>(row).unwrap(), 99);
    }

    #[test]
    fn swap_remove_row_reports_moved_entity() {
        let (mut arch, _tid) = archetype_of::<u32>();
        let mut stable = FxHashMap::default();
        for (i, v) in [1u32, 2, 3].iter().enumerate() {
            unsafe {
                arch.push_new_row(eid(i as u32), &[v as *const u32 as *const u8], &mut stable);
            }
        }
        let moved = unsafe { arch.swap_remove_row(0, &mut stable) };
        assert_eq!(moved, Some(eid(2)));
        assert_eq!(arch.len(), 2);
    }

    #[test]
    fn move_row_from_adds_a_new_type() {
        let type_a = TypeId::of::<u32>();
        let type_b = TypeId::of::<u64>();
        let mut src = Archetype::new(
            vec![type_a],
            vec![false],
            vec![PackedColumn::new(TypeOps::of::<u32>())],
        );
        let mut dst = Archetype::new(
            vec![type_a, type_b],
            vec![false, false],
            vec![
                PackedColumn::new(TypeOps::of::<u32>()),
                PackedColumn::new(TypeOps::of::<u64>()),
            ],
        );
        let mut stable = FxHashMap::default();
        let a_value = 7u32;
        unsafe {
            src.push_new_row(eid(0), &[&a_value as *const u32 as *const u8], &mut stable);
        }
        let b_value = 11u64;
        let (new_row, moved) = unsafe {
            dst.move_row_from(
                &mut src,
                0,
                &mut stable,
                Some((type_b, &b_value as *const u64 as *const u8)),
            )
        };
        assert_eq!(new_row, 0);
        assert_eq!(moved, None);
        assert_eq!(src.len(), 0);
        assert_eq!(*dst.column_at(0).get::<u32>(0).unwrap(), 7);
        assert_eq!(*dst.column_at(1).get::<u64>(0).unwrap(), 11);
    }

    #[test]
    fn move_row_from_drops_a_removed_type() {
        let counter = std::rc::Rc::new(std::cell::Cell::new(0));
        struct Droppy(std::rc::Rc<std::cell::Cell<u32>>);
        impl Drop for Droppy {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }
        let type_a = TypeId::of::<u32>();
        let type_b = TypeId::of::<Droppy>();
        let mut src = Archetype::new(
            vec![type_a, type_b],
            vec![false, false],
            vec![
                PackedColumn::new(TypeOps::of::<u32>()),
                PackedColumn::new(TypeOps::of::<Droppy>()),
            ],
        );
        let mut dst = Archetype::new(
            vec![type_a],
            vec![false],
            vec![PackedColumn::new(TypeOps::of::<u32>())],
        );
        let mut stable = FxHashMap::default();
        let a_value = 3u32;
        let droppy = std::mem::ManuallyDrop::new(Droppy(counter.clone()));
        unsafe {
            src.push_new_row(
                eid(0),
                &[
                    &a_value as *const u32 as *const u8,
                    &*droppy as *const Droppy as *const u8,
                ],
                &mut stable,
            );
        }
        let (_new_row, _moved) = unsafe { dst.move_row_from(&mut src, 0, &mut stable, None) };
        assert_eq!(counter.get(), 1);
        assert_eq!(dst.len(), 1);
        assert_eq!(src.len(), 0);
    }

    #[test]
    fn stable_column_slot_survives_archetype_move() {
        let type_a = TypeId::of::<u32>();
        let stable_type = TypeId::of::<crate::type_id::Stable<u64>>();
        let mut src = Archetype::new(
            vec![stable_type],
            vec![true],
            vec![PackedColumn::new(TypeOps::of::<StableSlotRef>())],
        );
        let mut dst = Archetype::new(
            vec![type_a, stable_type],
            vec![false, true],
            vec![
                PackedColumn::new(TypeOps::of::<u32>()),
                PackedColumn::new(TypeOps::of::<StableSlotRef>()),
            ],
        );
        let mut stable_columns = FxHashMap::default();
        stable_columns.insert(stable_type, StableColumn::new(TypeOps::of::<u64>(), 4));

        let value = 55u64;
        unsafe {
            src.push_new_row(eid(0), &[&value as *const u64 as *const u8], &mut stable_columns);
        }
        let slot_before = unsafe { *(src.column_at(0).get_ptr(0) as *const StableSlotRef) };
        let ptr_before = stable_columns.get(&stable_type).unwrap().get(slot_before);

        let a_value = 4u32;
        unsafe {
            dst.move_row_from(
                &mut src,
                0,
                &mut stable_columns,
                Some((type_a, &a_value as *const u32 as *const u8)),
            );
        }
        let slot_after = unsafe { *(dst.column_at(1).get_ptr(0) as *const StableSlotRef) };
        let ptr_after = stable_columns.get(&stable_type).unwrap().get(slot_after);
        assert_eq!(ptr_before, ptr_after);
        assert_eq!(unsafe { *(ptr_after as *const u64) }, 55);
    }
}
