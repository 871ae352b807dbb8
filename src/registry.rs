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

//! Per-component-type metadata: layout, stable-chunk size, observer
//! hooks, and the factories consulted whenever a new archetype must
//! materialize a column for a type it hasn't seen before.

use std::any::TypeId;

use rustc_hash::FxHashMap;

use crate::column::PackedColumn;
use crate::entity::EntityId;
use crate::stable::StableColumn;
use crate::type_id::{Stable, TypeOps};

/// Type-erased component lifecycle hook: `fn(component_ptr, entity)`.
///
/// # Safety
/// `ptr` must point to a valid, properly-aligned component of the type the
/// hook was registered for.
pub type ComponentHook = Box<dyn Fn(*const u8, EntityId) + Send + Sync>;

struct TypeEntry {
    ops: TypeOps,
    stable: bool,
    stable_chunk_size: Option<usize>,
    observer_order: i32,
    on_create: Option<ComponentHook>,
    on_destroy: Option<ComponentHook>,
}

/// Per-type metadata store. Registration is idempotent for identical
/// metadata and append-only in steady state — see §7 `IncompatibleRegistry`:
/// re-registering a type with disagreeing layout or stability is a hard
/// error, since it would mean two different archetypes disagree on what a
/// shared type-id even is.
pub struct ComponentRegistry {
    entries: FxHashMap<TypeId, TypeEntry>,
    default_stable_chunk_size: usize,
}

impl ComponentRegistry {
    pub fn new(default_stable_chunk_size: usize) -> Self {
        Self {
            entries: FxHashMap::default(),
            default_stable_chunk_size,
        }
    }

    /// Ensure a non-stable type is registered, panicking if it was
    /// previously registered as stable (layout-incompatible use).
    pub fn register<T: 'static>(&mut self) {
        self.register_with(TypeOps::of::<T>(), false, None);
    }

    /// Ensure a stable type is registered with the given chunk-size
    /// override (falling back to the registry default when `None`).
    ///
    /// Registers under `Stable::<T>::type_id()`, not `TypeId::of::<T>()`:
    /// a stable `T` and a plain `T` are distinct component types that can
    /// coexist on the same entity in different archetypes. Layout, move and
    /// drop are still captured from `T` itself.
    pub fn register_stable<T: 'static>(&mut self, chunk_size: Option<usize>) {
        let mut ops = TypeOps::of::<T>();
        ops.type_id = Stable::<T>::type_id();
        self.register_with(ops, true, chunk_size);
    }

    fn register_with(&mut self, ops: TypeOps, stable: bool, chunk_size: Option<usize>) {
        match self.entries.get(&ops.type_id) {
            Some(existing) => {
                assert!(
                    existing.stable == stable && existing.ops.size == ops.size,
                    "IncompatibleRegistry: type {:?} re-registered with disagreeing metadata",
                    ops.type_id
                );
            }
            None => {
                self.entries.insert(
                    ops.type_id,
                    TypeEntry {
                        ops,
                        stable,
                        stable_chunk_size: chunk_size,
                        observer_order: 0,
                        on_create: None,
                        on_destroy: None,
                    },
                );
            }
        }
    }

    pub fn is_stable(&self, type_id: TypeId) -> bool {
        self.entries.get(&type_id).is_some_and(|e| e.stable)
    }

    pub fn type_ops(&self, type_id: TypeId) -> Option<TypeOps> {
        self.entries.get(&type_id).map(|e| e.ops)
    }

    fn stable_chunk_size(&self, type_id: TypeId) -> usize {
        self.entries
            .get(&type_id)
            .and_then(|e| e.stable_chunk_size)
            .unwrap_or(self.default_stable_chunk_size)
    }

    /// Factory consulted when a new archetype needs a fresh packed column
    /// for a type it hasn't stored before.
    pub fn clone_column(&self, type_id: TypeId) -> PackedColumn {
        let ops = self
            .type_ops(type_id)
            .expect("column requested for unregistered type");
        PackedColumn::new(ops)
    }

    /// Factory consulted when a new archetype needs a fresh stable column.
    pub fn clone_stable_column(&self, type_id: TypeId) -> StableColumn {
        let ops = self
            .type_ops(type_id)
            .expect("stable column requested for unregistered type");
        StableColumn::new(ops, self.stable_chunk_size(type_id))
    }

    /// Set the tiebreaker used when ordering a new archetype's columns:
    /// columns are sorted `(observer_order, type_id)` ascending (§9 open
    /// question resolution).
    pub fn set_observer_order(&mut self, type_id: TypeId, order: i32) {
        if let Some(entry) = self.entries.get_mut(&type_id) {
            entry.observer_order = order;
        }
    }

    pub fn observer_order(&self, type_id: TypeId) -> i32 {
        self.entries.get(&type_id).map(|e| e.observer_order).unwrap_or(0)
    }

    /// Sort `type_ids` by `(observer_order, type_id)` ascending, the order
    /// a new archetype's columns (and thus its create-component observer
    /// firing order) are materialized in.
    pub fn ordered_type_ids(&self, type_ids: &mut [TypeId]) {
        type_ids.sort_by_key(|&tid| (self.observer_order(tid), tid));
    }

    pub fn set_create_hook(&mut self, type_id: TypeId, hook: ComponentHook) {
        if let Some(entry) = self.entries.get_mut(&type_id) {
            entry.on_create = Some(hook);
        }
    }

    pub fn set_destroy_hook(&mut self, type_id: TypeId, hook: ComponentHook) {
        if let Some(entry) = self.entries.get_mut(&type_id) {
            entry.on_destroy = Some(hook);
        }
    }

    pub fn fire_create(&self, type_id: TypeId, ptr: *const u8, entity: EntityId) {
        if let Some(entry) = self.entries.get(&type_id) {
            if let Some(hook) = &entry.on_create {
                hook(ptr, entity);
            }
        }
    }

    pub fn fire_destroy(&self, type_id: TypeId, ptr: *const u8, entity: EntityId) {
        if let Some(entry) = self.entries.get(&type_id) {
            if let Some(hook) = &entry.on_destroy {
                hook(ptr, entity);
            }
        }
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new(1000)
    }
}
