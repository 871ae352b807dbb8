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

//! The store façade: the single entry point through which entities,
//! components and queries are created, moved and destroyed. Every mutation
//! here is synchronous and assumes exclusive access — see §5's concurrency
//! model: no method on this type may run concurrently with another mutating
//! call against the same store.

use std::alloc::{alloc, dealloc, Layout};
use std::any::TypeId;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::archetype::Archetype;
use crate::component::{Bundle, Component, MAX_BUNDLE_COMPONENTS};
use crate::config::StoreConfig;
use crate::entity::{EntityId, EntityManager};
use crate::error::{EcsError, Result};
use crate::graph::{ArchetypeGraph, ShrinkToFitState};
use crate::observer::{EntityObserver, ObserverList};
use crate::query::{for_each_typed, QueryCache, QueryParams};
use crate::registry::{ComponentHook, ComponentRegistry};
use crate::stable::{StableColumn, StableSlotRef};
use crate::type_id::Stable;
use crate::utils::align_to;

/// Resolve the address of the component `type_id` holds at `row` in
/// `archetype`: the column's own pointer for a direct column, or the
/// pointer into the shared stable column for a `Stable<T>` column.
fn resolve_component_ptr(
    stable_columns: &FxHashMap<TypeId, StableColumn>,
    archetype: &Archetype,
    type_id: TypeId,
    row: usize,
) -> *const u8 {
    let col_index = archetype.position(type_id).expect("type present in archetype");
    if archetype.is_stable_column(col_index) {
        let slot = unsafe { *(archetype.column_at(col_index).get_ptr(row) as *const StableSlotRef) };
        stable_columns
            .get(&type_id)
            .expect("stable column missing for registered stable type")
            .get(slot)
    } else {
        unsafe { archetype.column_at(col_index).get_ptr(row) }
    }
}

/// Central entity/component/archetype store.
pub struct World {
    entities: EntityManager,
    graph: ArchetypeGraph,
    registry: ComponentRegistry,
    stable_columns: FxHashMap<TypeId, StableColumn>,
    observers: ObserverList,
    stable_chunk_overrides: FxHashMap<TypeId, usize>,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            entities: EntityManager::with_chunk_size(config.entity_chunk_size),
            graph: ArchetypeGraph::with_chunk_size(config.archetype_chunk_size),
            registry: ComponentRegistry::new(config.default_stable_chunk_size),
            stable_columns: FxHashMap::default(),
            observers: ObserverList::new(),
            stable_chunk_overrides: config.per_type_stable_chunk_size,
        }
    }

    fn ensure_registered<T: Component>(&mut self) {
        if self.registry.type_ops(TypeId::of::<T>()).is_none() {
            self.registry.register::<T>();
        }
    }

    /// Register `Stable<T>` the first time it's needed, also materializing
    /// the shared [`StableColumn`] every archetype's `Stable<T>` slot
    /// indirects into. Returns `Stable::<T>::type_id()`.
    fn ensure_registered_stable<T: Component>(&mut self) -> TypeId {
        let stable_id = Stable::<T>::type_id();
        if self.registry.type_ops(stable_id).is_none() {
            let chunk_size = self.stable_chunk_overrides.get(&TypeId::of::<T>()).copied();
            self.registry.register_stable::<T>(chunk_size);
            self.stable_columns
                .insert(stable_id, self.registry.clone_stable_column(stable_id));
        }
        stable_id
    }

    fn record_archetype_row(&self, id: EntityId) -> Result<(usize, usize)> {
        if !self.entities.is_alive(id) {
            return Err(EcsError::DeadEntity);
        }
        let record = self.entities.record(id).unwrap();
        Ok((
            record
                .archetype_id
                .expect("alive entity always has an archetype"),
            record.row,
        ))
    }

    /// Allocate a new entity with no components, placed in the empty
    /// archetype. Fires the create-entity observer.
    pub fn create_entity(&mut self, active: bool) -> EntityId {
        let id = self.entities.create(active);
        let row = unsafe {
            self.graph
                .get_mut(ArchetypeGraph::EMPTY)
                .push_new_row(id, &[], &mut self.stable_columns)
        };
        self.entities.set_location(id, Some(ArchetypeGraph::EMPTY), row);
        self.observers.fire_create(id);
        id
    }

    /// Destroy `id`: fires the destroy-entity observer, then the
    /// destroy-component observer for every attached component in archetype
    /// type order, releases any stable slots, swap-removes the row, and
    /// returns the index to the free list.
    pub fn destroy_entity(&mut self, id: EntityId) -> Result<()> {
        let (archetype_id, row) = self.record_archetype_row(id)?;
        self.observers.fire_destroy(id);

        let archetype = self.graph.get(archetype_id);
        for &type_id in archetype.type_ids() {
            let ptr = resolve_component_ptr(&self.stable_columns, archetype, type_id, row);
            self.registry.fire_destroy(type_id, ptr, id);
        }

        let moved = unsafe {
            self.graph
                .get_mut(archetype_id)
                .swap_remove_row(row, &mut self.stable_columns)
        };
        if let Some(moved_entity) = moved {
            self.entities.set_location(moved_entity, Some(archetype_id), row);
        }
        self.entities.destroy(id)
    }

    /// Route the single-component `(type_id, ptr)` transition from `from`
    /// through `graph.add_edge_target` and move the row, patching up
    /// whichever entity got swapped into the vacated source row. Returns the
    /// new archetype and row.
    fn move_for_add(
        &mut self,
        id: EntityId,
        from: usize,
        row: usize,
        type_id: TypeId,
        ptr: *const u8,
    ) -> (usize, usize) {
        let to = self.graph.add_edge_target(from, type_id, &self.registry);
        let (from_arch, to_arch) = self.graph.get_pair_mut(from, to);
        let (new_row, moved) =
            unsafe { to_arch.move_row_from(from_arch, row, &mut self.stable_columns, Some((type_id, ptr))) };
        if let Some(moved_entity) = moved {
            self.entities.set_location(moved_entity, Some(from), row);
        }
        self.entities.set_location(id, Some(to), new_row);
        (to, new_row)
    }

    /// Route the single-component removal transition from `from` through
    /// `graph.remove_edge_target` and move the row.
    fn move_for_remove(&mut self, id: EntityId, from: usize, row: usize, type_id: TypeId) -> (usize, usize) {
        let to = self.graph.remove_edge_target(from, type_id, &self.registry);
        let (from_arch, to_arch) = self.graph.get_pair_mut(from, to);
        let (new_row, moved) = unsafe { to_arch.move_row_from(from_arch, row, &mut self.stable_columns, None) };
        if let Some(moved_entity) = moved {
            self.entities.set_location(moved_entity, Some(from), row);
        }
        self.entities.set_location(id, Some(to), new_row);
        (to, new_row)
    }

    /// Add a directly-stored `T`. If `id` already carries a `T`, the new
    /// value is dropped and a reference to the existing one is returned —
    /// adding a component never overwrites an existing one.
    pub fn add_component<T: Component>(&mut self, id: EntityId, value: T) -> Result<&mut T> {
        let (from, row) = self.record_archetype_row(id)?;
        self.ensure_registered::<T>();
        let type_id = TypeId::of::<T>();

        if self.graph.get(from).has(type_id) {
            drop(value);
            let archetype = self.graph.get_mut(from);
            return Ok(archetype.column_mut(type_id).unwrap().get_mut::<T>(row).unwrap());
        }

        let value = std::mem::ManuallyDrop::new(value);
        let ptr = &*value as *const T as *const u8;
        let (to, new_row) = self.move_for_add(id, from, row, type_id, ptr);

        let component_ptr = resolve_component_ptr(&self.stable_columns, self.graph.get(to), type_id, new_row);
        self.registry.fire_create(type_id, component_ptr, id);
        let archetype = self.graph.get_mut(to);
        Ok(archetype.column_mut(type_id).unwrap().get_mut::<T>(new_row).unwrap())
    }

    /// Add a `Stable<T>`: same contract as [`Self::add_component`], but the
    /// value lives in a fixed-address stable slot, addressable from any
    /// archetype the entity later moves to.
    pub fn add_stable_component<T: Component>(&mut self, id: EntityId, value: T) -> Result<&mut T> {
        let (from, row) = self.record_archetype_row(id)?;
        let type_id = self.ensure_registered_stable::<T>();

        if self.graph.get(from).has(type_id) {
            drop(value);
            let ptr = resolve_component_ptr(&self.stable_columns, self.graph.get(from), type_id, row);
            return Ok(unsafe { &mut *(ptr as *mut T) });
        }

        let value = std::mem::ManuallyDrop::new(value);
        let ptr = &*value as *const T as *const u8;
        let (to, new_row) = self.move_for_add(id, from, row, type_id, ptr);

        let component_ptr = resolve_component_ptr(&self.stable_columns, self.graph.get(to), type_id, new_row);
        self.registry.fire_create(type_id, component_ptr, id);
        Ok(unsafe { &mut *(component_ptr as *mut T) })
    }

    /// Remove a directly-stored `T`. Fires the destroy-component observer
    /// with a reference to the value before it is dropped by the archetype
    /// transition.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> Result<()> {
        self.remove_component_by_id(id, TypeId::of::<T>())
    }

    /// Remove a `Stable<T>`, releasing its stable slot.
    pub fn remove_stable_component<T: Component>(&mut self, id: EntityId) -> Result<()> {
        self.remove_component_by_id(id, Stable::<T>::type_id())
    }

    fn remove_component_by_id(&mut self, id: EntityId, type_id: TypeId) -> Result<()> {
        let (from, row) = self.record_archetype_row(id)?;
        if !self.graph.get(from).has(type_id) {
            return Err(EcsError::ComponentNotFound);
        }

        let ptr = resolve_component_ptr(&self.stable_columns, self.graph.get(from), type_id, row);
        self.registry.fire_destroy(type_id, ptr, id);

        self.move_for_remove(id, from, row, type_id);
        Ok(())
    }

    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        self.has_component_id(id, TypeId::of::<T>())
    }

    pub fn has_stable_component<T: Component>(&self, id: EntityId) -> bool {
        self.has_component_id(id, Stable::<T>::type_id())
    }

    fn has_component_id(&self, id: EntityId, type_id: TypeId) -> bool {
        match self.entities.record(id) {
            Some(record) if self.entities.is_alive(id) => self
                .graph
                .get(record.archetype_id.expect("alive entity always has an archetype"))
                .has(type_id),
            _ => false,
        }
    }

    pub fn get_component<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.get_component_ptr(id, TypeId::of::<T>())
            .map(|p| unsafe { &*(p as *const T) })
    }

    pub fn get_component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        self.get_component_ptr(id, TypeId::of::<T>())
            .map(|p| unsafe { &mut *(p as *mut T) })
    }

    pub fn get_stable_component<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.get_component_ptr(id, Stable::<T>::type_id())
            .map(|p| unsafe { &*(p as *const T) })
    }

    pub fn get_stable_component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        self.get_component_ptr(id, Stable::<T>::type_id())
            .map(|p| unsafe { &mut *(p as *mut T) })
    }

    fn get_component_ptr(&self, id: EntityId, type_id: TypeId) -> Option<*const u8> {
        if !self.entities.is_alive(id) {
            return None;
        }
        let record = self.entities.record(id).unwrap();
        let archetype_id = record.archetype_id.expect("alive entity always has an archetype");
        let archetype = self.graph.get(archetype_id);
        if !archetype.has(type_id) {
            return None;
        }
        Some(resolve_component_ptr(&self.stable_columns, archetype, type_id, record.row))
    }

    /// Flip the active flag, firing the activate/deactivate observer only
    /// when it actually changes. Never moves the entity to a different
    /// archetype.
    pub fn set_active(&mut self, id: EntityId, active: bool) -> Result<()> {
        if self.entities.set_active(id, active)? {
            if active {
                self.observers.fire_activate(id);
            } else {
                self.observers.fire_deactivate(id);
            }
        }
        Ok(())
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.is_alive(id)
    }

    /// Compute properly-aligned offsets for one of each of `B`'s components
    /// packed into a single scratch buffer, in `B`'s declaration order.
    /// Mirrors how a compiler lays out a struct: each field starts at the
    /// next offset aligned to its own type, and the whole buffer is aligned
    /// to the strictest field.
    fn bundle_layout<B: Bundle>(
        registry: &ComponentRegistry,
        type_ids: &[TypeId],
    ) -> (SmallVec<[usize; MAX_BUNDLE_COMPONENTS]>, Layout) {
        let mut offsets = SmallVec::new();
        let mut cursor = 0usize;
        let mut max_align = 1usize;
        for &type_id in type_ids {
            let ops = registry
                .type_ops(type_id)
                .expect("bundle type registered before layout is computed");
            let align = ops.align.max(1);
            cursor = align_to(cursor, align);
            offsets.push(cursor);
            cursor += ops.size;
            max_align = max_align.max(align);
        }
        let layout = Layout::from_size_align(cursor, max_align).expect("bundle layout is valid");
        (offsets, layout)
    }

    /// Spawn one entity carrying every component of `bundle`, materializing
    /// the target archetype (creating it if this is the first entity with
    /// this exact type-set) and firing a create-component observer for each
    /// component in archetype type order.
    pub fn spawn<B: Bundle>(&mut self, bundle: B, active: bool) -> EntityId {
        B::register_types(&mut self.registry);
        let bundle_types = B::type_ids();
        let (offsets, layout) = Self::bundle_layout::<B>(&self.registry, &bundle_types);

        let scratch = if layout.size() == 0 {
            std::ptr::NonNull::<u8>::dangling().as_ptr()
        } else {
            let ptr = unsafe { alloc(layout) };
            if ptr.is_null() {
                std::alloc::handle_alloc_error(layout);
            }
            ptr
        };

        let ptrs: SmallVec<[*mut u8; MAX_BUNDLE_COMPONENTS]> =
            offsets.iter().map(|&off| unsafe { scratch.add(off) }).collect();
        unsafe {
            bundle.write_components(&ptrs);
        }

        let mut target = ArchetypeGraph::EMPTY;
        for &type_id in &bundle_types {
            target = self.graph.add_edge_target(target, type_id, &self.registry);
        }

        let id = self.entities.create(active);
        self.observers.fire_create(id);

        let archetype_type_ids: SmallVec<[TypeId; MAX_BUNDLE_COMPONENTS]> =
            self.graph.get(target).type_ids().iter().copied().collect();
        let values: SmallVec<[*const u8; MAX_BUNDLE_COMPONENTS]> = archetype_type_ids
            .iter()
            .map(|tid| {
                let i = bundle_types
                    .iter()
                    .position(|t| t == tid)
                    .expect("every archetype type for a freshly-built target came from the bundle");
                ptrs[i] as *const u8
            })
            .collect();

        let row = unsafe {
            self.graph
                .get_mut(target)
                .push_new_row(id, &values, &mut self.stable_columns)
        };
        self.entities.set_location(id, Some(target), row);

        for &type_id in &archetype_type_ids {
            let component_ptr = resolve_component_ptr(&self.stable_columns, self.graph.get(target), type_id, row);
            self.registry.fire_create(type_id, component_ptr, id);
        }

        if layout.size() > 0 {
            unsafe {
                dealloc(scratch, layout);
            }
        }
        id
    }

    /// Spawn `count` entities, each a deep copy of `bundle` (stable
    /// components get their own stable slot; non-stable components are
    /// memberwise-copied via `Clone`).
    pub fn spawn_batch<B: Bundle + Clone>(&mut self, bundle: B, count: usize, active: bool) -> Vec<EntityId> {
        let mut ids = Vec::with_capacity(count);
        if count == 0 {
            return ids;
        }
        for _ in 0..count - 1 {
            ids.push(self.spawn(bundle.clone(), active));
        }
        ids.push(self.spawn(bundle, active));
        ids
    }

    pub fn query<Q: QueryParams>(&self) -> Query<Q> {
        Query::new()
    }

    /// Refresh `query` against the current archetype graph and visit every
    /// matching row, skipping inactive entities unless `active_only` is
    /// `false`. Refreshing is incremental: archetypes already seen by a
    /// previous call are not rescanned.
    pub fn for_each<Q: QueryParams, F: FnMut(EntityId, Q::Item<'_>)>(
        &self,
        query: &mut Query<Q>,
        active_only: bool,
        f: F,
    ) {
        query.cache.refresh(&self.graph);
        for_each_typed::<Q, F>(&self.graph, query.cache.matched_archetypes(), &self.entities, active_only, f);
    }

    pub fn graph(&self) -> &ArchetypeGraph {
        &self.graph
    }

    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn register_observer(&mut self, observer: Box<dyn EntityObserver>) {
        self.observers.register(observer);
    }

    pub fn set_create_hook<T: Component>(&mut self, hook: ComponentHook) {
        self.ensure_registered::<T>();
        self.registry.set_create_hook(TypeId::of::<T>(), hook);
    }

    pub fn set_destroy_hook<T: Component>(&mut self, hook: ComponentHook) {
        self.ensure_registered::<T>();
        self.registry.set_destroy_hook(TypeId::of::<T>(), hook);
    }

    /// Set the `(observer_order, type_id)` tiebreaker consulted when a new
    /// archetype materializes its columns (§9 open question resolution).
    pub fn set_observer_order<T: Component>(&mut self, order: i32) {
        self.ensure_registered::<T>();
        self.registry.set_observer_order(TypeId::of::<T>(), order);
    }

    pub fn shrink_to_fit(&mut self, threshold: f32) {
        self.graph.shrink_to_fit(threshold);
    }

    pub fn shrink_to_fit_incremental(&mut self, state: &mut ShrinkToFitState, budget: usize) {
        self.graph.shrink_to_fit_incremental(state, budget);
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// A persistent, incrementally-refreshed query over `Q`. Holding the same
/// instance across calls to [`World::for_each`] is what makes refreshing
/// cheap — see the query engine's `QueryCache` for how that incrementality
/// works.
pub struct Query<Q: QueryParams> {
    cache: QueryCache,
    _marker: std::marker::PhantomData<fn() -> Q>,
}

impl<Q: QueryParams> Query<Q> {
    pub fn new() -> Self {
        Self {
            cache: QueryCache::new(Q::signature()),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<Q: QueryParams> Default for Query<Q> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity {
        x: f32,
    }

    #[derive(Debug, Clone)]
    struct Inventory {
        slots: u32,
    }

    #[test]
    fn create_entity_starts_in_empty_archetype() {
        let mut world = World::new();
        let e = world.create_entity(true);
        assert!(world.is_alive(e));
        assert!(!world.has_component::<Position>(e));
    }

    #[test]
    fn add_then_query_single_component() {
        let mut world = World::new();
        let e = world.create_entity(true);
        world.add_component(e, Position { x: 1.0, y: 2.0 }).unwrap();
        assert!(world.has_component::<Position>(e));
        assert_eq!(world.get_component::<Position>(e), Some(&Position { x: 1.0, y: 2.0 }));

        let mut query = world.query::<(&Position,)>();
        let mut seen = Vec::new();
        world.for_each(&mut query, true, |entity, (pos,)| seen.push((entity, *pos)));
        assert_eq!(seen, vec![(e, Position { x: 1.0, y: 2.0 })]);
    }

    #[test]
    fn add_then_remove_returns_to_equivalent_archetype() {
        let mut world = World::new();
        let e = world.create_entity(true);
        world.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();
        let before = world.entities().record(e).unwrap().archetype_id;
        world.add_component(e, Velocity { x: 1.0 }).unwrap();
        world.remove_component::<Velocity>(e).unwrap();
        let after = world.entities().record(e).unwrap().archetype_id;
        assert_eq!(before, after);
        assert!(world.has_component::<Position>(e));
        assert!(!world.has_component::<Velocity>(e));
    }

    #[test]
    fn adding_duplicate_component_is_a_no_op() {
        let mut world = World::new();
        let e = world.create_entity(true);
        world.add_component(e, Position { x: 1.0, y: 1.0 }).unwrap();
        world.add_component(e, Position { x: 9.0, y: 9.0 }).unwrap();
        assert_eq!(world.get_component::<Position>(e), Some(&Position { x: 1.0, y: 1.0 }));
    }

    #[test]
    fn remove_absent_component_fails() {
        let mut world = World::new();
        let e = world.create_entity(true);
        assert_eq!(world.remove_component::<Position>(e), Err(EcsError::ComponentNotFound));
    }

    #[test]
    fn destroy_entity_recycles_and_invalidates_handle() {
        let mut world = World::new();
        let e = world.create_entity(true);
        world.add_component(e, Position { x: 1.0, y: 1.0 }).unwrap();
        world.destroy_entity(e).unwrap();
        assert!(!world.is_alive(e));
        assert_eq!(world.destroy_entity(e), Err(EcsError::DeadEntity));
    }

    #[test]
    fn stable_component_pointer_survives_archetype_move() {
        let mut world = World::new();
        let e1 = world.create_entity(true);
        let e2 = world.create_entity(true);
        world.add_stable_component(e1, Inventory { slots: 16 }).unwrap();
        world.add_stable_component(e2, Inventory { slots: 16 }).unwrap();
        let ptr_before = world.get_stable_component::<Inventory>(e1).unwrap() as *const Inventory;

        world.add_component(e1, Position { x: 0.0, y: 0.0 }).unwrap();

        let ptr_after = world.get_stable_component::<Inventory>(e1).unwrap() as *const Inventory;
        assert_eq!(ptr_before, ptr_after);
        assert_eq!(world.get_stable_component::<Inventory>(e1).unwrap().slots, 16);
    }

    #[test]
    fn edge_wiring_reaches_expected_targets() {
        let mut world = World::new();
        let e = world.create_entity(true);
        world.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();
        world.add_component(e, Velocity { x: 0.0 }).unwrap();

        let type_a = TypeId::of::<Position>();
        let type_b = TypeId::of::<Velocity>();
        let registry = world.registry();
        let graph = world.graph();
        let with_a = graph.find_exact(&[type_a], registry).unwrap();
        let with_ab = graph.find_exact(&[type_a, type_b], registry).unwrap();
        assert_eq!(graph.get(with_a).add_edge(type_b), Some(with_ab));
    }

    #[test]
    fn query_incremental_fetch_sees_new_archetypes() {
        let mut world = World::new();
        let mut query = world.query::<(&Position,)>();
        let mut seen = 0;
        world.for_each(&mut query, true, |_, _| seen += 1);
        assert_eq!(seen, 0);

        for _ in 0..3 {
            let e = world.create_entity(true);
            world.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();
        }
        seen = 0;
        world.for_each(&mut query, true, |_, _| seen += 1);
        assert_eq!(seen, 3);
    }

    #[test]
    fn spawn_bundle_fires_create_hooks_in_archetype_order() {
        let mut world = World::new();
        let e = world.spawn((Position { x: 3.0, y: 4.0 }, Velocity { x: 5.0 }), true);
        assert_eq!(world.get_component::<Position>(e), Some(&Position { x: 3.0, y: 4.0 }));
        assert_eq!(world.get_component::<Velocity>(e), Some(&Velocity { x: 5.0 }));
    }

    #[test]
    fn spawn_batch_produces_independent_copies() {
        let mut world = World::new();
        let ids = world.spawn_batch(Position { x: 1.0, y: 1.0 }, 5, true);
        assert_eq!(ids.len(), 5);
        world.get_component_mut::<Position>(ids[0]).unwrap().x = 99.0;
        assert_eq!(world.get_component::<Position>(ids[1]).unwrap().x, 1.0);
    }

    #[test]
    fn set_active_does_not_move_archetype() {
        let mut world = World::new();
        let e = world.create_entity(true);
        world.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();
        let before = world.entities().record(e).unwrap().archetype_id;
        world.set_active(e, false).unwrap();
        let after = world.entities().record(e).unwrap().archetype_id;
        assert_eq!(before, after);
    }

    #[test]
    fn million_entity_create_destroy_cycle_keeps_invariants() {
        let mut world = World::new();
        let mut live = Vec::new();
        for _ in 0..1_000_000 {
            let id = world.create_entity(true);
            live.push(id);
            if live.len() > 100 {
                let old = live.remove(0);
                world.destroy_entity(old).unwrap();
            }
        }
        for id in live {
            assert!(world.is_alive(id));
        }
    }
}
