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

//! The archetype graph: every archetype that currently exists, indexed by
//! exact type-set, plus the grouping indices the query engine uses to find
//! candidate archetypes without scanning the whole graph.

use std::any::TypeId;

use rustc_hash::FxHashMap;

use crate::archetype::Archetype;
use crate::chunked_vec::ChunkedVec;
use crate::column::PackedColumn;
use crate::registry::ComponentRegistry;
use crate::stable::StableColumn;

/// Canonical archetype identity: `type_ids` sorted `(observer_order, type_id)`
/// ascending (§9 open question resolution) so archetype identity and
/// create-component observer firing order agree.
fn signature_key(type_ids: &[TypeId], registry: &ComponentRegistry) -> Vec<TypeId> {
    let mut sorted = type_ids.to_vec();
    registry.ordered_type_ids(&mut sorted);
    sorted
}

/// Owns every archetype that has ever been created and the indices used to
/// find or create them: exact-signature lookup, per-type membership lists,
/// per-size buckets, and a "first type" grouping the query engine uses to
/// pick a cheap seed when (re)scanning for matches.
pub struct ArchetypeGraph {
    archetypes: ChunkedVec<Archetype>,
    by_signature: FxHashMap<Vec<TypeId>, usize>,
    by_single_type: FxHashMap<TypeId, Vec<usize>>,
    by_count: Vec<Vec<usize>>,
    by_first_type: FxHashMap<TypeId, Vec<usize>>,
}

impl ArchetypeGraph {
    pub fn new() -> Self {
        let mut graph = Self {
            archetypes: ChunkedVec::new(),
            by_signature: FxHashMap::default(),
            by_single_type: FxHashMap::default(),
            by_count: Vec::new(),
            by_first_type: FxHashMap::default(),
        };
        let empty_id = graph.insert_new(Vec::new(), Vec::new(), Vec::new(), Vec::new());
        debug_assert_eq!(empty_id, 0);
        graph
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        let mut graph = Self {
            archetypes: ChunkedVec::with_chunk_size(chunk_size),
            by_signature: FxHashMap::default(),
            by_single_type: FxHashMap::default(),
            by_count: Vec::new(),
            by_first_type: FxHashMap::default(),
        };
        graph.insert_new(Vec::new(), Vec::new(), Vec::new(), Vec::new());
        graph
    }

    pub const EMPTY: usize = 0;

    pub fn get(&self, id: usize) -> &Archetype {
        &self.archetypes[id]
    }

    pub fn get_mut(&mut self, id: usize) -> &mut Archetype {
        &mut self.archetypes[id]
    }

    pub fn get_pair_mut(&mut self, a: usize, b: usize) -> (&mut Archetype, &mut Archetype) {
        assert_ne!(a, b, "cannot borrow the same archetype twice");
        // SAFETY: indices are distinct, so the two `&mut` borrows don't alias.
        unsafe {
            let ptr_a = &mut self.archetypes[a] as *mut Archetype;
            let ptr_b = &mut self.archetypes[b] as *mut Archetype;
            (&mut *ptr_a, &mut *ptr_b)
        }
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter()
    }

    pub fn find_exact(&self, type_ids: &[TypeId], registry: &ComponentRegistry) -> Option<usize> {
        self.by_signature
            .get(&signature_key(type_ids, registry))
            .copied()
    }

    fn insert_new(
        &mut self,
        type_ids: Vec<TypeId>,
        stable: Vec<bool>,
        columns: Vec<PackedColumn>,
        key: Vec<TypeId>,
    ) -> usize {
        let archetype = Archetype::new(type_ids.clone(), stable, columns);
        let id = self.archetypes.push_back(archetype);
        self.by_signature.insert(key, id);
        for &tid in &type_ids {
            self.by_single_type.entry(tid).or_default().push(id);
        }
        if let Some(&first) = type_ids.first() {
            self.by_first_type.entry(first).or_default().push(id);
        }
        let count = type_ids.len();
        if self.by_count.len() <= count {
            self.by_count.resize(count + 1, Vec::new());
        }
        self.by_count[count].push(id);
        id
    }

    /// Find or create the archetype reachable from `from` by adding
    /// `type_id`, wiring the add/remove edge on success and caching it on
    /// both archetypes so repeated transitions along the same edge are
    /// O(1) after the first.
    pub fn add_edge_target(
        &mut self,
        from: usize,
        type_id: TypeId,
        registry: &ComponentRegistry,
    ) -> usize {
        if let Some(cached) = self.archetypes[from].add_edge(type_id) {
            return cached;
        }
        let mut type_ids = self.archetypes[from].type_ids().to_vec();
        type_ids.push(type_id);
        registry.ordered_type_ids(&mut type_ids);
        let target = match self.find_exact(&type_ids, registry) {
            Some(id) => id,
            None => {
                let key = signature_key(&type_ids, registry);
                let stable: Vec<bool> = type_ids.iter().map(|&t| registry.is_stable(t)).collect();
                let columns = Self::build_columns(&type_ids, &stable, registry);
                self.insert_new(type_ids, stable, columns, key)
            }
        };
        self.archetypes[from].set_add_edge(type_id, target);
        self.archetypes[target].set_remove_edge(type_id, from);
        target
    }

    /// Find or create the archetype reachable from `from` by removing
    /// `type_id`.
    pub fn remove_edge_target(
        &mut self,
        from: usize,
        type_id: TypeId,
        registry: &ComponentRegistry,
    ) -> usize {
        if let Some(cached) = self.archetypes[from].remove_edge(type_id) {
            return cached;
        }
        let type_ids: Vec<TypeId> = self.archetypes[from]
            .type_ids()
            .iter()
            .copied()
            .filter(|&t| t != type_id)
            .collect();
        let target = match self.find_exact(&type_ids, registry) {
            Some(id) => id,
            None => {
                let key = signature_key(&type_ids, registry);
                let stable: Vec<bool> = type_ids.iter().map(|&t| registry.is_stable(t)).collect();
                let columns = Self::build_columns(&type_ids, &stable, registry);
                self.insert_new(type_ids, stable, columns, key)
            }
        };
        self.archetypes[from].set_remove_edge(type_id, target);
        self.archetypes[target].set_add_edge(type_id, from);
        target
    }

    fn build_columns(
        type_ids: &[TypeId],
        stable: &[bool],
        registry: &ComponentRegistry,
    ) -> Vec<PackedColumn> {
        type_ids
            .iter()
            .zip(stable)
            .map(|(&tid, &is_stable)| {
                if is_stable {
                    PackedColumn::new(crate::type_id::TypeOps::of::<crate::stable::StableSlotRef>())
                } else {
                    registry.clone_column(tid)
                }
            })
            .collect()
    }

    /// Archetype ids whose type-set includes `type_id`, in creation order.
    pub fn archetypes_with(&self, type_id: TypeId) -> &[usize] {
        self.by_single_type
            .get(&type_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Archetype ids whose sorted type-set's first entry is `type_id` — the
    /// grouping the query engine consults when it needs the cheapest "seed"
    /// group to rescan from scratch.
    pub fn archetypes_by_first_type(&self, type_id: TypeId) -> &[usize] {
        self.by_first_type
            .get(&type_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// One-shot sweep: shrink every archetype whose load factor is at or
    /// below `threshold`.
    pub fn shrink_to_fit(&mut self, threshold: f32) {
        for archetype in self.archetypes.iter_mut() {
            if archetype.load_factor() <= threshold {
                archetype.shrink_to_fit();
            }
        }
    }

    /// Resume (or start) a bounded shrink sweep: shrink up to `budget`
    /// archetypes at or below `threshold`, starting from
    /// `state.next_index`, and update `state` so the next call picks up
    /// where this one left off.
    pub fn shrink_to_fit_incremental(&mut self, state: &mut ShrinkToFitState, budget: usize) {
        let total = self.archetypes.len();
        if total == 0 {
            return;
        }
        let mut shrunk = 0;
        let mut scanned = 0;
        while shrunk < budget && scanned < total {
            let idx = state.next_index % total;
            let archetype = self.archetypes.get_mut(idx).unwrap();
            if archetype.load_factor() <= state.threshold {
                archetype.shrink_to_fit();
                shrunk += 1;
            }
            state.next_index = idx + 1;
            scanned += 1;
        }
    }

    /// Drop every row of every archetype through the normal release path.
    /// Stable-column storage itself lives outside the archetypes (the
    /// store façade owns the shared `StableColumn` map), which is why the
    /// caller must supply it here rather than this type owning it.
    pub fn clear_all(&mut self, stable_columns: &mut FxHashMap<TypeId, StableColumn>) {
        for archetype in self.archetypes.iter_mut() {
            while !archetype.is_empty() {
                unsafe {
                    archetype.swap_remove_row(archetype.len() - 1, stable_columns);
                }
            }
        }
    }
}

impl Default for ArchetypeGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Resumable cursor for [`ArchetypeGraph::shrink_to_fit_incremental`].
#[derive(Debug, Clone, Copy)]
pub struct ShrinkToFitState {
    next_index: usize,
    threshold: f32,
}

impl ShrinkToFitState {
    pub fn new(threshold: f32) -> Self {
        Self {
            next_index: 0,
            threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_archetype_always_present_at_zero() {
        let graph = ArchetypeGraph::new();
        assert_eq!(graph.len(), 1);
        assert!(graph.get(ArchetypeGraph::EMPTY).is_empty());
    }

    #[test]
    fn add_edge_creates_and_caches_target() {
        let mut graph = ArchetypeGraph::new();
        let mut registry = ComponentRegistry::default();
        let type_a = TypeId::of::<u32>();
        registry.register::<u32>();
        let first = graph.add_edge_target(ArchetypeGraph::EMPTY, type_a, &registry);
        assert_eq!(graph.len(), 2);
        let second = graph.add_edge_target(ArchetypeGraph::EMPTY, type_a, &registry);
        assert_eq!(first, second);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn add_then_remove_edge_returns_to_origin() {
        let mut graph = ArchetypeGraph::new();
        let mut registry = ComponentRegistry::default();
        let type_a = TypeId::of::<u32>();
        registry.register::<u32>();
        let with_a = graph.add_edge_target(ArchetypeGraph::EMPTY, type_a, &registry);
        let back = graph.remove_edge_target(with_a, type_a, &registry);
        assert_eq!(back, ArchetypeGraph::EMPTY);
    }

    #[test]
    fn by_first_type_groups_archetypes() {
        let mut graph = ArchetypeGraph::new();
        let mut registry = ComponentRegistry::default();
        let type_a = TypeId::of::<u32>();
        let type_b = TypeId::of::<u64>();
        registry.register::<u32>();
        registry.register::<u64>();
        let with_a = graph.add_edge_target(ArchetypeGraph::EMPTY, type_a, &registry);
        graph.add_edge_target(with_a, type_b, &registry);
        let group = graph.archetypes_by_first_type(type_a);
        assert!(!group.is_empty());
    }
}
